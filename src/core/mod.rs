pub mod agent;
pub mod context;
pub mod conversation;
pub mod llm;
pub mod status;
pub mod steps;
pub mod tool_call;

pub use crate::types::result::{FailureKind, RunFailure, RunResult};
pub use agent::Agent;
pub use context::RunContext;
pub use conversation::{Conversation, Message, Role};
pub use llm::{LlmClient, LlmQuery, LlmResponse, ResponseFormat};
pub use status::{AgentState, AgentStatus, LogEntry, StatusSnapshot, StatusTracker};
pub use steps::{ActionType, Step, Workflow};
pub use tool_call::ToolCall;
