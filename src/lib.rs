//! workflow-agent-rs: a plan-then-execute Rust agent
//!
//! The agent turns a natural-language task into an ordered workflow of steps,
//! either from a fixed template or by asking the language model for a JSON plan
//! that is validated before use. Each step is then sent to the model in order,
//! with the tools the step names, and the last reply becomes the result.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workflow_agent_rs::{Agent, AgentConfig, OpenAIClient, WorkflowMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OpenAIClient::from_env()?;
//!     let config = AgentConfig::default().with_workflow_mode(WorkflowMode::Automatic);
//!
//!     let agent = Agent::new("Solve x^2 - 4 = 0", config, Arc::new(client));
//!     let outcome = agent.run().await;
//!     println!("{} ({})", outcome.result, outcome.status);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod schemas;
pub(crate) mod services;
pub mod tools;
pub mod types;

pub use config::{AgentConfig, Description, PromptTemplates, WorkflowMode};
pub use crate::core::{
    ActionType, Agent, AgentState, AgentStatus, Conversation, LlmClient, LlmQuery, LlmResponse,
    LogEntry, Message, ResponseFormat, Role, RunContext, StatusSnapshot, StatusTracker, Step,
    ToolCall, Workflow,
};
pub use error::{AgentError, PlanningError, Result, RunError, ValidationError};
pub use schemas::{SchemaHandle, WorkflowValidator};
pub use services::openai_client::OpenAIClient;
pub use services::planning::WorkflowPlanner;
pub use tools::{InMemoryToolRegistry, ToolDescriptor, ToolRegistry, ToolSelector};
pub use types::result::{FailureKind, RunFailure, RunResult};

#[cfg(feature = "cli")]
pub mod cli;
