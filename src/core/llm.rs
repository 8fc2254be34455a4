use super::{conversation::Message, steps::ActionType, tool_call::ToolCall};
use crate::{error::Result, tools::ToolDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Response format requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    Json,
}

/// One request to the language-model backend
#[derive(Debug, Clone, Default)]
pub struct LlmQuery {
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolDescriptor>>,
    pub response_format: Option<ResponseFormat>,
    pub action_type: Option<ActionType>,
}

impl LlmQuery {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_tools(mut self, tools: Option<Vec<ToolDescriptor>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_response_format(mut self, response_format: ResponseFormat) -> Self {
        self.response_format = Some(response_format);
        self
    }

    pub fn with_action_type(mut self, action_type: ActionType) -> Self {
        self.action_type = Some(action_type);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub response_message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl LlmResponse {
    pub fn text(response_message: impl Into<String>) -> Self {
        Self {
            response_message: response_message.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Language-model transport
///
/// Implementations handle their own retries and timeouts; an `Err` here is
/// treated as a failed round by the caller.
#[async_trait]
pub trait LlmClient: Send + Sync + std::fmt::Debug {
    async fn complete(&self, query: LlmQuery) -> Result<LlmResponse>;
}
