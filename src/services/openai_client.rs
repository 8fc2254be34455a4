use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    core::{
        llm::{LlmClient, LlmQuery, LlmResponse, ResponseFormat},
        steps::ActionType,
        tool_call::ToolCall,
    },
    error::{AgentError, Result},
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4.1-mini";
const MAX_RETRIES: usize = 3;

/// OpenAI-compatible chat completions transport
#[derive(Clone, Debug)]
pub struct OpenAIClient {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
    timeout: Duration,
    initial_backoff: Duration,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: Some(1000),
            timeout: Duration::from_secs(120),
            initial_backoff: Duration::from_millis(250),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            AgentError::Config(
                "OPENAI_API_KEY environment variable must be set before creating a client"
                    .to_string(),
            )
        })?;
        let mut client = Self::new(api_key);
        if let Ok(base_url) =
            std::env::var("OPENAI_BASE_URL").or_else(|_| std::env::var("OPENROUTER_BASE_URL"))
        {
            client.set_base_url(base_url);
        }
        Ok(client)
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.set_base_url(base_url);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, query: &LlmQuery) -> Value {
        let messages = query.messages.iter().map(|m| m.to_openai()).collect();
        let mut request =
            ChatCompletionRequest::new(self.model.clone(), messages).with_max_tokens(self.max_tokens);

        if let Some(tools) = query.tools.as_ref().filter(|tools| !tools.is_empty()) {
            request = request.with_tools(tools.iter().map(|tool| tool.to_openai_tool()).collect());
            let tool_choice = match query.action_type {
                Some(ActionType::Chat) => "none",
                Some(ActionType::ToolUse) | None => "auto",
            };
            request = request.with_tool_choice(json!(tool_choice));
        }

        if query.response_format == Some(ResponseFormat::Json) {
            request = request.with_response_format(json!({"type": "json_object"}));
        }

        request.into_value()
    }

    pub async fn chat_completion(&self, body: &Value) -> Result<Value> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| AgentError::Http(format!("Failed to build HTTP client: {err}")))?;

        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let request_url = build_chat_url(&self.base_url);

            let response = client
                .post(&request_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .header("X-Title", "workflow-agent-rs")
                .json(body)
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        AgentError::Timeout(format!("request to {request_url} timed out"))
                    } else {
                        AgentError::Http(format!("HTTP request failed: {err}"))
                    }
                })?;

            let status = response.status();
            let headers = response.headers().clone();
            let response_text = response
                .text()
                .await
                .map_err(|err| AgentError::Http(format!("Failed to read response: {err}")))?;

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_duration = headers
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(backoff);

                if attempt < MAX_RETRIES {
                    warn!(target: "workflow_agent::transport", attempt, "rate limited, retrying");
                    tokio::time::sleep(retry_after_duration).await;
                    attempt += 1;
                    backoff *= 2;
                    continue;
                }

                return Err(AgentError::RateLimit {
                    retry_after: retry_after_duration.as_secs().max(1),
                });
            }

            if status.is_server_error() && attempt < MAX_RETRIES {
                warn!(target: "workflow_agent::transport", attempt, %status, "server error, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
                backoff *= 2;
                continue;
            }

            let response_json: Value = serde_json::from_str(&response_text)
                .map_err(|err| AgentError::Http(format!("Failed to parse JSON: {err}")))?;

            if !status.is_success() {
                let api_message = response_json
                    .get("error")
                    .and_then(|error| error.get("message"))
                    .and_then(|value| value.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or(response_text.clone());

                return Err(AgentError::Http(format!(
                    "HTTP {} error: {}",
                    status, api_message
                )));
            }

            if let Some(error) = response_json.get("error") {
                let error_message = error
                    .get("message")
                    .and_then(|value| value.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| error.to_string());
                return Err(AgentError::Http(format!("API error: {}", error_message)));
            }

            return Ok(response_json);
        }
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, query: LlmQuery) -> Result<LlmResponse> {
        let body = self.build_request(&query);
        debug!(
            target: "workflow_agent::transport",
            model = %self.model,
            messages = query.messages.len(),
            tools = query.tools.as_ref().map_or(0, |tools| tools.len()),
            "sending chat completion"
        );
        let response = self.chat_completion(&body).await?;
        parse_completion(&response)
    }
}

/// Extract the assistant reply from a chat completion body
fn parse_completion(response: &Value) -> Result<LlmResponse> {
    let first_choice = response
        .get("choices")
        .and_then(|value| value.as_array())
        .ok_or_else(|| {
            AgentError::Unknown("Missing 'choices' array in completion response".to_string())
        })?
        .first()
        .ok_or_else(|| {
            AgentError::Unknown("Completion response contained no choices".to_string())
        })?;

    let message = first_choice.get("message").ok_or_else(|| {
        AgentError::Unknown("Completion response missing assistant message".to_string())
    })?;

    let tool_calls: Vec<ToolCall> = message
        .get("tool_calls")
        .and_then(|value| value.as_array())
        .map(|calls| calls.iter().filter_map(ToolCall::from_openai_format).collect())
        .unwrap_or_default();

    let content = message
        .get("content")
        .and_then(|value| value.as_str())
        .unwrap_or("")
        .to_string();

    // A tool-only reply still has to leave something in the conversation.
    let response_message = if content.trim().is_empty() && !tool_calls.is_empty() {
        let requested: Vec<Value> = tool_calls
            .iter()
            .map(|call| json!({"name": call.name, "arguments": call.arguments}))
            .collect();
        serde_json::to_string(&json!({ "tool_calls": requested }))?
    } else {
        content
    };

    Ok(LlmResponse {
        response_message,
        tool_calls,
    })
}

fn build_chat_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{}/chat/completions", trimmed)
    }
}

#[derive(Clone, Debug)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Value>,
    tools: Vec<Value>,
    tool_choice: Option<Value>,
    max_tokens: Option<u32>,
    response_format: Option<Value>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_choice: None,
            max_tokens: None,
            response_format: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: Value) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_response_format(mut self, response_format: Value) -> Self {
        self.response_format = Some(response_format);
        self
    }

    pub fn into_value(self) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.messages,
        });

        if !self.tools.is_empty() {
            body["tools"] = Value::Array(self.tools);
        }

        if let Some(tool_choice) = self.tool_choice {
            body["tool_choice"] = tool_choice;
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(response_format) = self.response_format {
            body["response_format"] = response_format;
        }

        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::conversation::Message, tools::ToolDescriptor};

    #[test]
    fn test_build_chat_url() {
        assert_eq!(
            build_chat_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            build_chat_url("http://localhost:8080/v1/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_planning_request_asks_for_json() {
        let client = OpenAIClient::new("key").with_model("test-model");
        let query = LlmQuery::new(vec![Message::user("plan")])
            .with_response_format(ResponseFormat::Json);

        let body = client.build_request(&query);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_tool_step_request() {
        let client = OpenAIClient::new("key");
        let tool = ToolDescriptor::new("demo_author/arxiv", "search", json!({"type": "object"}));
        let query = LlmQuery::new(vec![Message::user("search")])
            .with_tools(Some(vec![tool]))
            .with_action_type(ActionType::ToolUse);

        let body = client.build_request(&query);
        assert_eq!(body["tools"][0]["function"]["name"], "arxiv");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn test_parse_tool_only_reply() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "arxiv", "arguments": "{\"query\":\"roots\"}"}
                    }]
                }
            }]
        });

        let parsed = parse_completion(&response).unwrap();
        assert_eq!(parsed.tool_calls.len(), 1);
        assert!(parsed.response_message.contains("\"arxiv\""));
    }

    #[test]
    fn test_parse_missing_choices() {
        let err = parse_completion(&json!({"id": "x"})).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_ERROR");
    }
}
