use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call requested by the model in its reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Function name as offered to the model
    pub name: String,
    /// Arguments to pass to the tool
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Parse a tool call from OpenAI response format
    ///
    /// Arguments that are not valid JSON are kept as a raw string.
    pub fn from_openai_format(tool_call: &Value) -> Option<Self> {
        let id = tool_call
            .get("id")
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();
        let function = tool_call.get("function")?;
        let name = function.get("name")?.as_str()?.to_string();
        if name.is_empty() {
            return None;
        }

        let arguments_str = function
            .get("arguments")
            .and_then(|value| value.as_str())
            .unwrap_or("");
        let arguments = if arguments_str.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments_str)
                .unwrap_or_else(|_| Value::String(arguments_str.to_string()))
        };

        Some(Self {
            id,
            name,
            arguments,
        })
    }

    /// Get a human-readable description
    pub fn describe(&self) -> String {
        format!("{}({})", self.name, self.arguments)
    }
}
