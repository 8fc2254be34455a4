use crate::error::AgentError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, Serializer};
use std::{fmt, io};

/// Whether a step may use tools or is answered by the model alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ToolUse,
    Chat,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ToolUse => "tool_use",
            ActionType::Chat => "chat",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of work in a workflow
///
/// A `tool_use` step with an empty `tool_use` list is accepted; it simply
/// offers no tools when executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Step {
    /// How the step is carried out
    pub action_type: ActionType,
    /// Instruction text for this step
    pub action: String,
    /// Namespaced tool names (`provider/tool`) the step may invoke
    pub tool_use: Vec<String>,
}

impl Step {
    pub fn new(action_type: ActionType, action: impl Into<String>, tool_use: Vec<String>) -> Self {
        Self {
            action_type,
            action: action.into(),
            tool_use,
        }
    }

    pub fn chat(action: impl Into<String>) -> Self {
        Self::new(ActionType::Chat, action, Vec::new())
    }

    pub fn tool_use<I, S>(action: impl Into<String>, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            ActionType::ToolUse,
            action,
            tools.into_iter().map(Into::into).collect(),
        )
    }

    pub fn wants_tools(&self) -> bool {
        !self.tool_use.is_empty()
    }

    /// Get a human-readable description of the step
    pub fn describe(&self) -> String {
        match self.action_type {
            ActionType::ToolUse if self.wants_tools() => {
                format!("🔧 {} [{}]", self.action, self.tool_use.join(", "))
            }
            ActionType::ToolUse => format!("🔧 {} [no tools]", self.action),
            ActionType::Chat => format!("💬 {}", self.action),
        }
    }
}

/// An ordered, non-empty sequence of steps fixed at planning time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workflow {
    steps: Vec<Step>,
}

impl Workflow {
    /// Returns `None` for an empty step list.
    pub fn new(steps: Vec<Step>) -> Option<Self> {
        if steps.is_empty() {
            None
        } else {
            Some(Self { steps })
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Render as the JSON list the model sees, single-line with `", "` and
    /// `": "` separators
    pub fn to_json(&self) -> crate::Result<String> {
        let mut buf = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut buf, SpacedFormatter);
        self.steps.serialize(&mut serializer)?;
        String::from_utf8(buf).map_err(|err| AgentError::Unknown(err.to_string()))
    }

    /// The fixed three-step template used by manual planning
    pub fn math_template() -> Vec<Step> {
        vec![
            Step::tool_use(
                "Search for relevant mathematical concepts and formulas",
                ["demo_author/arxiv"],
            ),
            Step::chat("Analyze the mathematical problem and provide solution steps"),
            Step::chat("Calculate and verify the final answer"),
        ]
    }
}

impl<'a> IntoIterator for &'a Workflow {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Compact JSON with a space after every `,` and `:`
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_wire_format() {
        let step = Step::tool_use("gather information from arxiv. ", ["arxiv"]);
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["action_type"], "tool_use");
        assert_eq!(value["tool_use"][0], "arxiv");
    }

    #[test]
    fn test_empty_workflow_rejected() {
        assert!(Workflow::new(Vec::new()).is_none());
    }

    #[test]
    fn test_workflow_json_uses_spaced_separators() {
        let workflow = Workflow::new(vec![
            Step::tool_use("search", ["demo_author/arxiv", "demo_author/wiki"]),
            Step::chat("say hi"),
        ])
        .unwrap();
        assert_eq!(
            workflow.to_json().unwrap(),
            concat!(
                r#"[{"action_type": "tool_use", "action": "search", "tool_use": ["demo_author/arxiv", "demo_author/wiki"]}, "#,
                r#"{"action_type": "chat", "action": "say hi", "tool_use": []}]"#
            )
        );
    }

    #[test]
    fn test_describe_tool_use_without_tools() {
        let step = Step::new(ActionType::ToolUse, "look it up", Vec::new());
        assert!(!step.wants_tools());
        assert!(step.describe().contains("no tools"));
    }
}
