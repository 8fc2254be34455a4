//! Agent configuration and prompt templates.
//!
//! Prompt wording lives here as data. Templates use `{name}` placeholders and
//! are rendered with [`render_template`], which refuses to leave a
//! placeholder unresolved.

use crate::{
    core::steps::Step,
    error::{AgentError, Result},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};

pub const DEFAULT_PLAN_MAX_FAIL_TIMES: usize = 3;
pub const DEFAULT_TOOL_CALL_MAX_FAIL_TIMES: usize = 3;

const PLANNING_INSTRUCTION: &str = concat!(
    "You are given the available tools from the tool list: {tool_info} to help you solve problems. ",
    "Generate a plan with comprehensive yet minimal steps to fulfill the task. ",
    "The plan must follow the json format as below: ",
    "[",
    r#"{"action_type": "action_type_value", "action": "action_value","tool_use": [tool_name1, tool_name2,...]}"#,
    r#"{"action_type": "action_type_value", "action": "action_value", "tool_use": [tool_name1, tool_name2,...]}"#,
    "...",
    "]",
    "In each step of the planned plan, identify tools to use and recognize no tool is necessary. ",
    "Followings are some plan examples. ",
    "[[",
    r#"{"action_type": "tool_use", "action": "gather information from arxiv. ", "tool_use": ["arxiv"]},"#,
    r#"{"action_type": "chat", "action": "write a summarization based on the gathered information. ", "tool_use": []}"#,
    "];",
    "[",
    r#"{"action_type": "tool_use", "action": "gather information from arxiv. ", "tool_use": ["arxiv"]},"#,
    r#"{"action_type": "chat", "action": "understand the current methods and propose ideas that can improve ", "tool_use": []}"#,
    "]",
    "]",
);

const WORKFLOW_SUMMARY: &str = "[Thinking]: The workflow generated for the problem is {workflow}. Follow the workflow to solve the problem step by step. ";
const STEP_PROMPT: &str = "At step {index}, you need to: {action}. ";
const PLAN_FAILURE_NOTICE: &str =
    "Fail {attempt} times to generate a valid plan. I need to regenerate a plan";

/// How the workflow is obtained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowMode {
    /// Fixed template, no model call
    #[default]
    Manual,
    /// Model-generated, validated, retried
    Automatic,
}

impl WorkflowMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowMode::Manual => "manual",
            WorkflowMode::Automatic => "automatic",
        }
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowMode {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Ok(WorkflowMode::Manual),
            "automatic" | "auto" => Ok(WorkflowMode::Automatic),
            other => Err(AgentError::Config(format!(
                "unknown workflow mode `{}` (expected `manual` or `automatic`)",
                other
            ))),
        }
    }
}

/// Agent description, either a single string or fragments joined verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Text(String),
    Parts(Vec<String>),
}

impl Description {
    pub fn joined(&self) -> String {
        match self {
            Description::Text(text) => text.clone(),
            Description::Parts(parts) => parts.concat(),
        }
    }
}

impl Default for Description {
    fn default() -> Self {
        Description::Text(String::new())
    }
}

impl From<&str> for Description {
    fn from(value: &str) -> Self {
        Description::Text(value.to_string())
    }
}

impl From<String> for Description {
    fn from(value: String) -> Self {
        Description::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    /// Placeholders: `{tool_info}`
    pub planning_instruction: String,
    /// Placeholders: `{workflow}`
    pub workflow_summary: String,
    /// Placeholders: `{index}`, `{action}`
    pub step_prompt: String,
    /// Placeholders: `{attempt}`
    pub plan_failure_notice: String,
}

impl PromptTemplates {
    /// Dry-render every template so a bad placeholder fails before the run starts
    pub fn check(&self) -> Result<()> {
        render_template(&self.planning_instruction, &[("tool_info", "[]")])?;
        render_template(&self.workflow_summary, &[("workflow", "[]")])?;
        render_template(&self.step_prompt, &[("index", "1"), ("action", "")])?;
        render_template(&self.plan_failure_notice, &[("attempt", "1")])?;
        Ok(())
    }
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            planning_instruction: PLANNING_INSTRUCTION.to_string(),
            workflow_summary: WORKFLOW_SUMMARY.to_string(),
            step_prompt: STEP_PROMPT.to_string(),
            plan_failure_notice: PLAN_FAILURE_NOTICE.to_string(),
        }
    }
}

/// Read-only agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub description: Description,
    pub workflow_mode: WorkflowMode,
    pub plan_max_fail_times: usize,
    /// Budget for the transport's tool path; carried for status reporting.
    pub tool_call_max_fail_times: usize,
    pub prompts: PromptTemplates,
    pub manual_workflow: Vec<Step>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "math_agent".to_string(),
            description: Description::Text(
                "You are an expert who is good at solving mathematical problems. ".to_string(),
            ),
            workflow_mode: WorkflowMode::Manual,
            plan_max_fail_times: DEFAULT_PLAN_MAX_FAIL_TIMES,
            tool_call_max_fail_times: DEFAULT_TOOL_CALL_MAX_FAIL_TIMES,
            prompts: PromptTemplates::default(),
            manual_workflow: crate::core::steps::Workflow::math_template(),
        }
    }
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, description: impl Into<Description>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_workflow_mode(mut self, workflow_mode: WorkflowMode) -> Self {
        self.workflow_mode = workflow_mode;
        self
    }

    pub fn with_plan_max_fail_times(mut self, plan_max_fail_times: usize) -> Self {
        self.plan_max_fail_times = plan_max_fail_times;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptTemplates) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_manual_workflow(mut self, steps: Vec<Step>) -> Self {
        self.manual_workflow = steps;
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config: Self = serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
            AgentError::Config(format!("invalid config at {}: {}", err.path(), err))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AgentError::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.plan_max_fail_times == 0 {
            return Err(AgentError::Config(
                "plan_max_fail_times must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Substitute `{key}` placeholders; an unknown placeholder is an error.
///
/// `{{` and `}}` are literal braces, and a `{` that does not open a
/// `{identifier}` run is kept as-is so JSON examples pass through untouched.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        match placeholder_name(&tail[1..]) {
            Some(name) => {
                let value = vars
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| {
                        AgentError::Template(format!("no value for placeholder `{{{}}}`", name))
                    })?;
                out.push_str(value);
                rest = &tail[name.len() + 2..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn placeholder_name(after_brace: &str) -> Option<&str> {
    let end = after_brace.find('}')?;
    let name = &after_brace[..end];
    let is_identifier = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    is_identifier.then_some(name)
}
