use super::{
    llm::LlmClient,
    status::{StatusSnapshot, StatusTracker},
};
use crate::{
    config::{AgentConfig, WorkflowMode},
    error::Result,
    schemas::WorkflowValidator,
    services::openai_client::OpenAIClient,
    tools::{InMemoryToolRegistry, ToolRegistry, ToolSelector},
};
use std::sync::{atomic::AtomicBool, Arc};

/// Plan-then-execute agent for a single task
///
/// One `Agent` performs one run; see [`Agent::run`].
#[derive(Debug)]
pub struct Agent {
    config: AgentConfig,
    task_input: String,
    client: Arc<dyn LlmClient>,
    tools: ToolSelector,
    validator: WorkflowValidator,
    tracker: StatusTracker,
    started: AtomicBool,
}

impl Agent {
    pub fn new(
        task_input: impl Into<String>,
        config: AgentConfig,
        client: Arc<dyn LlmClient>,
    ) -> Self {
        let task_input = task_input.into();
        let tracker = StatusTracker::new(config.name.clone(), config.workflow_mode);
        tracker.log_debug(format!(
            "Agent initialized with name: {}, task: {}",
            config.name, task_input
        ));
        tracker.log_debug(format!("Initial status: {}", tracker.status()));

        Self {
            config,
            task_input,
            client,
            tools: ToolSelector::new(Arc::new(InMemoryToolRegistry::with_defaults())),
            validator: WorkflowValidator::default(),
            tracker,
            started: AtomicBool::new(false),
        }
    }

    /// Agent backed by [`OpenAIClient::from_env`]
    pub fn from_env(task_input: impl Into<String>, config: AgentConfig) -> Result<Self> {
        let client = OpenAIClient::from_env()?;
        Ok(Self::new(task_input, config, Arc::new(client)))
    }

    pub fn with_tool_registry(mut self, registry: Arc<dyn ToolRegistry>) -> Self {
        self.tools = ToolSelector::new(registry);
        self
    }

    pub fn with_validator(mut self, validator: WorkflowValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn task_input(&self) -> &str {
        &self.task_input
    }

    pub fn workflow_mode(&self) -> WorkflowMode {
        self.config.workflow_mode
    }

    /// Snapshot of the agent's state; safe to call at any time, never fails.
    pub fn get_status(&self) -> StatusSnapshot {
        self.tracker.get_status()
    }

    /// Handle for reading status from another task while the run is in flight
    pub fn status_handle(&self) -> StatusTracker {
        self.tracker.clone()
    }

    pub(crate) fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub(crate) fn client(&self) -> &dyn LlmClient {
        self.client.as_ref()
    }

    pub(crate) fn tool_selector(&self) -> &ToolSelector {
        &self.tools
    }

    pub(crate) fn validator(&self) -> &WorkflowValidator {
        &self.validator
    }

    pub(crate) fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    pub(crate) fn started(&self) -> &AtomicBool {
        &self.started
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tracker)
    }
}
