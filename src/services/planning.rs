use crate::{
    config::{render_template, AgentConfig, WorkflowMode},
    core::{
        context::RunContext,
        llm::{LlmClient, LlmQuery, ResponseFormat},
        status::AgentStatus,
        steps::Workflow,
    },
    error::PlanningError,
    schemas::WorkflowValidator,
};
use tracing::{info, warn};

/// Produces the workflow for a run, either from the manual template or by
/// asking the model until the validator accepts a plan.
///
/// Planning never propagates a failure as anything but a [`PlanningError`];
/// every failure is also recorded on the run's tracker.
pub struct WorkflowPlanner<'a> {
    client: &'a dyn LlmClient,
    validator: &'a WorkflowValidator,
    config: &'a AgentConfig,
}

impl<'a> WorkflowPlanner<'a> {
    pub fn new(
        client: &'a dyn LlmClient,
        validator: &'a WorkflowValidator,
        config: &'a AgentConfig,
    ) -> Self {
        Self {
            client,
            validator,
            config,
        }
    }

    pub async fn plan(&self, ctx: &mut RunContext) -> Result<Workflow, PlanningError> {
        match self.config.workflow_mode {
            WorkflowMode::Manual => self.manual(ctx),
            WorkflowMode::Automatic => self.automatic(ctx).await,
        }
    }

    /// The configured template; no model call.
    pub fn manual(&self, ctx: &mut RunContext) -> Result<Workflow, PlanningError> {
        ctx.tracker.update_status(AgentStatus::GeneratingWorkflow);

        match Workflow::new(self.config.manual_workflow.clone()) {
            Some(workflow) => {
                ctx.tracker.update_status(AgentStatus::WorkflowGenerated);
                Ok(workflow)
            }
            None => {
                let err = PlanningError::EmptyTemplate;
                ctx.tracker.log_error("Error in manual_workflow", Some(&err));
                ctx.tracker.update_status(AgentStatus::Error);
                Err(err)
            }
        }
    }

    /// Ask the model for a JSON plan, at most `plan_max_fail_times` times.
    pub async fn automatic(&self, ctx: &mut RunContext) -> Result<Workflow, PlanningError> {
        ctx.tracker.update_status(AgentStatus::GeneratingWorkflow);
        let max_attempts = self.config.plan_max_fail_times;

        for attempt in 1..=max_attempts {
            let query = LlmQuery::new(ctx.conversation.messages().to_vec())
                .with_response_format(ResponseFormat::Json);

            let response = match self.client.complete(query).await {
                Ok(response) => response,
                Err(err) => {
                    ctx.tracker.log_error("Error in automatic_workflow", Some(&err));
                    ctx.tracker.update_status(AgentStatus::Error);
                    return Err(PlanningError::Transport(err));
                }
            };
            ctx.tracker.increment_rounds();

            match self.validator.validate(&response.response_message) {
                Ok(workflow) => {
                    info!(
                        target: "workflow_agent::planner",
                        attempt,
                        steps = workflow.len(),
                        "accepted generated workflow"
                    );
                    ctx.tracker.update_status(AgentStatus::WorkflowGenerated);
                    return Ok(workflow);
                }
                Err(err) => {
                    warn!(target: "workflow_agent::planner", attempt, error = %err, "rejected generated plan");
                    ctx.tracker
                        .log_debug(format!("Plan attempt {} rejected: {}", attempt, err));

                    let attempt_text = attempt.to_string();
                    let notice = render_template(
                        &self.config.prompts.plan_failure_notice,
                        &[("attempt", attempt_text.as_str())],
                    )
                    .map_err(|err| {
                        ctx.tracker.log_error("Error in automatic_workflow", Some(&err));
                        ctx.tracker.update_status(AgentStatus::Error);
                        PlanningError::Internal(err)
                    })?;
                    ctx.conversation.push_assistant(notice);
                }
            }
        }

        ctx.tracker.update_status(AgentStatus::WorkflowGenerationFailed);
        Err(PlanningError::Exhausted {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            conversation::Role,
            llm::LlmResponse,
            status::StatusTracker,
            steps::{ActionType, Step},
        },
        error::{AgentError, Result},
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct CannedClient {
        replies: Mutex<Vec<Result<LlmResponse>>>,
        seen: Mutex<Vec<LlmQuery>>,
    }

    impl CannedClient {
        fn new(mut replies: Vec<Result<LlmResponse>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::default(),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, query: LlmQuery) -> Result<LlmResponse> {
            self.seen.lock().unwrap().push(query);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(LlmResponse::text("not a plan")))
        }
    }

    fn context(mode: WorkflowMode) -> RunContext {
        let mut ctx = RunContext::new(StatusTracker::new("planner-test", mode));
        ctx.conversation.push_system("system");
        ctx.conversation.push_user("task");
        ctx
    }

    const VALID_PLAN: &str =
        r#"[{"action_type": "chat", "action": "Solve the equation", "tool_use": []}]"#;

    #[tokio::test]
    async fn test_manual_is_deterministic_and_offline() {
        let client = CannedClient::default();
        let validator = WorkflowValidator::default();
        let config = AgentConfig::default();
        let planner = WorkflowPlanner::new(&client, &validator, &config);

        let mut first_ctx = context(WorkflowMode::Manual);
        let mut second_ctx = context(WorkflowMode::Manual);
        let first = planner.plan(&mut first_ctx).await.unwrap();
        let second = planner.plan(&mut second_ctx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first.steps()[0].action_type, ActionType::ToolUse);
        assert_eq!(first.steps()[0].tool_use, vec!["demo_author/arxiv".to_string()]);
        assert_eq!(client.calls(), 0);
        assert_eq!(first_ctx.tracker.rounds(), 0);
    }

    #[tokio::test]
    async fn test_manual_empty_template() {
        let client = CannedClient::default();
        let validator = WorkflowValidator::default();
        let config = AgentConfig::default().with_manual_workflow(Vec::new());
        let planner = WorkflowPlanner::new(&client, &validator, &config);
        let mut ctx = context(WorkflowMode::Manual);

        let err = planner.manual(&mut ctx).unwrap_err();
        assert!(matches!(err, PlanningError::EmptyTemplate));
        assert_eq!(ctx.tracker.status(), AgentStatus::Error);
    }

    #[tokio::test]
    async fn test_automatic_retries_until_valid() {
        let client = CannedClient::new(vec![
            Ok(LlmResponse::text("I think we should first search.")),
            Ok(LlmResponse::text(VALID_PLAN)),
        ]);
        let validator = WorkflowValidator::default();
        let config = AgentConfig::default().with_workflow_mode(WorkflowMode::Automatic);
        let planner = WorkflowPlanner::new(&client, &validator, &config);
        let mut ctx = context(WorkflowMode::Automatic);

        let workflow = planner.plan(&mut ctx).await.unwrap();
        assert_eq!(workflow.steps(), &[Step::chat("Solve the equation")]);
        assert_eq!(client.calls(), 2);
        assert_eq!(ctx.tracker.rounds(), 2);
        assert_eq!(ctx.tracker.status(), AgentStatus::WorkflowGenerated);

        // The failure notice is visible to the second attempt.
        let seen = client.seen.lock().unwrap();
        let second = &seen[1];
        let notice = second.messages.last().unwrap();
        assert_eq!(notice.role, Role::Assistant);
        assert_eq!(
            notice.content,
            "Fail 1 times to generate a valid plan. I need to regenerate a plan"
        );
        assert_eq!(second.response_format, Some(ResponseFormat::Json));
        assert!(second.tools.is_none());
    }

    #[tokio::test]
    async fn test_automatic_exhausts_budget() {
        let client = CannedClient::default();
        let validator = WorkflowValidator::default();
        let config = AgentConfig::default()
            .with_workflow_mode(WorkflowMode::Automatic)
            .with_plan_max_fail_times(4);
        let planner = WorkflowPlanner::new(&client, &validator, &config);
        let mut ctx = context(WorkflowMode::Automatic);

        let err = planner.plan(&mut ctx).await.unwrap_err();
        assert!(matches!(err, PlanningError::Exhausted { attempts: 4 }));
        assert_eq!(client.calls(), 4);
        assert_eq!(ctx.tracker.rounds(), 4);
        assert_eq!(ctx.tracker.status(), AgentStatus::WorkflowGenerationFailed);
    }

    #[tokio::test]
    async fn test_automatic_transport_error_is_contained() {
        let client = CannedClient::new(vec![Err(AgentError::Http("503".to_string()))]);
        let validator = WorkflowValidator::default();
        let config = AgentConfig::default().with_workflow_mode(WorkflowMode::Automatic);
        let planner = WorkflowPlanner::new(&client, &validator, &config);
        let mut ctx = context(WorkflowMode::Automatic);

        let err = planner.plan(&mut ctx).await.unwrap_err();
        assert!(matches!(err, PlanningError::Transport(_)));
        assert_eq!(ctx.tracker.rounds(), 0);
        assert_eq!(ctx.tracker.status(), AgentStatus::Error);
        assert!(ctx.tracker.state().debug_logs.iter().any(|entry| entry.is_error()));
    }
}
