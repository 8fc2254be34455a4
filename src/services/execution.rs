use super::planning::WorkflowPlanner;
use crate::{
    config::{render_template, WorkflowMode},
    core::{
        agent::Agent,
        context::RunContext,
        llm::LlmQuery,
        status::{AgentState, AgentStatus},
        steps::{Step, Workflow},
    },
    error::{AgentError, Result, RunError},
    types::result::RunResult,
};
use futures::FutureExt;
use std::{any::Any, panic::AssertUnwindSafe, sync::atomic::Ordering, time::Instant};
use tracing::{debug, info, warn};

impl Agent {
    /// Plan and execute the task.
    ///
    /// Never fails: every outcome, including a panic inside the run, comes
    /// back as a [`RunResult`] carrying the status and full debug log.
    pub async fn run(&self) -> RunResult {
        let start_time = Instant::now();
        let tracker = self.tracker().clone();

        // A refused run reports on itself only; the first run's state stays as it was.
        if self.started().swap(true, Ordering::SeqCst) {
            let err = RunError::Unexpected("agent has already been run".to_string());
            warn!(target: "workflow_agent::execution", agent = %self.name(), "refusing to start a second run");
            let refused = AgentState {
                status: AgentStatus::Error,
                ..AgentState::default()
            };
            return RunResult::failure(self.name(), &err, refused, start_time.elapsed());
        }

        info!(
            target: "workflow_agent::execution",
            agent = %self.name(),
            mode = %self.workflow_mode(),
            "starting run"
        );

        let mut ctx = RunContext::new(tracker.clone());
        let outcome = AssertUnwindSafe(self.execute(&mut ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(RunError::Unexpected(panic_message(&*panic))));

        match outcome {
            Ok(final_result) => {
                info!(target: "workflow_agent::execution", agent = %self.name(), rounds = tracker.rounds(), "run completed");
                RunResult::success(
                    self.name(),
                    final_result,
                    tracker.state(),
                    start_time.elapsed(),
                )
            }
            Err(err) => {
                if matches!(
                    err,
                    RunError::StepExecution { .. } | RunError::Unexpected(_)
                ) {
                    tracker.log_error("Error in run", Some(&err));
                    tracker.update_status(AgentStatus::Error);
                }
                info!(target: "workflow_agent::execution", agent = %self.name(), error = %err, "run did not complete");
                RunResult::failure(self.name(), &err, tracker.state(), start_time.elapsed())
            }
        }
    }

    async fn execute(&self, ctx: &mut RunContext) -> std::result::Result<String, RunError> {
        let tracker = ctx.tracker.clone();
        tracker.update_status(AgentStatus::Running);
        tracker.log_debug(format!("Starting run with task: {}", self.task_input()));

        if let Err(err) = self.build_system_instruction(ctx) {
            tracker.log_error("Error in build_system_instruction", Some(&err));
            tracker.update_status(AgentStatus::Error);
            return Err(RunError::InstructionBuild(err));
        }

        ctx.conversation.push_user(self.task_input());

        let planner = WorkflowPlanner::new(self.client(), self.validator(), self.config());
        let planned = planner.plan(ctx).await;

        if self.workflow_mode() == WorkflowMode::Automatic {
            // Execution should not be fed the planning transcript.
            ctx.conversation.truncate_to_first();
            tracker.log_debug("Cleared planning exchange from conversation");
        }

        let workflow = match planned {
            Ok(workflow) => workflow,
            Err(err) => {
                tracker.update_status(AgentStatus::Failed);
                return Err(err.into());
            }
        };

        let summary = self
            .workflow_summary(&workflow)
            .map_err(|err| RunError::Unexpected(err.to_string()))?;
        ctx.conversation.push_user(summary);

        tracker.update_status(AgentStatus::ExecutingWorkflow);
        for (idx, step) in workflow.steps().iter().enumerate() {
            let index = idx + 1;
            self.execute_step(ctx, index, step)
                .await
                .map_err(|source| RunError::StepExecution {
                    step: index,
                    source,
                })?;
        }

        let final_result = ctx
            .conversation
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default();
        tracker.update_status(AgentStatus::Completed);
        Ok(final_result)
    }

    fn build_system_instruction(&self, ctx: &mut RunContext) -> Result<()> {
        ctx.tracker
            .update_status(AgentStatus::BuildingSystemInstruction);

        let prefix = self.config().description.joined();
        if prefix.trim().is_empty() {
            return Err(AgentError::Config("agent description is empty".to_string()));
        }
        self.config().prompts.check()?;

        let plan_instruction = match self.workflow_mode() {
            WorkflowMode::Manual => None,
            WorkflowMode::Automatic => {
                let tool_info =
                    serde_json::to_string(&self.tool_selector().registry().descriptors())?;
                Some(render_template(
                    &self.config().prompts.planning_instruction,
                    &[("tool_info", tool_info.as_str())],
                )?)
            }
        };

        ctx.conversation.push_system(prefix);
        if let Some(plan_instruction) = plan_instruction {
            ctx.conversation.push_user(plan_instruction);
        }

        ctx.tracker.update_status(AgentStatus::SystemInstructionBuilt);
        Ok(())
    }

    fn workflow_summary(&self, workflow: &Workflow) -> Result<String> {
        let workflow_json = workflow.to_json()?;
        render_template(
            &self.config().prompts.workflow_summary,
            &[("workflow", workflow_json.as_str())],
        )
    }

    async fn execute_step(&self, ctx: &mut RunContext, index: usize, step: &Step) -> Result<()> {
        ctx.tracker
            .log_debug(format!("Executing step {}: {}", index, step.action));
        debug!(target: "workflow_agent::execution", step = index, "{}", step.describe());

        let index_text = index.to_string();
        let prompt = render_template(
            &self.config().prompts.step_prompt,
            &[("index", index_text.as_str()), ("action", step.action.as_str())],
        )?;
        ctx.conversation.push_user(prompt);

        let tools = if step.wants_tools() {
            self.tool_selector().select(&step.tool_use)
        } else {
            None
        };

        let query = LlmQuery::new(ctx.conversation.messages().to_vec())
            .with_tools(tools)
            .with_action_type(step.action_type);
        let response = self.client().complete(query).await?;

        ctx.conversation.push_assistant(response.response_message);
        let rounds = ctx.tracker.increment_rounds();
        debug!(target: "workflow_agent::execution", step = index, rounds, "step completed");
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic with non-string payload".to_string()
    }
}
