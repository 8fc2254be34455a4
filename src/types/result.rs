use crate::{
    core::status::{AgentState, AgentStatus, LogEntry},
    error::RunError,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const INSTRUCTION_FAILURE_RESULT: &str = "Failed to build system instruction";
pub const PLANNING_FAILURE_RESULT: &str = "Failed to generate a valid workflow.";

/// Stage at which a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InstructionBuild,
    Planning,
    StepExecution,
    Unexpected,
}

/// Typed description of why a run did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
    /// 1-based index of the failing step, for step failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
}

impl From<&RunError> for RunFailure {
    fn from(err: &RunError) -> Self {
        let (kind, step) = match err {
            RunError::InstructionBuild(_) => (FailureKind::InstructionBuild, None),
            RunError::Planning(_) => (FailureKind::Planning, None),
            RunError::StepExecution { step, .. } => (FailureKind::StepExecution, Some(*step)),
            RunError::Unexpected(_) => (FailureKind::Unexpected, None),
        };
        Self {
            kind,
            message: err.to_string(),
            step,
        }
    }
}

/// Result of an agent run, produced exactly once per run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub agent_name: String,
    /// Final answer, or a fixed failure description
    pub result: String,
    /// Number of completed language-model round-trips
    pub rounds: usize,
    pub status: AgentStatus,
    pub debug_logs: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
    /// Total execution duration
    pub duration: Duration,
}

impl RunResult {
    pub fn success(
        agent_name: impl Into<String>,
        result: String,
        state: AgentState,
        duration: Duration,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            result,
            rounds: state.rounds,
            status: state.status,
            debug_logs: state.debug_logs,
            error: None,
            duration,
        }
    }

    pub fn failure(
        agent_name: impl Into<String>,
        err: &RunError,
        state: AgentState,
        duration: Duration,
    ) -> Self {
        let result = match err {
            RunError::InstructionBuild(_) => INSTRUCTION_FAILURE_RESULT.to_string(),
            RunError::Planning(_) => PLANNING_FAILURE_RESULT.to_string(),
            RunError::StepExecution { .. } | RunError::Unexpected(_) => {
                format!("Error occurred during execution: {}", err)
            }
        };
        Self {
            agent_name: agent_name.into(),
            result,
            rounds: state.rounds,
            status: state.status,
            debug_logs: state.debug_logs,
            error: Some(RunFailure::from(err)),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status == AgentStatus::Completed
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.error.as_ref().map(|failure| failure.kind)
    }

    /// States visited during the run, replayed from the log
    pub fn status_history(&self) -> Vec<AgentStatus> {
        let mut history = vec![AgentStatus::Initialized];
        history.extend(
            self.debug_logs
                .iter()
                .filter_map(LogEntry::transition)
                .map(|transition| transition.to),
        );
        history
    }

    pub fn error_entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.debug_logs.iter().filter(|entry| entry.is_error())
    }

    /// Generate a human-readable replay of the execution
    pub fn replay(&self) -> String {
        let mut lines = Vec::new();

        lines.push("=== Agent Execution Trace ===".to_string());
        lines.push(format!("Agent: {}", self.agent_name));
        lines.push(format!("Status: {}", self.status));
        lines.push(format!("Duration: {:.2}s", self.duration.as_secs_f64()));
        lines.push(format!("Rounds: {}", self.rounds));

        if let Some(failure) = &self.error {
            lines.push(format!("Failure: {:?} ({})", failure.kind, failure.message));
        }

        lines.push(String::new());
        lines.push("--- Log ---".to_string());

        for (idx, entry) in self.debug_logs.iter().enumerate() {
            lines.push(format!("{}. {}", idx + 1, entry.describe()));
        }

        lines.push(String::new());
        lines.push("--- Result ---".to_string());
        lines.push(self.result.clone());

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::WorkflowMode,
        core::status::StatusTracker,
        error::{AgentError, PlanningError},
    };

    #[test]
    fn test_planning_failure_result() {
        let tracker = StatusTracker::new("math", WorkflowMode::Automatic);
        tracker.update_status(AgentStatus::Failed);
        let err = RunError::Planning(PlanningError::Exhausted { attempts: 3 });

        let result = RunResult::failure("math", &err, tracker.state(), Duration::ZERO);
        assert_eq!(result.result, PLANNING_FAILURE_RESULT);
        assert_eq!(result.failure_kind(), Some(FailureKind::Planning));
        assert!(!result.is_success());
    }

    #[test]
    fn test_step_failure_carries_index() {
        let err = RunError::StepExecution {
            step: 2,
            source: AgentError::Timeout("slow".to_string()),
        };
        let failure = RunFailure::from(&err);
        assert_eq!(failure.kind, FailureKind::StepExecution);
        assert_eq!(failure.step, Some(2));
    }

    #[test]
    fn test_replay_lists_log_and_result() {
        let tracker = StatusTracker::new("math", WorkflowMode::Manual);
        tracker.update_status(AgentStatus::Running);
        tracker.update_status(AgentStatus::Completed);

        let result = RunResult::success(
            "math",
            "x = 2 or x = -2".to_string(),
            tracker.state(),
            Duration::from_millis(1500),
        );
        let replay = result.replay();
        assert!(replay.contains("Agent Execution Trace"));
        assert!(replay.contains("Status changed: initialized -> running"));
        assert!(replay.ends_with("x = 2 or x = -2"));
        assert_eq!(
            result.status_history(),
            vec![
                AgentStatus::Initialized,
                AgentStatus::Running,
                AgentStatus::Completed
            ]
        );
    }
}
