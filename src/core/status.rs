//! Lifecycle tracking for a single agent run.
//!
//! [`StatusTracker`] is a clonable handle over the shared [`AgentState`]; every
//! component of a run records into the same append-only log, and
//! [`StatusTracker::get_status`] can be read from anywhere, including while a
//! run is in flight.

use crate::config::WorkflowMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    backtrace::{Backtrace, BacktraceStatus},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Initialized,
    Running,
    BuildingSystemInstruction,
    SystemInstructionBuilt,
    GeneratingWorkflow,
    WorkflowGenerated,
    WorkflowGenerationFailed,
    ExecutingWorkflow,
    Completed,
    Failed,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Initialized => "initialized",
            AgentStatus::Running => "running",
            AgentStatus::BuildingSystemInstruction => "building_system_instruction",
            AgentStatus::SystemInstructionBuilt => "system_instruction_built",
            AgentStatus::GeneratingWorkflow => "generating_workflow",
            AgentStatus::WorkflowGenerated => "workflow_generated",
            AgentStatus::WorkflowGenerationFailed => "workflow_generation_failed",
            AgentStatus::ExecutingWorkflow => "executing_workflow",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
            AgentStatus::Error => "error",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: AgentStatus,
    pub to: AgentStatus,
}

/// A timestamped entry in the run's audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    Debug {
        message: String,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transition: Option<StatusTransition>,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        traceback: Option<String>,
    },
}

impl LogEntry {
    pub fn message(&self) -> &str {
        match self {
            LogEntry::Debug { message, .. } | LogEntry::Error { message, .. } => message,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LogEntry::Debug { timestamp, .. } | LogEntry::Error { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LogEntry::Error { .. })
    }

    pub fn transition(&self) -> Option<StatusTransition> {
        match self {
            LogEntry::Debug { transition, .. } => *transition,
            LogEntry::Error { .. } => None,
        }
    }

    /// Get a human-readable description of the entry
    pub fn describe(&self) -> String {
        match self {
            LogEntry::Debug {
                message, timestamp, ..
            } => format!("[{}] DEBUG {}", timestamp.to_rfc3339(), message),
            LogEntry::Error {
                message,
                timestamp,
                error,
                ..
            } => match error {
                Some(error) => format!("[{}] ERROR {}: {}", timestamp.to_rfc3339(), message, error),
                None => format!("[{}] ERROR {}", timestamp.to_rfc3339(), message),
            },
        }
    }
}

/// Mutable lifecycle state of one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub status: AgentStatus,
    pub rounds: usize,
    pub debug_logs: Vec<LogEntry>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            status: AgentStatus::Initialized,
            rounds: 0,
            debug_logs: Vec::new(),
        }
    }
}

/// Point-in-time view returned by [`StatusTracker::get_status`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub agent_name: String,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_mode: Option<WorkflowMode>,
    pub debug_logs: Vec<LogEntry>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusTracker {
    agent_name: Arc<str>,
    workflow_mode: WorkflowMode,
    state: Arc<Mutex<AgentState>>,
}

impl StatusTracker {
    pub fn new(agent_name: impl Into<String>, workflow_mode: WorkflowMode) -> Self {
        let agent_name: String = agent_name.into();
        Self {
            agent_name: Arc::from(agent_name),
            workflow_mode,
            state: Arc::new(Mutex::new(AgentState::default())),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    // Recording must keep working after a panic elsewhere poisoned the lock.
    fn lock(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> AgentStatus {
        self.lock().status
    }

    pub fn rounds(&self) -> usize {
        self.lock().rounds
    }

    pub fn increment_rounds(&self) -> usize {
        let mut state = self.lock();
        state.rounds += 1;
        state.rounds
    }

    pub fn update_status(&self, new_status: AgentStatus) {
        let mut state = self.lock();
        let old_status = state.status;
        state.status = new_status;
        let message = format!("Status changed: {} -> {}", old_status, new_status);
        debug!(target: "workflow_agent::status", agent = %self.agent_name, "{}", message);
        state.debug_logs.push(LogEntry::Debug {
            message,
            timestamp: Utc::now(),
            transition: Some(StatusTransition {
                from: old_status,
                to: new_status,
            }),
        });
    }

    pub fn log_debug(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(target: "workflow_agent::status", agent = %self.agent_name, "{}", message);
        self.lock().debug_logs.push(LogEntry::Debug {
            message,
            timestamp: Utc::now(),
            transition: None,
        });
    }

    pub fn log_error(&self, message: impl Into<String>, err: Option<&dyn std::error::Error>) {
        let message = message.into();
        let error_text = err.map(|err| err.to_string());
        let traceback = err.and_then(|_| {
            let backtrace = Backtrace::capture();
            match backtrace.status() {
                BacktraceStatus::Captured => Some(backtrace.to_string()),
                _ => None,
            }
        });

        match &error_text {
            Some(error_text) => {
                error!(target: "workflow_agent::status", agent = %self.agent_name, error = %error_text, "{}", message)
            }
            None => error!(target: "workflow_agent::status", agent = %self.agent_name, "{}", message),
        }

        self.lock().debug_logs.push(LogEntry::Error {
            message,
            timestamp: Utc::now(),
            error: error_text,
            traceback,
        });
    }

    /// Clone of the current state
    pub fn state(&self) -> AgentState {
        self.lock().clone()
    }

    /// Replay the log into the sequence of states visited so far
    pub fn status_history(&self) -> Vec<AgentStatus> {
        let state = self.lock();
        let mut history = vec![AgentStatus::Initialized];
        history.extend(
            state
                .debug_logs
                .iter()
                .filter_map(LogEntry::transition)
                .map(|transition| transition.to),
        );
        history
    }

    /// Snapshot of the agent's state; never fails.
    ///
    /// If the state lock was poisoned by a panic, the snapshot degrades to
    /// `status = error` with whatever log entries are still readable.
    pub fn get_status(&self) -> StatusSnapshot {
        match self.state.lock() {
            Ok(mut state) => {
                let message = "Status requested".to_string();
                debug!(target: "workflow_agent::status", agent = %self.agent_name, "{}", message);
                state.debug_logs.push(LogEntry::Debug {
                    message,
                    timestamp: Utc::now(),
                    transition: None,
                });
                StatusSnapshot {
                    agent_name: self.agent_name.to_string(),
                    status: state.status,
                    rounds: Some(state.rounds),
                    workflow_mode: Some(self.workflow_mode),
                    debug_logs: state.debug_logs.clone(),
                    timestamp: Utc::now(),
                    error: None,
                }
            }
            Err(poisoned) => {
                let error = "Error getting status: agent state lock poisoned".to_string();
                error!(target: "workflow_agent::status", agent = %self.agent_name, "{}", error);
                let mut state = poisoned.into_inner();
                state.debug_logs.push(LogEntry::Error {
                    message: error.clone(),
                    timestamp: Utc::now(),
                    error: None,
                    traceback: None,
                });
                StatusSnapshot {
                    agent_name: self.agent_name.to_string(),
                    status: AgentStatus::Error,
                    rounds: None,
                    workflow_mode: None,
                    debug_logs: state.debug_logs.clone(),
                    timestamp: Utc::now(),
                    error: Some(error),
                }
            }
        }
    }
}

impl fmt::Display for StatusTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        write!(
            f,
            "Agent(name={}, status={}, rounds={})",
            self.agent_name, state.status, state.rounds
        )
    }
}
