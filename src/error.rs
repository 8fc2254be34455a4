use thiserror::Error;

/// Main error type for the agent system
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded: retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::Validation(_) | AgentError::RateLimit { .. } | AgentError::Timeout(_)
        )
    }

    /// Get the error code for structured responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AgentError::Config(_) => "CONFIG_ERROR",
            AgentError::Http(_) => "HTTP_ERROR",
            AgentError::Serialization(_) => "SERIALIZATION_ERROR",
            AgentError::Validation(_) => "VALIDATION_ERROR",
            AgentError::Template(_) => "TEMPLATE_ERROR",
            AgentError::ToolNotFound(_) => "TOOL_NOT_FOUND",
            AgentError::Timeout(_) => "TIMEOUT_ERROR",
            AgentError::RateLimit { .. } => "RATE_LIMIT_ERROR",
            AgentError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Convert to a structured error payload
    pub fn to_error_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "retryable": self.is_retryable()
            }
        })
    }
}

/// Why a candidate plan was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("plan is not valid JSON: {0}")]
    Parse(String),

    #[error("plan does not match the step schema: {0}")]
    Structure(String),

    #[error("plan contains no steps")]
    Empty,
}

/// Why no workflow came out of planning
#[derive(Error, Debug)]
pub enum PlanningError {
    #[error("manual workflow template is empty")]
    EmptyTemplate,

    #[error("no valid workflow after {attempts} attempts")]
    Exhausted { attempts: usize },

    #[error("planning request failed: {0}")]
    Transport(#[source] AgentError),

    #[error("internal planning error: {0}")]
    Internal(#[source] AgentError),
}

/// Failure that ends a run, one variant per stage
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to build system instruction: {0}")]
    InstructionBuild(#[source] AgentError),

    #[error("failed to generate a valid workflow: {0}")]
    Planning(#[from] PlanningError),

    #[error("step {step} failed: {source}")]
    StepExecution {
        step: usize,
        #[source]
        source: AgentError,
    },

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_payload() {
        let error = AgentError::RateLimit { retry_after: 2 };
        let payload = error.to_error_payload();
        assert_eq!(payload["error"]["code"], "RATE_LIMIT_ERROR");
        assert_eq!(payload["error"]["retryable"], true);
    }

    #[test]
    fn test_step_error_display() {
        let error = RunError::StepExecution {
            step: 2,
            source: AgentError::Http("connection reset".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "step 2 failed: HTTP error: connection reset"
        );
    }
}
