use super::{validation::validate_against_schema, SchemaHandle};
use crate::{
    core::steps::{Step, Workflow},
    error::ValidationError,
};
use serde_json::Value;

/// Strategies for accepting a model-produced plan
///
/// Both strategies only check structure: a JSON list of steps, each with
/// `action_type`, `action` and `tool_use`. Step content is never judged.
#[derive(Debug, Clone, Default)]
pub enum WorkflowValidator {
    /// Typed deserialization, reporting the failing path
    #[default]
    SerdeFirst,
    /// JSON Schema check against the generated step schema, then deserialization
    Strict(SchemaHandle),
}

impl WorkflowValidator {
    pub fn strict() -> crate::Result<Self> {
        Ok(WorkflowValidator::Strict(SchemaHandle::for_type::<
            Vec<Step>,
        >("workflow")?))
    }

    /// Parse `payload` into a workflow, or explain why it is not one.
    pub fn validate(&self, payload: &str) -> Result<Workflow, ValidationError> {
        let body = strip_code_fence(payload);
        let value: Value =
            serde_json::from_str(body).map_err(|err| ValidationError::Parse(err.to_string()))?;

        if let WorkflowValidator::Strict(schema) = self {
            validate_against_schema(schema, &value)?;
        }

        let steps: Vec<Step> = serde_path_to_error::deserialize(value).map_err(|err| {
            let path = err.path().to_string();
            let location = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            ValidationError::Structure(format!("at {}: {}", location, err.inner()))
        })?;

        Workflow::new(steps).ok_or(ValidationError::Empty)
    }
}

/// Strip a surrounding Markdown code fence, if any
fn strip_code_fence(payload: &str) -> &str {
    let trimmed = payload.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match inner.find('\n') {
        Some(newline) => inner[newline + 1..].trim(),
        None => inner.trim(),
    }
}
