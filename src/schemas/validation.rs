use crate::{error::ValidationError, schemas::SchemaHandle};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

const MAX_SCHEMA_ERRORS: usize = 3;

/// Validate a payload against a schema, reporting at most three violations
pub(crate) fn validate_against_schema(
    schema: &SchemaHandle,
    payload: &Value,
) -> std::result::Result<(), ValidationError> {
    let validator = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema.schema_json())
        .map_err(|err| {
            ValidationError::Structure(format!(
                "failed to prepare `{}` schema for validation: {}",
                schema.schema_name(),
                err
            ))
        })?;

    if let Err(errors) = validator.validate(payload) {
        let mut details = Vec::new();
        let mut truncated = false;

        for (idx, error) in errors.enumerate() {
            if idx < MAX_SCHEMA_ERRORS {
                let mut path = error.instance_path.to_string();
                if path.is_empty() {
                    path = "<root>".to_string();
                }
                details.push(format!("{}: {}", path, error));
            } else {
                truncated = true;
                break;
            }
        }

        let mut detail_str = if details.is_empty() {
            "payload failed schema validation".to_string()
        } else {
            details.join("; ")
        };

        if truncated {
            detail_str.push_str("; additional errors truncated");
        }

        return Err(ValidationError::Structure(format!(
            "does not match `{}` schema: {}",
            schema.schema_name(),
            detail_str
        )));
    }

    Ok(())
}
