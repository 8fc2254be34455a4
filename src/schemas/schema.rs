use schemars::{schema_for, JsonSchema};
use serde_json::Value;
use std::{any::type_name, sync::Arc};

/// Cached JSON schema generated for a Rust type.
#[derive(Clone, Debug)]
pub struct SchemaHandle {
    schema_name: &'static str,
    type_name: &'static str,
    schema_json: Arc<Value>,
}

impl SchemaHandle {
    pub fn for_type<T: JsonSchema>(schema_name: &'static str) -> crate::Result<Self> {
        let schema_json = serde_json::to_value(schema_for!(T))?;

        Ok(Self {
            schema_name,
            type_name: type_name::<T>(),
            schema_json: Arc::new(schema_json),
        })
    }

    pub fn schema_name(&self) -> &'static str {
        self.schema_name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn schema_json(&self) -> &Value {
        self.schema_json.as_ref()
    }
}
