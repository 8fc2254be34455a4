pub mod schema;
pub(crate) mod validation;
pub mod validator;

pub use schema::SchemaHandle;
pub use validator::WorkflowValidator;
