pub(crate) mod execution;
pub mod openai_client;
pub mod planning;
