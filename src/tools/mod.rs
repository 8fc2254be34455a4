//! Tool lookup: the registry boundary and the per-step selector

pub mod selector;
pub mod tool;

pub use selector::ToolSelector;
pub use tool::{InMemoryToolRegistry, ToolDescriptor, ToolRegistry};
