use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// An invocable tool as offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Namespaced name, e.g. `demo_author/arxiv`
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON Schema for the tool's parameters
    pub parameters: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// The name used in function calls: the last path segment of `name`
    pub fn function_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Generate the tool schema for OpenAI function calling
    pub fn to_openai_tool(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.function_name(),
                "description": self.description,
                "parameters": self.parameters
            }
        })
    }
}

/// Source of tool descriptors, keyed by namespaced name
///
/// Unknown names are left out of the result rather than reported as errors.
pub trait ToolRegistry: Send + Sync + std::fmt::Debug {
    /// Look up descriptors for the requested names, in request order
    fn resolve(&self, names: &[String]) -> Vec<ToolDescriptor>;

    /// Every tool the registry can provide
    fn descriptors(&self) -> Vec<ToolDescriptor>;
}

/// Registry backed by an in-memory map
#[derive(Debug, Default, Clone)]
pub struct InMemoryToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl InMemoryToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, descriptor: ToolDescriptor) {
        self.tools.insert(descriptor.name.clone(), descriptor);
    }

    pub fn with_tool(mut self, descriptor: ToolDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Exact namespaced match first, then a unique bare function name
    /// (`arxiv` for `demo_author/arxiv`).
    pub fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        if let Some(tool) = self.tools.get(name) {
            return Some(tool);
        }
        let mut matches = self
            .tools
            .values()
            .filter(|tool| tool.function_name() == name);
        match (matches.next(), matches.next()) {
            (Some(tool), None) => Some(tool),
            _ => None,
        }
    }

    /// Get a tool by its namespaced name
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registry preloaded with the arXiv search tool the math template uses
    pub fn with_defaults() -> Self {
        Self::new().with_tool(ToolDescriptor::new(
            "demo_author/arxiv",
            "Search arXiv for papers, concepts and formulas matching a query",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query"}
                },
                "required": ["query"]
            }),
        ))
    }
}

impl ToolRegistry for InMemoryToolRegistry {
    fn resolve(&self, names: &[String]) -> Vec<ToolDescriptor> {
        names
            .iter()
            .filter_map(|name| self.lookup(name).cloned())
            .collect()
    }

    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().cloned().collect()
    }
}
