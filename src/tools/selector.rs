use super::tool::{ToolDescriptor, ToolRegistry};
use std::{collections::HashSet, sync::Arc};
use tracing::warn;

/// Maps a step's requested tool names to descriptors from the registry
#[derive(Debug, Clone)]
pub struct ToolSelector {
    registry: Arc<dyn ToolRegistry>,
}

impl ToolSelector {
    pub fn new(registry: Arc<dyn ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &dyn ToolRegistry {
        self.registry.as_ref()
    }

    /// Resolve `requested` to tools, or `None` when nothing should be offered.
    ///
    /// An empty request never reaches the registry.
    pub fn select(&self, requested: &[String]) -> Option<Vec<ToolDescriptor>> {
        if requested.is_empty() {
            return None;
        }

        let mut resolved = self.registry.resolve(requested);
        // `arxiv` and `demo_author/arxiv` may name the same tool.
        let mut seen = HashSet::new();
        resolved.retain(|tool| seen.insert(tool.name.clone()));

        let found: HashSet<&str> = resolved
            .iter()
            .flat_map(|tool| [tool.name.as_str(), tool.function_name()])
            .collect();
        for name in requested {
            if !found.contains(name.as_str()) {
                warn!(target: "workflow_agent::tools", tool = %name, "requested tool is not registered");
            }
        }

        if resolved.is_empty() {
            None
        } else {
            Some(resolved)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool::InMemoryToolRegistry;

    fn selector() -> ToolSelector {
        ToolSelector::new(Arc::new(InMemoryToolRegistry::with_defaults()))
    }

    #[test]
    fn test_empty_request_offers_no_tools() {
        assert!(selector().select(&[]).is_none());
    }

    #[test]
    fn test_known_tool_is_selected() {
        let tools = selector()
            .select(&["demo_author/arxiv".to_string()])
            .unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].function_name(), "arxiv");
    }

    #[test]
    fn test_bare_and_namespaced_names_offer_one_tool() {
        let tools = selector()
            .select(&["arxiv".to_string(), "demo_author/arxiv".to_string()])
            .unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "demo_author/arxiv");
    }

    #[test]
    fn test_only_unknown_tools_offers_nothing() {
        assert!(selector()
            .select(&["someone/unknown".to_string()])
            .is_none());
    }
}
