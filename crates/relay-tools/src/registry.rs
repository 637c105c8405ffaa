//! The tool registry (§4.M): a name-keyed, insertion-ordered collection
//! of `Tool`s. Registering a name already present overrides it in place
//! rather than duplicating it — last registration wins, but the original
//! insertion position is kept so `definitions()` stays stable.
//!
//! Ordered by `IndexMap` rather than the teacher's plain `HashMap`: the
//! spec requires `definitions()` to return tools in a stable, caller-
//! visible order, which an unordered map cannot guarantee.

use indexmap::IndexMap;
use relay_core::{Tool, ToolSchema};

#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Tool> {
        self.tools.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools in registration order, for provider-facing requests.
    pub fn definitions(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema.clone()).collect()
    }

    pub fn list(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(name: &str) -> ToolSchema {
        ToolSchema {
            name: name.to_string(),
            description: String::new(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn definitions_preserve_insertion_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::passive(schema("b")));
        registry.register(Tool::passive(schema("a")));
        registry.register(Tool::passive(schema("c")));
        let names: Vec<_> = registry.definitions().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn re_registering_a_name_overrides_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::passive(schema("a")));
        registry.register(Tool::passive(schema("b")));
        let mut replaced = schema("a");
        replaced.description = "replaced".to_string();
        registry.register(Tool::passive(replaced));

        let names: Vec<_> = registry.definitions().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().schema.description, "replaced");
    }

    #[test]
    fn remove_drops_a_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Tool::passive(schema("a")));
        assert!(registry.remove("a").is_some());
        assert!(!registry.contains("a"));
    }
}
