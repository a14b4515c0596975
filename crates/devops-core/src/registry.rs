//! Static tool catalog.
//!
//! A [`ToolRegistry`] is assembled once at startup from declarative
//! descriptors and never changes afterwards. Lookups are exact and
//! case-sensitive.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::tool::{ToolDescriptor, ToolHandler};

/// Immutable name → handler table plus the ordered catalog.
pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Start building a registry.
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Full catalog in registration order.
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Descriptor of a registered tool.
    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Handler of a registered tool.
    pub fn handler(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field(
                "tools",
                &self.descriptors.iter().map(|d| &d.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder for [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    entries: Vec<(ToolDescriptor, Arc<dyn ToolHandler>)>,
}

impl ToolRegistryBuilder {
    /// Register a tool. Order of registration is the order of `list_tools`.
    pub fn register(mut self, descriptor: ToolDescriptor, handler: impl ToolHandler + 'static) -> Self {
        self.entries.push((descriptor, Arc::new(handler)));
        self
    }

    /// Register a tool only when `enabled` holds.
    pub fn register_if(
        self,
        enabled: bool,
        descriptor: ToolDescriptor,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        if enabled {
            self.register(descriptor, handler)
        } else {
            debug!(tool = %descriptor.name, "Tool disabled, not registering");
            self
        }
    }

    /// Finish the registry, rejecting duplicate names and schemas whose
    /// `required` fields are not declared in `properties`.
    pub fn build(self) -> Result<ToolRegistry> {
        let mut descriptors = Vec::with_capacity(self.entries.len());
        let mut handlers = HashMap::with_capacity(self.entries.len());

        for (descriptor, handler) in self.entries {
            if handlers.contains_key(&descriptor.name) {
                return Err(Error::Config(format!(
                    "Duplicate tool name: {}",
                    descriptor.name
                )));
            }

            let undeclared: Vec<&str> = descriptor
                .required_fields()
                .into_iter()
                .filter(|field| {
                    !descriptor
                        .properties()
                        .is_some_and(|props| props.contains_key(*field))
                })
                .collect();
            if !undeclared.is_empty() {
                return Err(Error::Config(format!(
                    "Tool {} requires undeclared properties: {}",
                    descriptor.name,
                    undeclared.join(", ")
                )));
            }

            handlers.insert(descriptor.name.clone(), handler);
            descriptors.push(descriptor);
        }

        debug!(count = descriptors.len(), "Tool registry built");
        Ok(ToolRegistry {
            descriptors,
            handlers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Arguments, ToolResult};
    use serde_json::json;

    async fn noop(_args: Arguments) -> Result<ToolResult> {
        Ok(ToolResult::text("ok"))
    }

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(
            name,
            format!("{} tool", name),
            json!({"type": "object", "properties": {}}),
        )
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let registry = ToolRegistry::builder()
            .register(descriptor("zeta"), noop)
            .register(descriptor("alpha"), noop)
            .register(descriptor("mid"), noop)
            .build()
            .unwrap();

        let names: Vec<_> = registry.list_tools().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = ToolRegistry::builder()
            .register(descriptor("same"), noop)
            .register(descriptor("same"), noop)
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("Duplicate tool name: same"));
    }

    #[test]
    fn test_undeclared_required_field_rejected() {
        let bad = ToolDescriptor::new(
            "bad",
            "bad tool",
            json!({"type": "object", "properties": {"a": {"type": "string"}}, "required": ["a", "b"]}),
        );

        let err = ToolRegistry::builder().register(bad, noop).build().unwrap_err();
        assert!(err.to_string().contains("undeclared properties: b"));
    }

    #[test]
    fn test_register_if_skips_disabled() {
        let registry = ToolRegistry::builder()
            .register_if(false, descriptor("docker_ps"), noop)
            .register_if(true, descriptor("run_command"), noop)
            .build()
            .unwrap();

        assert!(!registry.contains("docker_ps"));
        assert!(registry.contains("run_command"));
        assert!(registry.handler("docker_ps").is_none());
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let registry = ToolRegistry::builder()
            .register(descriptor("get_work_item"), noop)
            .build()
            .unwrap();

        assert!(registry.descriptor("get_work_item").is_some());
        assert!(registry.descriptor("GET_WORK_ITEM").is_none());
        assert!(!registry.contains("Get_Work_Item"));
    }

    #[test]
    fn test_list_tools_is_idempotent() {
        let registry = ToolRegistry::builder()
            .register(descriptor("a"), noop)
            .register(descriptor("b"), noop)
            .build()
            .unwrap();

        assert_eq!(registry.list_tools().to_vec(), registry.list_tools().to_vec());
    }
}
