//! Capability registry
//!
//! Built once at startup from a declaration-ordered list of tools and the
//! process configuration, then shared read-only. Each tool's enabled
//! predicate is evaluated during `build` and never again.

use futures::FutureExt;
use hf_core::{BrokerConfig, Error, Result, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

use crate::tool::{BoxedTool, CapabilityDescriptor};

struct RegisteredTool {
    tool: BoxedTool,
    descriptor: CapabilityDescriptor,
}

/// Statistics about the registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_registered: usize,
    pub enabled: usize,
    pub total_calls: u64,
    pub rejected_calls: u64,
    pub failed_calls: u64,
    /// Enabled tools per category
    pub categories: BTreeMap<String, usize>,
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<BoxedTool>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tool. Registration order is listing order.
    pub fn register(mut self, tool: BoxedTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn register_all(mut self, tools: impl IntoIterator<Item = BoxedTool>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Freeze the tool list, resolving every enabled predicate against
    /// `config`. Fails on duplicate names.
    pub fn build(self, config: &BrokerConfig) -> Result<ToolRegistry> {
        let mut entries = Vec::with_capacity(self.tools.len());
        let mut index = HashMap::with_capacity(self.tools.len());

        for tool in self.tools {
            let name = tool.name().to_string();
            if index.insert(name.clone(), entries.len()).is_some() {
                return Err(Error::internal(format!("tool '{}' registered twice", name)));
            }

            let enabled = (tool.enabled_when())(config);
            if !enabled {
                debug!(tool = %name, "Tool disabled by configuration");
            }
            let descriptor = CapabilityDescriptor {
                name,
                description: tool.description().to_string(),
                input_schema: tool.input_spec().to_json_schema(),
                category: tool.category().to_string(),
                enabled,
            };
            entries.push(RegisteredTool { tool, descriptor });
        }

        let registry = ToolRegistry {
            entries,
            index,
            total_calls: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
        };
        info!(
            registered = registry.entries.len(),
            enabled = registry.list_tools().len(),
            "Tool registry built"
        );
        Ok(registry)
    }
}

/// Immutable tool registry
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
    total_calls: AtomicU64,
    rejected_calls: AtomicU64,
    failed_calls: AtomicU64,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// Enabled tools in declaration order
    pub fn list_tools(&self) -> Vec<&CapabilityDescriptor> {
        self.entries
            .iter()
            .map(|e| &e.descriptor)
            .filter(|d| d.enabled)
            .collect()
    }

    /// Every registered tool, enabled or not
    pub fn descriptors(&self) -> Vec<&CapabilityDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    pub fn descriptor(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i].descriptor)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.descriptor(name).is_some_and(|d| d.enabled)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Route a call: `UnknownTool`, then `Disabled`, then argument checks.
    pub fn resolve(&self, name: &str, arguments: &Value) -> Result<&BoxedTool> {
        let entry = self
            .index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::unknown_tool(name))?;

        if !entry.descriptor.enabled {
            return Err(Error::disabled(name));
        }
        entry.tool.input_spec().validate(arguments)?;
        Ok(&entry.tool)
    }

    /// Validate and run a tool. Handler failures, panics included, come
    /// back as errors; nothing here takes the process down.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let tool = match self.resolve(name, &arguments) {
            Ok(tool) => tool,
            Err(e) => {
                self.rejected_calls.fetch_add(1, Ordering::Relaxed);
                warn!(tool = %name, code = e.code(), error = %e, "Tool call rejected");
                return Err(e);
            }
        };

        debug!(tool = %name, "Executing tool");
        let result = match AssertUnwindSafe(tool.execute(arguments)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                error!(tool = %name, panic = %message, "Tool handler panicked");
                Err(Error::internal(format!("tool '{}' panicked: {}", name, message)))
            }
        };

        if let Err(e) = &result {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
            warn!(tool = %name, code = e.code(), error = %e, "Tool call failed");
        }
        result
    }

    pub fn stats(&self) -> RegistryStats {
        let mut categories = BTreeMap::new();
        for descriptor in self.list_tools() {
            *categories.entry(descriptor.category.clone()).or_insert(0) += 1;
        }
        RegistryStats {
            total_registered: self.entries.len(),
            enabled: self.entries.iter().filter(|e| e.descriptor.enabled).count(),
            total_calls: self.total_calls.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            categories,
        }
    }
}
