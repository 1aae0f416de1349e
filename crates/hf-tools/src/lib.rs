//! hf-tools: capability registry and built-in tools
//!
//! Tools declare their input contract with [`InputSpec`]; the
//! [`ToolRegistry`] validates arguments against it and applies credential
//! gating before any handler runs.

pub mod builtin;
pub mod context;
pub mod registry;
pub mod schema;
pub mod tool;

use hf_core::Result;
use tracing::info;

// Re-export main types
pub use builtin::builtin_tools;
pub use context::ToolContext;
pub use registry::{RegistryStats, ToolRegistry, ToolRegistryBuilder};
pub use schema::{FieldSpec, FieldType, InputSpec, ItemType};
pub use tool::{
    always, parse_args, requires_credentials, BoxedTool, CapabilityDescriptor, EnabledPredicate,
    SimpleTool, Tool,
};

/// Build the registry holding every built-in tool.
pub fn register_builtin_tools(ctx: &ToolContext) -> Result<ToolRegistry> {
    let registry = ToolRegistry::builder()
        .register_all(builtin_tools(ctx))
        .build(&ctx.config)?;
    info!(
        enabled = registry.list_tools().len(),
        write_tools = ctx.config.credentials_present(),
        "Registered built-in tools"
    );
    Ok(registry)
}
