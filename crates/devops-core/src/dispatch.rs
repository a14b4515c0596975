//! Tool dispatch.
//!
//! The dispatcher is the single lookup-and-invoke path shared by every
//! server variant:
//!
//! 1. Route - exact match of the tool name against the registry
//! 2. Validate - required fields present, schema defaults filled in
//! 3. Invoke - run the handler (one external action)
//! 4. Capture - any failure becomes an in-band [`ToolResult`]

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::registry::ToolRegistry;
use crate::tool::{Arguments, ToolDescriptor, ToolResult};

/// Routes tool calls to their handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Full tool catalog in registration order.
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        self.registry.list_tools()
    }

    /// Call a tool, flattening any failure into the error envelope.
    ///
    /// Never fails: unknown tools, bad arguments and handler errors all come
    /// back as a [`ToolResult`] whose text names the tool and the error.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> ToolResult {
        match self.dispatch(name, arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = name, kind = ?e.kind(), "Tool call failed: {}", e);
                ToolResult::failure(name, &e)
            }
        }
    }

    /// Call a tool, keeping the typed error.
    pub async fn dispatch(&self, name: &str, arguments: Option<Value>) -> Result<ToolResult> {
        let (descriptor, handler) = match (
            self.registry.descriptor(name),
            self.registry.handler(name),
        ) {
            (Some(descriptor), Some(handler)) => (descriptor, handler),
            _ => return Err(Error::UnknownTool(name.to_string())),
        };

        let args = prepare_arguments(descriptor, arguments)?;

        info!(tool = name, "Calling tool");
        debug!(tool = name, arguments = ?args, "Tool arguments");

        handler.call(args).await
    }
}

/// Check required fields and fill in schema defaults.
fn prepare_arguments(descriptor: &ToolDescriptor, arguments: Option<Value>) -> Result<Arguments> {
    let mut args = Arguments::from_value(arguments)?;

    if let Some(missing) = descriptor
        .required_fields()
        .into_iter()
        .find(|field| !args.contains(field))
    {
        return Err(Error::MissingArgument(missing.to_string()));
    }

    for (field, default) in descriptor.defaults() {
        args.insert_default(field, default);
    }

    Ok(args)
}
