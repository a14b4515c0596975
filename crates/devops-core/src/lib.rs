//! Core traits, types, and error handling for devops-mcp.
//!
//! This crate provides the tool model shared by every server variant:
//! the static tool catalog ([`ToolRegistry`]), the lookup-and-invoke path
//! ([`Dispatcher`]) and the error taxonomy that tool handlers report through.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod resource;
pub mod tool;

pub use dispatch::Dispatcher;
pub use error::{Error, ErrorKind, Result};
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use resource::{ResourceDescriptor, ResourceProvider};
pub use tool::{Arguments, ToolContent, ToolDescriptor, ToolFuture, ToolHandler, ToolResult};
