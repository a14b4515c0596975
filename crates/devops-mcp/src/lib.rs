//! MCP (Model Context Protocol) server for devops-mcp.
//!
//! Wraps a [`devops_core::Dispatcher`] (and optionally a resource provider)
//! in the MCP JSON-RPC lifecycle, served over stdio or HTTP.

pub mod http;
pub mod protocol;
pub mod server;
pub mod transport;

pub use server::McpServer;
