//! Azure DevOps integration for devops-mcp.
//!
//! Provides a REST client, the work-item / pipeline / repository tool
//! catalog and the read-only `azuredevops://` resources.

pub mod client;
pub mod format;
pub mod patch;
pub mod resources;
pub mod tools;
pub mod types;
pub mod wiql;

pub use client::AzureDevOpsClient;
pub use resources::AzureResources;
pub use tools::{register_tools, tool_descriptors};
