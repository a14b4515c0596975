//! Local DevOps tools for devops-mcp.
//!
//! Wraps locally installed executables (`docker`, `git`) and ad-hoc shell
//! commands. The catalog is decided once at startup by [`probe::probe`].

pub mod probe;
pub mod runner;
pub mod safety;
pub mod tools;

pub use probe::{probe, Capabilities};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, TokioCommandRunner};
pub use tools::{register_tools, tool_descriptors, LocalTools};
