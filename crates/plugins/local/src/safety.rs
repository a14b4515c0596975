//! Deny-list filter for caller-supplied shell commands.
//!
//! This is plain substring matching on the lower-cased command. It stops
//! accidental destructive commands and nothing more: quoting, variables,
//! aliases or a second shell trivially get around it. It is not a sandbox.

use devops_core::{Error, Result};

/// Lower-case substrings that cause a command to be rejected.
pub const DENIED_PATTERNS: &[&str] = &[
    "rm -rf",
    "del /f",
    "rd /s",
    "format",
    "shutdown",
    "restart-computer",
    "stop-computer",
    "remove-item -recurse",
];

/// Reject `command` if it contains a deny-listed pattern.
pub fn check_command(command: &str) -> Result<()> {
    let lowered = command.to_lowercase();
    match DENIED_PATTERNS.iter().find(|p| lowered.contains(*p)) {
        Some(pattern) => Err(Error::SafetyRejected(pattern.to_string())),
        None => Ok(()),
    }
}
