//! Error types for devops-mcp.

use thiserror::Error;

/// Main error type for tool execution and server startup.
#[derive(Error, Debug)]
pub enum Error {
    /// A required tool argument is absent or null
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    /// A tool argument has the wrong type or an unusable value
    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// No tool with this name is registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// No resource with this URI is exposed
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(String),

    /// Remote API returned a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Remote API returned a body we could not interpret
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Subprocess exited with a non-zero status
    #[error("Command '{command}' failed (exit code {}): {stderr}", exit_code_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Executable is not on the search path
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    /// Operation exceeded its time budget
    #[error("'{operation}' timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// Command matched the deny-list and was not executed
    #[error("Command rejected for safety reasons (matched '{0}')")]
    SafetyRejected(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad tool name or arguments; detected before any external call
    Validation,
    /// The work-tracking/CI API failed
    Remote,
    /// A local subprocess failed, was missing, or timed out
    LocalExecution,
    /// The deny-list rejected a command
    SafetyRejection,
    /// Mandatory configuration is missing; fatal at startup
    Startup,
    /// Anything else
    Internal,
}

impl Error {
    /// Build an error from a non-success HTTP status and response body.
    pub fn from_status(status: u16, message: String) -> Self {
        Error::Api { status, message }
    }

    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingArgument(_)
            | Error::InvalidArgument { .. }
            | Error::UnknownTool(_)
            | Error::UnknownResource(_) => ErrorKind::Validation,
            Error::Http(_) | Error::Api { .. } | Error::InvalidData(_) => ErrorKind::Remote,
            Error::CommandFailed { .. } | Error::ExecutableNotFound(_) | Error::Timeout { .. } => {
                ErrorKind::LocalExecution
            }
            Error::SafetyRejected(_) => ErrorKind::SafetyRejection,
            Error::Config(_) => ErrorKind::Startup,
            Error::Serialization(_) | Error::Io(_) | Error::Other(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for devops-mcp operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::MissingArgument("title".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(Error::UnknownTool("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            Error::from_status(404, "nope".into()).kind(),
            ErrorKind::Remote
        );
        assert_eq!(
            Error::Timeout {
                operation: "sleep".into(),
                secs: 1
            }
            .kind(),
            ErrorKind::LocalExecution
        );
        assert_eq!(
            Error::SafetyRejected("rm -rf".into()).kind(),
            ErrorKind::SafetyRejection
        );
        assert_eq!(Error::Config("no url".into()).kind(), ErrorKind::Startup);
    }

    #[test]
    fn test_api_error_display() {
        let err = Error::from_status(401, "Unauthorized".to_string());
        assert_eq!(err.to_string(), "API error 401: Unauthorized");
    }

    #[test]
    fn test_command_failed_display() {
        let err = Error::CommandFailed {
            command: "docker ps".into(),
            code: Some(1),
            stderr: "daemon not running".into(),
        };
        let text = err.to_string();
        assert!(text.contains("exit code 1"));
        assert!(text.contains("daemon not running"));

        let killed = Error::CommandFailed {
            command: "git status".into(),
            code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("exit code none"));
    }
}
