//! Error types for Anvil
//!
//! Every failure the framework can surface is one of the variants below.
//! The registry classifies tool-body failures into exactly one kind before
//! returning; nothing is silently retried.

use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error cause, inspectable via `std::error::Error::source`
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Anvil error taxonomy
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Registry
    // ========================================================================
    /// Requested tool name is absent from the registry
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// A tool with this name is already registered
    #[error("tool already registered: {tool}")]
    ToolConflict { tool: String },

    // ========================================================================
    // Validation
    // ========================================================================
    /// Schema or tool-level validation failure; never retried
    #[error("invalid input for field '{field}': {reason}")]
    InvalidInput {
        tool: String,
        field: String,
        reason: String,
    },

    // ========================================================================
    // Sandbox
    // ========================================================================
    /// Sandbox policy violation; fatal to the call
    #[error("permission denied: cannot {operation} '{resource}': {reason}")]
    PermissionDenied {
        tool: String,
        operation: String,
        resource: String,
        reason: String,
    },

    // ========================================================================
    // Execution
    // ========================================================================
    /// Policy deadline elapsed before the tool body completed
    #[error("tool '{tool}' timed out after {duration:?}")]
    Timeout { tool: String, duration: Duration },

    /// Tool body returned an error or was cancelled
    #[error("execution failed: {reason}")]
    ExecutionFailed {
        tool: String,
        reason: String,
        #[source]
        cause: Option<Cause>,
    },

    /// Result exceeded the configured output ceiling
    #[error("output size {output_size} bytes exceeds maximum {max_size} bytes")]
    OutputTooLarge {
        tool: String,
        output_size: u64,
        max_size: u64,
    },

    // ========================================================================
    // External conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Invalid-input helper; tool name is attached later via [`Error::with_tool`]
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            tool: String::new(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Permission-denied helper
    pub fn permission_denied(
        operation: impl Into<String>,
        resource: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::PermissionDenied {
            tool: String::new(),
            operation: operation.into(),
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Execution-failed helper without an underlying cause
    pub fn execution_failed(reason: impl Into<String>) -> Self {
        Error::ExecutionFailed {
            tool: String::new(),
            reason: reason.into(),
            cause: None,
        }
    }

    /// Execution-failed helper wrapping an underlying cause
    pub fn execution_failed_with(
        reason: impl Into<String>,
        cause: impl Into<Cause>,
    ) -> Self {
        Error::ExecutionFailed {
            tool: String::new(),
            reason: reason.into(),
            cause: Some(cause.into()),
        }
    }

    /// Fill in the tool name on variants that carry one, if not already set
    pub fn with_tool(mut self, name: &str) -> Self {
        match &mut self {
            Error::InvalidInput { tool, .. }
            | Error::PermissionDenied { tool, .. }
            | Error::ExecutionFailed { tool, .. }
            | Error::OutputTooLarge { tool, .. }
            | Error::Timeout { tool, .. } => {
                if tool.is_empty() {
                    *tool = name.to_string();
                }
            }
            _ => {}
        }
        self
    }

    /// The tool name attached to this error, if any
    pub fn tool(&self) -> Option<&str> {
        match self {
            Error::ToolNotFound { tool }
            | Error::ToolConflict { tool }
            | Error::InvalidInput { tool, .. }
            | Error::PermissionDenied { tool, .. }
            | Error::Timeout { tool, .. }
            | Error::ExecutionFailed { tool, .. }
            | Error::OutputTooLarge { tool, .. } => {
                if tool.is_empty() {
                    None
                } else {
                    Some(tool)
                }
            }
            _ => None,
        }
    }

    /// Whether the caller may reasonably retry (with a larger budget)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Whether the message is suitable for direct display to the user
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::ToolNotFound { .. }
                | Error::InvalidInput { .. }
                | Error::PermissionDenied { .. }
                | Error::Timeout { .. }
                | Error::OutputTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_tool_fills_empty_name() {
        let err = Error::invalid_input("path", "required field is missing").with_tool("read_file");
        assert_eq!(err.tool(), Some("read_file"));
    }

    #[test]
    fn test_with_tool_keeps_existing_name() {
        let err = Error::ExecutionFailed {
            tool: "bash".to_string(),
            reason: "exit 1".to_string(),
            cause: None,
        }
        .with_tool("other");
        assert_eq!(err.tool(), Some("bash"));
    }

    #[test]
    fn test_retryable() {
        let timeout = Error::Timeout {
            tool: "bash".to_string(),
            duration: Duration::from_secs(30),
        };
        assert!(timeout.is_retryable());
        assert!(!Error::invalid_input("x", "bad").is_retryable());
    }

    #[test]
    fn test_cause_is_inspectable() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::execution_failed_with("read failed", io);
        let source = std::error::Error::source(&err).expect("cause present");
        assert!(source.to_string().contains("gone"));
    }

    #[test]
    fn test_display_messages() {
        let err = Error::ToolNotFound {
            tool: "missing".to_string(),
        };
        assert_eq!(err.to_string(), "tool not found: missing");

        let err = Error::OutputTooLarge {
            tool: "bash".to_string(),
            output_size: 2048,
            max_size: 1024,
        };
        assert!(err.to_string().contains("2048"));
        assert!(err.to_string().contains("1024"));
    }
}
