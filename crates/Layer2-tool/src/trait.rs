//! Tool trait and execution result types

use crate::policy::ExecutionPolicy;
use crate::schema::{Category, ToolSchema};
use anvil_foundation::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether execution was successful
    pub success: bool,

    /// Result content (text output)
    pub output: String,

    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution metadata; the registry always stamps `tool_name` and
    /// `execution_time` before returning
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ToolResult {
    /// Create a success result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            metadata: Map::new(),
        }
    }

    /// Create a success result with metadata
    pub fn success_with_metadata(output: impl Into<String>, metadata: Value) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    /// Create a failure result carrying a displayable message
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            output: String::new(),
            error: Some(message),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Tool trait - implement this to expose a new capability
///
/// Instances are stateless apart from their configured sandbox and
/// allow-lists: created once at registration time, never mutated, read
/// concurrently by many executions.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Input schema; validated by the registry before execution
    fn schema(&self) -> ToolSchema;

    /// Category this tool belongs to
    fn category(&self) -> Category;

    /// Whether the host should ask the user before running this tool
    fn requires_confirmation(&self) -> bool {
        false
    }

    /// Execute with validated input.
    ///
    /// Implementations project the untyped map into a typed parameter
    /// struct as their first step; the generic validator only covers
    /// declared schema fields.
    async fn execute(&self, policy: &ExecutionPolicy, input: Map<String, Value>)
        -> Result<ToolResult>;
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}
