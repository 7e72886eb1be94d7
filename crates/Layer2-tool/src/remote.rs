//! JSON-RPC wire contract for remote tool execution
//!
//! Serialization types only: the envelope, the tool-facing payloads and
//! the error-code mapping. Transports sit outside this crate and exchange
//! these types as JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::r#trait::{Tool, ToolResult};
use anvil_foundation::Error;

/// Protocol version carried in every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// List registered tools with their schemas
pub const METHOD_TOOLS_LIST: &str = "tools/list";

/// Execute a tool by name
pub const METHOD_TOOLS_CALL: &str = "tools/call";

// ============================================================================
// Envelope
// ============================================================================

/// JSON-RPC request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,

    /// Request id echoed back in the response
    pub id: Value,

    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response envelope; carries exactly one of `result` or `error`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,

    pub id: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Reserved JSON-RPC codes
pub const CODE_INVALID_PARAMS: i64 = -32602;
pub const CODE_INTERNAL_ERROR: i64 = -32603;

// Application codes, one per taxonomy kind
pub const CODE_TOOL_NOT_FOUND: i64 = -32001;
pub const CODE_TOOL_CONFLICT: i64 = -32002;
pub const CODE_PERMISSION_DENIED: i64 = -32003;
pub const CODE_TIMEOUT: i64 = -32004;
pub const CODE_EXECUTION_FAILED: i64 = -32005;
pub const CODE_OUTPUT_TOO_LARGE: i64 = -32006;

impl From<&Error> for RpcError {
    fn from(err: &Error) -> Self {
        let code = match err {
            Error::ToolNotFound { .. } => CODE_TOOL_NOT_FOUND,
            Error::ToolConflict { .. } => CODE_TOOL_CONFLICT,
            Error::InvalidInput { .. } => CODE_INVALID_PARAMS,
            Error::PermissionDenied { .. } => CODE_PERMISSION_DENIED,
            Error::Timeout { .. } => CODE_TIMEOUT,
            Error::ExecutionFailed { .. } => CODE_EXECUTION_FAILED,
            Error::OutputTooLarge { .. } => CODE_OUTPUT_TOO_LARGE,
            Error::Io(_) | Error::Json(_) => CODE_INTERNAL_ERROR,
        };

        let data = err
            .tool()
            .map(|tool| Value::Object(Map::from_iter([(
                "tool".to_string(),
                Value::String(tool.to_string()),
            )])));

        Self {
            code,
            message: err.to_string(),
            data,
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Parameters of a `tools/call` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,

    #[serde(default)]
    pub arguments: Map<String, Value>,

    /// Validate and report intent without executing
    #[serde(default)]
    pub dry_run: bool,

    /// Per-call timeout override, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// One item of `tools/call` response content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub content_type: String,

    pub text: String,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Result payload of a `tools/call` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ContentItem>,

    #[serde(default, rename = "isError")]
    pub is_error: bool,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl From<ToolResult> for ToolCallResult {
    fn from(result: ToolResult) -> Self {
        let mut content = vec![ContentItem::text(result.output)];
        if let Some(error) = result.error {
            content.push(ContentItem::text(error));
        }
        Self {
            content,
            is_error: !result.success,
            metadata: result.metadata,
        }
    }
}

/// One entry in a `tools/list` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,

    pub description: String,

    pub category: String,

    /// Input schema in JSON Schema object form
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,

    #[serde(default)]
    pub requires_confirmation: bool,
}

impl ToolDescriptor {
    /// Describe a registered tool for the wire
    pub fn describe(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            category: tool.category().to_string(),
            input_schema: serde_json::to_value(tool.schema()).unwrap_or(Value::Null),
            requires_confirmation: tool.requires_confirmation(),
        }
    }
}

/// Parameters of a `tools/list` request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolListParams {
    /// Opaque continuation token from a previous page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Result payload of a `tools/list` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListResult {
    pub tools: Vec<ToolDescriptor>,

    /// Present when more pages remain
    #[serde(
        default,
        rename = "nextCursor",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_request_roundtrip() {
        let request = RpcRequest::new(
            1,
            METHOD_TOOLS_CALL,
            Some(json!({"name": "bash", "arguments": {"command": "ls"}})),
        );
        let wire = serde_json::to_value(&request).unwrap();

        assert_eq!(wire["jsonrpc"], "2.0");
        assert_eq!(wire["method"], "tools/call");
        assert_eq!(wire["params"]["name"], "bash");

        let parsed: RpcRequest = serde_json::from_value(wire).unwrap();
        assert_eq!(parsed.id, json!(1));
    }

    #[test]
    fn test_response_shapes() {
        let ok = RpcResponse::success(json!(7), json!({"success": true}));
        let wire = serde_json::to_value(&ok).unwrap();
        assert!(wire.get("error").is_none());
        assert_eq!(wire["result"]["success"], true);

        let err = RpcResponse::failure(
            json!(8),
            RpcError {
                code: CODE_TIMEOUT,
                message: "timed out".to_string(),
                data: None,
            },
        );
        let wire = serde_json::to_value(&err).unwrap();
        assert!(wire.get("result").is_none());
        assert_eq!(wire["error"]["code"], CODE_TIMEOUT);
    }

    #[test]
    fn test_error_code_mapping() {
        let cases = [
            (
                Error::ToolNotFound {
                    tool: "x".to_string(),
                },
                CODE_TOOL_NOT_FOUND,
            ),
            (Error::invalid_input("f", "bad"), CODE_INVALID_PARAMS),
            (
                Error::permission_denied("read", "/etc", "outside"),
                CODE_PERMISSION_DENIED,
            ),
            (
                Error::Timeout {
                    tool: "bash".to_string(),
                    duration: Duration::from_secs(30),
                },
                CODE_TIMEOUT,
            ),
            (Error::execution_failed("boom"), CODE_EXECUTION_FAILED),
            (
                Error::OutputTooLarge {
                    tool: "bash".to_string(),
                    output_size: 2,
                    max_size: 1,
                },
                CODE_OUTPUT_TOO_LARGE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(RpcError::from(&err).code, expected);
        }
    }

    #[test]
    fn test_error_data_carries_tool_name() {
        let err = Error::Timeout {
            tool: "bash".to_string(),
            duration: Duration::from_secs(5),
        };
        let rpc = RpcError::from(&err);
        assert_eq!(rpc.data.unwrap()["tool"], "bash");
    }

    #[test]
    fn test_call_params_defaults() {
        let params: ToolCallParams =
            serde_json::from_value(json!({"name": "read_file"})).unwrap();
        assert!(params.arguments.is_empty());
        assert!(!params.dry_run);
        assert!(params.timeout_seconds.is_none());
    }

    #[test]
    fn test_call_result_from_tool_result() {
        let ok = ToolCallResult::from(ToolResult::success("done"));
        assert!(!ok.is_error);
        assert_eq!(ok.content.len(), 1);
        assert_eq!(ok.content[0].content_type, "text");
        assert_eq!(ok.content[0].text, "done");

        let failed = ToolCallResult::from(ToolResult::failure("exit code 1"));
        assert!(failed.is_error);
        assert_eq!(failed.content[1].text, "exit code 1");
    }

    #[test]
    fn test_list_pagination_fields() {
        let params: ToolListParams = serde_json::from_value(json!({})).unwrap();
        assert!(params.cursor.is_none());

        let page = ToolListResult {
            tools: vec![],
            next_cursor: Some("page-2".to_string()),
        };
        let wire = serde_json::to_value(&page).unwrap();
        assert_eq!(wire["nextCursor"], "page-2");

        let last = ToolListResult {
            tools: vec![],
            next_cursor: None,
        };
        let wire = serde_json::to_value(&last).unwrap();
        assert!(wire.get("nextCursor").is_none());
    }
}
