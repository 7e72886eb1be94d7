//! # anvil-tool
//!
//! Tool execution layer for Anvil providing:
//! - Tool trait, schemas and input validation
//! - Concurrent registry with timeout, dry-run and cancellation policy
//! - Security sandbox for paths, commands and size ceilings
//! - Builtin tools (bash, exec_command, read_file, write_file, grep,
//!   search_replace, http_request)
//! - JSON-RPC wire contract for remote execution

pub mod builtin;
pub mod policy;
pub mod registry;
pub mod remote;
pub mod sandbox;
pub mod schema;
pub mod r#trait;
pub mod validator;

pub use policy::{ExecutionPolicy, DEFAULT_TIMEOUT};
pub use registry::ToolRegistry;
pub use sandbox::Sandbox;
pub use schema::{Category, PropertyDef, ToolSchema, ToolSchemaBuilder};
pub use r#trait::{Tool, ToolResult};
pub use validator::Validator;

// Re-export builtin tools
pub use builtin::{
    BashTool, ExecCommandTool, GrepTool, HttpRequestTool, ReadFileTool, SearchReplaceTool,
    WriteFileTool,
};

// Re-export the wire contract
pub use remote::{
    ContentItem, RpcError, RpcRequest, RpcResponse, ToolCallParams, ToolCallResult,
    ToolDescriptor, ToolListParams, ToolListResult,
};
