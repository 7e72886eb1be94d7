//! File reading with path sandboxing and size limits

use std::fmt::Write as _;
use std::sync::Arc;

use anvil_foundation::{Error, Result, DEFAULT_MAX_OUTPUT_SIZE};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::builtin::{opt_int, opt_str, require_str};
use crate::policy::ExecutionPolicy;
use crate::r#trait::{Tool, ToolResult};
use crate::sandbox::Sandbox;
use crate::schema::{Category, PropertyDef, ToolSchema};

const MAX_PATH_LENGTH: usize = 4096;
const MAX_READ_SIZE: i64 = 100 * 1024 * 1024;

/// Reads file contents from within the sandbox
pub struct ReadFileTool {
    sandbox: Arc<Sandbox>,
}

impl ReadFileTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads the contents of a file from the filesystem with path sandboxing and permission checks"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::builder()
            .property(
                "path",
                PropertyDef::string("The absolute or relative path to the file to read")
                    .with_max_length(MAX_PATH_LENGTH),
                true,
            )
            .integer_param(
                "max_size",
                "Maximum file size to read in bytes (default: 10MB, max: 100MB)",
                false,
            )
            .property(
                "encoding",
                PropertyDef::string("File encoding to use for reading (default: utf-8)")
                    .with_enum(&["utf-8", "ascii", "binary"])
                    .with_default("utf-8"),
                false,
            )
            .build()
    }

    fn category(&self) -> Category {
        Category::Filesystem
    }

    async fn execute(
        &self,
        _policy: &ExecutionPolicy,
        input: Map<String, Value>,
    ) -> Result<ToolResult> {
        let path = require_str(&input, "path")?;
        let path = self.sandbox.validate_path(path)?;

        let max_size = opt_int(&input, "max_size", DEFAULT_MAX_OUTPUT_SIZE as i64)?;
        if max_size <= 0 {
            return Err(Error::invalid_input("max_size", "max_size must be positive"));
        }
        if max_size > MAX_READ_SIZE {
            return Err(Error::invalid_input(
                "max_size",
                "max_size cannot exceed 100MB",
            ));
        }

        let encoding = opt_str(&input, "encoding")?.unwrap_or("utf-8");

        let meta = tokio::fs::metadata(&path).await.map_err(|e| {
            classify_io(e, "read", &path, &format!("file does not exist: {}", path.display()))
        })?;

        if meta.is_dir() {
            return Err(Error::invalid_input(
                "path",
                format!("path is a directory, not a file: {}", path.display()),
            ));
        }

        let file_size = meta.len();
        if file_size > max_size as u64 {
            return Err(Error::execution_failed(format!(
                "file size {} bytes exceeds max_size {} bytes",
                file_size, max_size
            )));
        }
        self.sandbox.validate_file_size(file_size)?;

        let content = tokio::fs::read(&path).await.map_err(|e| {
            classify_io(
                e,
                "read",
                &path,
                &format!("failed to read file: {}", path.display()),
            )
        })?;

        let output = match encoding {
            "binary" => {
                let mut hex = String::with_capacity(content.len() * 2);
                for byte in &content {
                    let _ = write!(hex, "{byte:02x}");
                }
                format!("Binary content ({} bytes): {hex}", content.len())
            }
            // "utf-8" and "ascii"; invalid sequences are replaced, not fatal
            _ => String::from_utf8_lossy(&content).into_owned(),
        };

        let mut metadata = Map::new();
        metadata.insert(
            "path".to_string(),
            Value::String(path.display().to_string()),
        );
        metadata.insert("size_bytes".to_string(), Value::from(file_size));
        metadata.insert("encoding".to_string(), Value::String(encoding.to_string()));
        if let Ok(modified) = meta.modified() {
            let modified: DateTime<Utc> = modified.into();
            metadata.insert(
                "modified_time".to_string(),
                Value::String(modified.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            metadata.insert(
                "permissions".to_string(),
                Value::String(format!("{:o}", meta.permissions().mode() & 0o7777)),
            );
        }

        let mut result = ToolResult::success(output);
        result.metadata = metadata;
        Ok(result)
    }
}

fn classify_io(
    e: std::io::Error,
    operation: &str,
    path: &std::path::Path,
    not_found_msg: &str,
) -> Error {
    match e.kind() {
        std::io::ErrorKind::NotFound => Error::execution_failed_with(not_found_msg, e),
        std::io::ErrorKind::PermissionDenied => Error::permission_denied(
            operation,
            path.display().to_string(),
            "insufficient permissions to access file",
        ),
        _ => Error::execution_failed_with(
            format!("cannot access file: {}", path.display()),
            e,
        ),
    }
}
