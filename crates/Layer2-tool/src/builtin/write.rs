//! File writing with atomic replacement and path sandboxing
//!
//! Overwrites go through a temp file plus rename, so a crash mid-write
//! never leaves a half-written target. An optional backup preserves the
//! previous content next to the file with a `.bak` extension.

use std::path::Path;
use std::sync::Arc;

use anvil_foundation::{Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::builtin::{opt_bool, opt_str, require_str};
use crate::policy::ExecutionPolicy;
use crate::r#trait::{Tool, ToolResult};
use crate::sandbox::Sandbox;
use crate::schema::{Category, PropertyDef, ToolSchema};

const MAX_PATH_LENGTH: usize = 4096;
const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Writes content to files within the sandbox
pub struct WriteFileTool {
    sandbox: Arc<Sandbox>,
}

impl WriteFileTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Writes content to a file on the filesystem with path sandboxing and permission checks"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::builder()
            .property(
                "path",
                PropertyDef::string("The absolute or relative path to the file to write")
                    .with_max_length(MAX_PATH_LENGTH),
                true,
            )
            .property(
                "content",
                PropertyDef::string("The content to write to the file")
                    .with_max_length(MAX_CONTENT_LENGTH),
                true,
            )
            .property(
                "mode",
                PropertyDef::string(
                    "Write mode: 'overwrite' to replace file, 'append' to add to end (default: overwrite)",
                )
                .with_enum(&["overwrite", "append"])
                .with_default("overwrite"),
                false,
            )
            .property(
                "create_dirs",
                PropertyDef::boolean(
                    "Whether to create parent directories if they don't exist (default: false)",
                )
                .with_default(false),
                false,
            )
            .property(
                "permissions",
                PropertyDef::string("File permissions in octal format (e.g., '0644', default: '0644')")
                    .with_pattern("^0[0-7]{3}$")
                    .with_default("0644"),
                false,
            )
            .property(
                "backup",
                PropertyDef::boolean(
                    "Preserve the previous content as a .bak file before overwriting (default: false)",
                )
                .with_default(false),
                false,
            )
            .build()
    }

    fn category(&self) -> Category {
        Category::Filesystem
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        _policy: &ExecutionPolicy,
        input: Map<String, Value>,
    ) -> Result<ToolResult> {
        let path = require_str(&input, "path")?;
        let path = self.sandbox.validate_path(path)?;

        let content = require_str(&input, "content")?.to_string();
        self.sandbox.validate_file_size(content.len() as u64)?;

        let mode = opt_str(&input, "mode")?.unwrap_or("overwrite");
        let create_dirs = opt_bool(&input, "create_dirs", false)?;
        let backup = opt_bool(&input, "backup", false)?;

        let permissions_str = opt_str(&input, "permissions")?.unwrap_or("0644");
        let permissions = u32::from_str_radix(permissions_str, 8).map_err(|_| {
            Error::invalid_input(
                "permissions",
                format!("invalid permissions format: {permissions_str} (expected octal like '0644')"),
            )
        })?;

        let parent = path.parent().unwrap_or(Path::new("/"));
        match tokio::fs::metadata(parent).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !create_dirs {
                    return Err(Error::execution_failed(format!(
                        "parent directory does not exist: {} (use create_dirs=true to create it)",
                        parent.display()
                    )));
                }
                // Directories are only created inside the allowed paths.
                self.sandbox.validate_path(parent)?;
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::execution_failed_with(
                        format!("failed to create parent directories: {}", parent.display()),
                        e,
                    )
                })?;
            }
            Err(e) => {
                return Err(Error::execution_failed_with(
                    format!("cannot access parent directory: {}", parent.display()),
                    e,
                ));
            }
        }

        let (is_new_file, previous_size) = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {
                return Err(Error::invalid_input(
                    "path",
                    format!("path is a directory, not a file: {}", path.display()),
                ));
            }
            Ok(meta) => (false, meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (true, 0),
            Err(e) => {
                return Err(Error::execution_failed_with(
                    format!("cannot stat file: {}", path.display()),
                    e,
                ));
            }
        };

        let mut backup_path = None;
        if backup && !is_new_file && mode == "overwrite" {
            let bak = sibling(&path, ".bak");
            tokio::fs::copy(&path, &bak).await.map_err(|e| {
                Error::execution_failed_with(
                    format!("failed to create backup: {}", bak.display()),
                    e,
                )
            })?;
            backup_path = Some(bak);
        }

        let bytes_written = match mode {
            "overwrite" => {
                let temp = sibling(&path, ".tmp");
                if let Err(e) = tokio::fs::write(&temp, &content).await {
                    return Err(write_error(e, &path));
                }
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(permissions);
                    if let Err(e) = tokio::fs::set_permissions(&temp, perms).await {
                        let _ = tokio::fs::remove_file(&temp).await;
                        return Err(write_error(e, &path));
                    }
                }
                if let Err(e) = tokio::fs::rename(&temp, &path).await {
                    let _ = tokio::fs::remove_file(&temp).await;
                    return Err(write_error(e, &path));
                }
                content.len()
            }
            "append" => {
                use tokio::io::AsyncWriteExt;
                let mut file = tokio::fs::OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(&path)
                    .await
                    .map_err(|e| write_error(e, &path))?;
                file.write_all(content.as_bytes())
                    .await
                    .map_err(|e| write_error(e, &path))?;
                file.flush().await.map_err(|e| write_error(e, &path))?;
                content.len()
            }
            other => {
                return Err(Error::invalid_input(
                    "mode",
                    format!("unsupported mode: {other} (must be 'overwrite' or 'append')"),
                ));
            }
        };

        let final_size = tokio::fs::metadata(&path)
            .await
            .map(|m| m.len())
            .unwrap_or(bytes_written as u64);

        let mut metadata = Map::new();
        metadata.insert(
            "path".to_string(),
            Value::String(path.display().to_string()),
        );
        metadata.insert("bytes_written".to_string(), Value::from(bytes_written));
        metadata.insert("mode".to_string(), Value::String(mode.to_string()));
        metadata.insert("is_new_file".to_string(), Value::Bool(is_new_file));
        metadata.insert(
            "previous_size_bytes".to_string(),
            Value::from(previous_size),
        );
        metadata.insert("final_size_bytes".to_string(), Value::from(final_size));
        if let Some(bak) = backup_path {
            metadata.insert(
                "backup_path".to_string(),
                Value::String(bak.display().to_string()),
            );
        }

        let mut result = ToolResult::success(format!(
            "Successfully wrote {} bytes to {}",
            bytes_written,
            path.display()
        ));
        result.metadata = metadata;
        Ok(result)
    }
}

/// Path with a suffix appended to the file name, in the same directory
fn sibling(path: &Path, suffix: &str) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

fn write_error(e: std::io::Error, path: &Path) -> Error {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        Error::permission_denied(
            "write",
            path.display().to_string(),
            "insufficient permissions to write file",
        )
    } else {
        Error::execution_failed_with(format!("failed to write file: {}", path.display()), e)
    }
}
