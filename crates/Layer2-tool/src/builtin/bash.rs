//! Shell command execution through `sh -c`
//!
//! The command line is a single string interpreted by the shell, so the
//! sandbox scans the whole line, not just the first token. For argv-style
//! execution without shell interpretation see
//! [`ExecCommandTool`](crate::builtin::ExecCommandTool).

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anvil_foundation::{Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::builtin::{opt_bool, opt_int_in_range, opt_str, require_str};
use crate::policy::ExecutionPolicy;
use crate::r#trait::{Tool, ToolResult};
use crate::sandbox::Sandbox;
use crate::schema::{Category, PropertyDef, ToolSchema};

const MAX_COMMAND_LENGTH: usize = 64 * 1024;
const DEFAULT_TIMEOUT_SECS: i64 = 30;
const MAX_TIMEOUT_SECS: i64 = 300;

/// Executes shell commands with sandboxing and separate stdout/stderr capture
pub struct BashTool {
    sandbox: Arc<Sandbox>,
}

impl BashTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Executes shell commands with security sandboxing, timeout support, and separate stdout/stderr capture"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::builder()
            .property(
                "command",
                PropertyDef::string("The shell command to execute")
                    .with_max_length(MAX_COMMAND_LENGTH),
                true,
            )
            .string_param(
                "working_dir",
                "Working directory for command execution (must be within allowed paths)",
                false,
            )
            .property(
                "timeout",
                PropertyDef::integer(format!(
                    "Execution timeout in seconds (default: {DEFAULT_TIMEOUT_SECS}, max: {MAX_TIMEOUT_SECS})"
                ))
                .with_default(DEFAULT_TIMEOUT_SECS),
                false,
            )
            .property(
                "capture_stderr",
                PropertyDef::boolean("Whether to capture stderr separately (default: true)")
                    .with_default(true),
                false,
            )
            .build()
    }

    fn category(&self) -> Category {
        Category::System
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        policy: &ExecutionPolicy,
        input: Map<String, Value>,
    ) -> Result<ToolResult> {
        let command = require_str(&input, "command")?.trim().to_string();
        if command.is_empty() {
            return Err(Error::invalid_input("command", "command cannot be empty"));
        }

        self.sandbox.validate_command(&command)?;

        let working_dir = match opt_str(&input, "working_dir")? {
            Some(dir) => self.sandbox.resolve_working_dir(Some(dir)).map_err(|e| {
                Error::invalid_input("working_dir", format!("invalid working directory: {e}"))
            })?,
            None => {
                let fallback = policy.working_dir.as_deref().and_then(Path::to_str);
                self.sandbox.resolve_working_dir(fallback)?
            }
        };

        let timeout_secs =
            opt_int_in_range(&input, "timeout", DEFAULT_TIMEOUT_SECS, 1, MAX_TIMEOUT_SECS)?;
        let timeout = Duration::from_secs(timeout_secs as u64);
        let capture_stderr = opt_bool(&input, "capture_stderr", true)?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command)
            .current_dir(&working_dir)
            .envs(&policy.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::execution_failed_with(
                    format!("failed to execute command: {command}"),
                    e,
                ));
            }
            // kill_on_drop reaps the child when the future is dropped here
            Err(_) => {
                return Err(Error::Timeout {
                    tool: self.name().to_string(),
                    duration: timeout,
                });
            }
        };
        let elapsed = started.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        let output_size = (stdout.len() + stderr.len()) as u64;
        self.sandbox.validate_output_size(output_size)?;

        let mut metadata = Map::new();
        metadata.insert("command".to_string(), Value::String(command.clone()));
        metadata.insert(
            "working_dir".to_string(),
            Value::String(working_dir.display().to_string()),
        );
        metadata.insert(
            "execution_time_ms".to_string(),
            Value::from(elapsed.as_millis() as u64),
        );
        metadata.insert("output_size".to_string(), Value::from(output_size));

        let exit_code = output.status.code().unwrap_or(-1);
        metadata.insert("exit_code".to_string(), Value::from(exit_code));

        if !output.status.success() {
            let mut text = format!("Command failed with exit code {exit_code}\n");
            if capture_stderr {
                if !stdout.is_empty() {
                    text.push_str(&format!("\n--- STDOUT ---\n{stdout}\n"));
                }
                if !stderr.is_empty() {
                    text.push_str(&format!("\n--- STDERR ---\n{stderr}\n"));
                }
            } else {
                // Streams are interleaved here, so neither label fits.
                let combined = format!("{stdout}{stderr}");
                if !combined.is_empty() {
                    text.push_str(&format!("\n--- OUTPUT ---\n{combined}\n"));
                }
            }

            let mut result = ToolResult::failure(format!("exit code {exit_code}"));
            result.output = text;
            result.metadata = metadata;
            return Ok(result);
        }

        let (text, has_stderr) = if capture_stderr && !stderr.is_empty() {
            (
                format!("--- STDOUT ---\n{stdout}\n\n--- STDERR ---\n{stderr}"),
                true,
            )
        } else if capture_stderr {
            (stdout, false)
        } else {
            (format!("{stdout}{stderr}"), false)
        };
        metadata.insert("has_stderr".to_string(), Value::Bool(has_stderr));

        let mut result = ToolResult::success(text);
        result.metadata = metadata;
        Ok(result)
    }
}
