//! Direct command execution without a shell
//!
//! The program and its arguments are passed as separate argv entries, so
//! shell metacharacters in arguments are inert. This is the preferred tool
//! when the command line does not need shell features.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anvil_foundation::{Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::builtin::{opt_bool, opt_int_in_range, opt_str, opt_string_map, require_str};
use crate::policy::ExecutionPolicy;
use crate::r#trait::{Tool, ToolResult};
use crate::sandbox::Sandbox;
use crate::schema::{Category, PropertyDef, ToolSchema};

const MAX_COMMAND_LENGTH: usize = 8192;
const DEFAULT_TIMEOUT_SECS: i64 = 30;
const MAX_TIMEOUT_SECS: i64 = 300;

/// Executes a single program with explicit arguments, no shell involved
pub struct ExecCommandTool {
    sandbox: Arc<Sandbox>,
}

impl ExecCommandTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ExecCommandTool {
    fn name(&self) -> &str {
        "exec_command"
    }

    fn description(&self) -> &str {
        "Executes a command directly with argument arrays, timeout handling, and output capture"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::builder()
            .property(
                "command",
                PropertyDef::string("The command to execute (e.g., 'ls', 'git', 'npm')")
                    .with_max_length(MAX_COMMAND_LENGTH),
                true,
            )
            .property(
                "args",
                PropertyDef::array(
                    "Command arguments as an array of strings (e.g., ['status', '--short'])",
                ),
                false,
            )
            .string_param(
                "working_dir",
                "Working directory for command execution (overrides default if provided)",
                false,
            )
            .integer_param(
                "timeout_seconds",
                "Command timeout in seconds (default: 30, max: 300)",
                false,
            )
            .property(
                "capture_stderr",
                PropertyDef::boolean("Whether to capture stderr separately (default: true)")
                    .with_default(true),
                false,
            )
            .property(
                "env",
                PropertyDef::object("Environment variables to set for the command (key-value pairs)"),
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
        let command = require_str(&input, "command")?.to_string();
        if command.is_empty() {
            return Err(Error::invalid_input("command", "command cannot be empty"));
        }

        // Only the program name is policy-checked; arguments never reach a
        // shell, so they carry no command injection surface.
        self.sandbox.validate_command(&command)?;

        let args = extract_args(&input)?;

        let working_dir = match opt_str(&input, "working_dir")? {
            Some(dir) => self.sandbox.resolve_working_dir(Some(dir))?,
            None => {
                let fallback = policy.working_dir.as_deref().and_then(Path::to_str);
                self.sandbox.resolve_working_dir(fallback)?
            }
        };

        let timeout_secs = opt_int_in_range(
            &input,
            "timeout_seconds",
            DEFAULT_TIMEOUT_SECS,
            1,
            MAX_TIMEOUT_SECS,
        )?;
        let timeout = Duration::from_secs(timeout_secs as u64);
        let capture_stderr = opt_bool(&input, "capture_stderr", true)?;
        let env_vars = opt_string_map(&input, "env")?;

        let mut cmd = Command::new(&command);
        cmd.args(&args)
            .current_dir(&working_dir)
            .envs(&policy.env)
            .envs(env_vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
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
        self.sandbox
            .validate_output_size((stdout.len() + stderr.len()) as u64)?;

        let exit_code = output.status.code().unwrap_or(-1);

        let mut text = String::new();
        text.push_str(&format!("Command: {} {}\n", command, args.join(" ")));
        text.push_str(&format!("Exit Code: {exit_code}\n"));
        text.push_str(&format!("Duration: {}ms\n", elapsed.as_millis()));
        text.push_str("\n--- STDOUT ---\n");
        if capture_stderr {
            text.push_str(&stdout);
            if !stderr.is_empty() {
                text.push_str("\n--- STDERR ---\n");
                text.push_str(&stderr);
            }
        } else {
            text.push_str(&stdout);
            text.push_str(&stderr);
        }

        let mut metadata = Map::new();
        metadata.insert("command".to_string(), Value::String(command));
        metadata.insert(
            "args".to_string(),
            Value::Array(args.into_iter().map(Value::String).collect()),
        );
        metadata.insert("exit_code".to_string(), Value::from(exit_code));
        metadata.insert(
            "duration_ms".to_string(),
            Value::from(elapsed.as_millis() as u64),
        );
        metadata.insert("stdout_bytes".to_string(), Value::from(stdout.len()));
        metadata.insert("stderr_bytes".to_string(), Value::from(stderr.len()));
        metadata.insert(
            "working_dir".to_string(),
            Value::String(working_dir.display().to_string()),
        );

        let mut result = if output.status.success() {
            ToolResult::success(text)
        } else {
            let mut r = ToolResult::failure(format!("exit code {exit_code}"));
            r.output = text;
            r
        };
        result.metadata = metadata;
        Ok(result)
    }
}

fn extract_args(input: &Map<String, Value>) -> Result<Vec<String>> {
    match input.get("args") {
        Some(Value::Array(items)) => {
            let mut args = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) => args.push(s.clone()),
                    _ => {
                        return Err(Error::invalid_input(
                            "args",
                            format!("argument at index {i} must be a string"),
                        ));
                    }
                }
            }
            Ok(args)
        }
        Some(_) => Err(Error::invalid_input("args", "args must be an array")),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_foundation::SecurityConfig;
    use serde_json::json;

    fn tool_in(dir: &std::path::Path) -> ExecCommandTool {
        let sandbox = Sandbox::from_config(SecurityConfig {
            allowed_paths: vec![dir.to_path_buf()],
            allowed_commands: vec!["echo".to_string(), "sh".to_string(), "env".to_string()],
            denied_commands: vec![],
            working_directory: Some(dir.to_path_buf()),
            audit_log: false,
            ..SecurityConfig::default()
        });
        ExecCommandTool::new(Arc::new(sandbox))
    }

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_argv_execution() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());

        let result = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({"command": "echo", "args": ["one", "two"]})),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("one two"));
        assert_eq!(result.metadata["exit_code"], 0);
        assert_eq!(result.metadata["args"], json!(["one", "two"]));
    }

    #[tokio::test]
    async fn test_metacharacters_are_inert() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());

        // The semicolon is a literal argument, not a command separator.
        let result = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({"command": "echo", "args": ["hello; rm -rf /"]})),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("hello; rm -rf /"));
    }

    #[tokio::test]
    async fn test_allow_list_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());

        let err = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({"command": "python", "args": []})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_env_passed_to_child() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());

        let result = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({
                    "command": "sh",
                    "args": ["-c", "echo $ANVIL_MARKER"],
                    "env": {"ANVIL_MARKER": "present"}
                })),
            )
            .await
            .unwrap();

        assert!(result.output.contains("present"));
    }

    #[tokio::test]
    async fn test_policy_working_dir_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(inner.join("marker.txt"), "x").unwrap();
        let tool = tool_in(dir.path());

        let result = tool
            .execute(
                &ExecutionPolicy::new().with_working_dir(&inner),
                input(json!({"command": "sh", "args": ["-c", "ls"]})),
            )
            .await
            .unwrap();

        assert!(result.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_non_string_arg_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());

        let err = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({"command": "echo", "args": ["ok", 2]})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { ref field, .. } if field == "args"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_execution_failed() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::from_config(SecurityConfig {
            allowed_paths: vec![dir.path().to_path_buf()],
            allowed_commands: vec![],
            denied_commands: vec![],
            working_directory: Some(dir.path().to_path_buf()),
            audit_log: false,
            ..SecurityConfig::default()
        });
        let tool = ExecCommandTool::new(Arc::new(sandbox));

        let err = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({"command": "definitely-not-a-real-binary"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());

        let err = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({
                    "command": "sh",
                    "args": ["-c", "sleep 30"],
                    "timeout_seconds": 1
                })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }
}
