//! Security configuration
//!
//! Plain structured values supplied by the host at startup. The tool layer
//! turns a [`SecurityConfig`] into its sandbox; nothing here performs checks
//! itself.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default maximum file size for read/write operations (100MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Default maximum output size for command execution (10MB)
pub const DEFAULT_MAX_OUTPUT_SIZE: u64 = 10 * 1024 * 1024;

/// Sandbox policy configuration
///
/// Constructed once at startup (or per session) from trusted configuration
/// and treated as immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Directories tools may touch. Empty means deny all filesystem access.
    #[serde(default)]
    pub allowed_paths: Vec<PathBuf>,

    /// Command allow-list. Empty means any command not otherwise denied.
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,

    /// Command deny-list; always wins over the allow-list.
    #[serde(default = "default_denied_commands")]
    pub denied_commands: Vec<String>,

    /// Base directory for relative path resolution.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Maximum file size that can be read or written, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Maximum output size for command execution, in bytes.
    #[serde(default = "default_max_output_size")]
    pub max_output_size: u64,

    /// Whether granted/denied decisions are audit-logged.
    #[serde(default = "default_true")]
    pub audit_log: bool,
}

impl SecurityConfig {
    /// Sensible defaults rooted at the given working directory: only that
    /// directory is accessible, command tables use the built-in defaults.
    pub fn for_working_dir(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        Self {
            allowed_paths: vec![working_dir.clone()],
            allowed_commands: default_allowed_commands(),
            denied_commands: default_denied_commands(),
            working_directory: Some(working_dir),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            audit_log: true,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_paths: Vec::new(),
            allowed_commands: default_allowed_commands(),
            denied_commands: default_denied_commands(),
            working_directory: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            audit_log: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_max_output_size() -> u64 {
    DEFAULT_MAX_OUTPUT_SIZE
}

/// Commands considered safe enough to allow by default
pub fn default_allowed_commands() -> Vec<String> {
    [
        // File operations (safe variants)
        "ls", "cat", "grep", "find", "head", "tail", "wc", "file", "stat", "du", "diff", "sort",
        "uniq",
        // Text processing
        "sed", "awk", "cut", "tr", "paste", "column",
        // Version control
        "git",
        // Build tools
        "make", "go", "npm", "yarn", "pip", "cargo", "docker", "kubectl",
        // Testing
        "pytest", "jest", "mocha",
        // Utilities
        "echo", "printf", "date", "env", "which", "whereis", "pwd", "basename", "dirname",
        "realpath",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Commands denied by default regardless of the allow-list
pub fn default_denied_commands() -> Vec<String> {
    [
        // Destructive file operations
        "rm", "rmdir", "dd", "shred",
        // System modification
        "chmod", "chown", "chgrp", "useradd", "usermod", "userdel", "groupadd", "groupmod",
        "groupdel",
        // Package management (can modify the system)
        "apt", "apt-get", "yum", "dnf", "pacman",
        // Network tools with exfiltration potential
        "nc", "netcat", "telnet", "curl", "wget",
        // System control
        "shutdown", "reboot", "init", "systemctl", "service", "kill", "killall", "pkill",
        // Shell manipulation
        "exec", "eval", "source",
        // Disk operations
        "mount", "umount", "fdisk", "mkfs", "fsck",
        // Kernel modules
        "modprobe", "insmod", "rmmod",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fails_closed_on_paths() {
        let config = SecurityConfig::default();
        assert!(config.allowed_paths.is_empty());
        assert!(config.audit_log);
    }

    #[test]
    fn test_for_working_dir() {
        let config = SecurityConfig::for_working_dir("/work");
        assert_eq!(config.allowed_paths, vec![PathBuf::from("/work")]);
        assert_eq!(config.working_directory, Some(PathBuf::from("/work")));
        assert_eq!(config.max_output_size, DEFAULT_MAX_OUTPUT_SIZE);
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: SecurityConfig = serde_json::from_str(r#"{"allowed_paths": ["/tmp"]}"#).unwrap();
        assert_eq!(config.allowed_paths, vec![PathBuf::from("/tmp")]);
        assert!(config.denied_commands.iter().any(|c| c == "rm"));
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn test_deny_list_covers_destructive_commands() {
        for cmd in ["rm", "dd", "mkfs", "shutdown", "curl"] {
            assert!(
                default_denied_commands().iter().any(|c| c == cmd),
                "expected '{cmd}' in deny list"
            );
        }
    }
}
