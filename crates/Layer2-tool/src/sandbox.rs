//! Security sandbox for tool operations
//!
//! The sandbox is the framework's sole security boundary: path
//! allow-listing with traversal-safe normalization, command allow/deny
//! lists with a dangerous-pattern scan, and file/output size ceilings.
//! All checks are pure functions of the sandbox state plus the request,
//! so equal inputs always produce the same decision.
//!
//! Policy asymmetry, deliberately mirroring how each list is used:
//! - Paths fail closed: no allowed paths configured means deny everything.
//! - Commands are open by default: no allow-list means any command not
//!   denied and not matching a dangerous pattern may run.

use std::path::{Component, Path, PathBuf};

use anvil_foundation::audit::{AuditAction, AuditDecision, AuditEntry};
use anvil_foundation::{Error, Result, SecurityConfig};

/// Built-in dangerous command patterns, denied unconditionally.
///
/// Matched as substrings of the full command line, independent of any
/// allow-list membership.
const DANGEROUS_PATTERNS: &[(&str, &str)] = &[
    ("rm -rf /", "attempt to delete root filesystem"),
    ("rm -rf /*", "attempt to delete root filesystem"),
    (":(){ :|:& };:", "fork bomb detected"),
    ("> /dev/sda", "attempt to overwrite disk device"),
    ("mkfs", "attempt to format filesystem"),
    ("/dev/sd", "direct disk device access"),
    ("chmod -R 777", "attempt to make everything world-writable"),
    ("chmod 777", "unsafe permission modification"),
];

/// Security sandbox enforcing path and command policy
///
/// Constructed once at startup from trusted configuration and treated as
/// immutable during operation; tools share a single instance.
#[derive(Debug, Clone)]
pub struct Sandbox {
    /// Directories tools may access. Empty denies all filesystem access.
    pub allowed_paths: Vec<PathBuf>,

    /// Command allow-list; empty allows any command not otherwise denied.
    pub allowed_commands: Vec<String>,

    /// Command deny-list; always wins over the allow-list.
    pub denied_commands: Vec<String>,

    /// Base directory for relative path resolution.
    pub working_directory: PathBuf,

    /// Maximum file size for read/write operations, in bytes.
    pub max_file_size: u64,

    /// Maximum output size for command execution, in bytes.
    pub max_output_size: u64,

    /// Whether decisions are audit-logged.
    pub audit_log: bool,
}

impl Sandbox {
    /// Sandbox with default policy rooted at `working_dir`
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self::from_config(SecurityConfig::for_working_dir(working_dir.into()))
    }

    /// Build a sandbox from trusted configuration
    pub fn from_config(config: SecurityConfig) -> Self {
        let working_directory = config
            .working_directory
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            allowed_paths: config.allowed_paths,
            allowed_commands: config.allowed_commands,
            denied_commands: config.denied_commands,
            working_directory,
            max_file_size: config.max_file_size,
            max_output_size: config.max_output_size,
            audit_log: config.audit_log,
        }
    }

    /// Resolve a path against the working directory and normalize it
    /// lexically (`.` and `..` components removed without touching the
    /// filesystem, so nonexistent targets can still be checked).
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_directory.join(path)
        };
        normalize_path(&absolute)
    }

    /// Check a path against the allow-list.
    ///
    /// Returns the normalized absolute path on grant. Empty allow-list
    /// denies everything (fail closed).
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let candidate = self.resolve_path(&path);

        if self.allowed_paths.is_empty() {
            self.audit_path(AuditDecision::Denied, &candidate, "no allowed paths configured");
            return Err(Error::permission_denied(
                "access",
                candidate.display().to_string(),
                "no allowed paths configured",
            ));
        }

        for allowed in &self.allowed_paths {
            let root = self.resolve_path(allowed);
            // Descendant check on normalized paths: the relative path from
            // the root must not escape upward.
            if candidate.starts_with(&root) {
                self.audit_path(
                    AuditDecision::Granted,
                    &candidate,
                    &format!("within {}", root.display()),
                );
                return Ok(candidate);
            }
        }

        self.audit_path(AuditDecision::Denied, &candidate, "outside allowed paths");
        Err(Error::permission_denied(
            "access",
            candidate.display().to_string(),
            format!(
                "path is outside allowed paths: [{}]",
                self.allowed_paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ))
    }

    /// Check a command line against deny-list, dangerous patterns and
    /// allow-list, in that order. Denial is authoritative.
    pub fn validate_command(&self, command: &str) -> Result<()> {
        let base = match command.split_whitespace().next() {
            Some(token) => token,
            None => {
                return Err(Error::invalid_input("command", "command cannot be empty"));
            }
        };

        // 1. Deny-list wins regardless of the allow-list.
        for denied in &self.denied_commands {
            if matches_command(base, denied) || command.contains(denied.as_str()) {
                self.audit_command(AuditDecision::Denied, command, &format!("denied: {denied}"));
                return Err(Error::permission_denied(
                    "execute",
                    command,
                    format!("command '{denied}' is explicitly denied"),
                ));
            }
        }

        // 2. Dangerous patterns deny unconditionally.
        for (pattern, reason) in DANGEROUS_PATTERNS {
            if command.contains(pattern) {
                self.audit_command(AuditDecision::Denied, command, reason);
                return Err(Error::permission_denied("execute", command, *reason));
            }
        }

        // 3. Allow-list required only when one is configured.
        if !self.allowed_commands.is_empty()
            && !self.allowed_commands.iter().any(|a| matches_command(base, a))
        {
            self.audit_command(AuditDecision::Denied, command, "not in allow list");
            return Err(Error::permission_denied(
                "execute",
                command,
                format!("command '{base}' is not in the allowed list"),
            ));
        }

        self.audit_command(AuditDecision::Granted, command, "");
        Ok(())
    }

    /// Resolve and validate a working directory: must be allowed, exist,
    /// and be a directory.
    pub fn resolve_working_dir(&self, dir: Option<&str>) -> Result<PathBuf> {
        let dir = match dir {
            Some(d) if !d.is_empty() => PathBuf::from(d),
            _ => self.working_directory.clone(),
        };

        let resolved = self.validate_path(&dir)?;

        let meta = std::fs::metadata(&resolved).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::execution_failed(format!(
                    "working directory does not exist: {}",
                    resolved.display()
                ))
            } else {
                Error::execution_failed_with(
                    format!("cannot stat working directory: {}", resolved.display()),
                    e,
                )
            }
        })?;

        if !meta.is_dir() {
            return Err(Error::execution_failed(format!(
                "path is not a directory: {}",
                resolved.display()
            )));
        }

        Ok(resolved)
    }

    /// Check a file size against the configured ceiling
    pub fn validate_file_size(&self, size: u64) -> Result<()> {
        if self.max_file_size > 0 && size > self.max_file_size {
            return Err(Error::execution_failed(format!(
                "file size {} bytes exceeds maximum allowed size {} bytes",
                size, self.max_file_size
            )));
        }
        Ok(())
    }

    /// Check an output size against the configured ceiling
    pub fn validate_output_size(&self, size: u64) -> Result<()> {
        if self.max_output_size > 0 && size > self.max_output_size {
            return Err(Error::OutputTooLarge {
                tool: String::new(),
                output_size: size,
                max_size: self.max_output_size,
            });
        }
        Ok(())
    }

    fn audit_path(&self, decision: AuditDecision, path: &Path, detail: &str) {
        if self.audit_log {
            AuditEntry::new(AuditAction::PathAccess, decision, path.display().to_string())
                .with_detail(detail)
                .emit();
        }
    }

    fn audit_command(&self, decision: AuditDecision, command: &str, detail: &str) {
        if self.audit_log {
            AuditEntry::new(AuditAction::CommandExecution, decision, command)
                .with_detail(detail)
                .emit();
        }
    }
}

/// Lexical path normalization: resolves `.` and `..` without hitting the
/// filesystem, so traversal attempts on nonexistent paths are still caught.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                match components.last() {
                    Some(Component::Normal(_)) => {
                        components.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {
                        // ".." at the root stays at the root
                    }
                    _ => components.push(component),
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }

    components.into_iter().collect()
}

/// Match a command's first token against an allow/deny entry: exact match,
/// or basename match when the entry is a path.
fn matches_command(base: &str, entry: &str) -> bool {
    if base == entry {
        return true;
    }
    if entry.contains('/') {
        return Path::new(entry)
            .file_name()
            .map(|n| n == base)
            .unwrap_or(false);
    }
    false
}
