//! Per-call execution policy
//!
//! An [`ExecutionPolicy`] is constructed fresh for every registry call and
//! never shared across calls. It carries the timeout, output ceiling,
//! dry-run flag and the caller's cancellation token.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use anvil_foundation::DEFAULT_MAX_OUTPUT_SIZE;

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-call execution configuration
#[derive(Debug, Clone)]
pub struct ExecutionPolicy {
    /// Deadline for the tool body
    pub timeout: Duration,

    /// Default working directory for process tools when the call's input
    /// does not name one; still sandbox-validated before use
    pub working_dir: Option<PathBuf>,

    /// Environment overrides passed to process-spawning tools
    pub env: HashMap<String, String>,

    /// Allowed-paths override for callers that construct a narrower
    /// sandbox per call; the built-ins enforce their shared sandbox's
    /// configured paths and do not read this field
    pub allowed_paths: Option<Vec<PathBuf>>,

    /// Ceiling on the result's output size, in bytes
    pub max_output_size: u64,

    /// Validate and report intent without invoking the tool body
    pub dry_run: bool,

    /// Caller-supplied cancellation; the timeout is raced against it
    pub cancel: CancellationToken,
}

impl ExecutionPolicy {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            working_dir: None,
            env: HashMap::new(),
            allowed_paths: None,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            dry_run: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_allowed_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.allowed_paths = Some(paths);
        self
    }

    pub fn with_max_output_size(mut self, bytes: u64) -> Self {
        self.max_output_size = bytes;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::new()
    }
}
