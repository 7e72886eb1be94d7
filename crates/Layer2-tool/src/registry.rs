//! Tool registry - concurrent registration, lookup and execution
//!
//! The registry owns the full execution pipeline: lookup, schema
//! validation, dry-run short-circuit, the timeout/cancellation race, the
//! output size ceiling, and metadata stamping. Tool bodies never see any
//! of this; they receive validated input and return a plain result.

use std::collections::HashMap;
use std::sync::Arc;

use anvil_foundation::{Error, Result};
use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::policy::ExecutionPolicy;
use crate::r#trait::{Tool, ToolResult};
use crate::sandbox::Sandbox;
use crate::schema::{Category, ToolSchema};
use crate::validator::Validator;

/// Concurrent registry of available tools
///
/// Lookups take a read lock only long enough to clone the `Arc`; the lock
/// is never held across an `.await`.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    validator: Validator,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            validator: Validator::new(),
        }
    }

    /// Create a registry pre-populated with the built-in tools, all
    /// sharing one sandbox
    pub fn with_builtins(sandbox: Arc<Sandbox>) -> Result<Self> {
        let registry = Self::new();

        registry.register(Arc::new(crate::builtin::BashTool::new(sandbox.clone())))?;
        registry.register(Arc::new(crate::builtin::ExecCommandTool::new(sandbox.clone())))?;
        registry.register(Arc::new(crate::builtin::ReadFileTool::new(sandbox.clone())))?;
        registry.register(Arc::new(crate::builtin::WriteFileTool::new(sandbox.clone())))?;
        registry.register(Arc::new(crate::builtin::GrepTool::new(sandbox.clone())))?;
        registry.register(Arc::new(crate::builtin::SearchReplaceTool::new(sandbox.clone())))?;
        registry.register(Arc::new(crate::builtin::HttpRequestTool::new(sandbox)))?;

        Ok(registry)
    }

    /// Register a tool.
    ///
    /// Returns [`Error::ToolConflict`] if the name is already taken;
    /// existing registrations are never silently replaced.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(Error::invalid_input("name", "tool name cannot be empty"));
        }

        let mut tools = self.tools.write();
        if tools.contains_key(&name) {
            return Err(Error::ToolConflict { tool: name });
        }

        debug!(tool = %name, "registered tool");
        tools.insert(name, tool);
        Ok(())
    }

    /// Remove a tool from the registry
    pub fn unregister(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools.write().remove(name).ok_or_else(|| Error::ToolNotFound {
            tool: name.to_string(),
        })
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ToolNotFound {
                tool: name.to_string(),
            })
    }

    /// Check whether a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Names of all registered tools
    pub fn names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    /// Snapshot of all registered tools
    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.read().values().cloned().collect()
    }

    /// All tools in a given category
    pub fn list_by_category(&self, category: Category) -> Vec<Arc<dyn Tool>> {
        self.tools
            .read()
            .values()
            .filter(|t| t.category() == category)
            .cloned()
            .collect()
    }

    /// Input schemas of all registered tools, by name
    pub fn schemas(&self) -> HashMap<String, ToolSchema> {
        self.tools
            .read()
            .iter()
            .map(|(name, tool)| (name.clone(), tool.schema()))
            .collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Execute a tool by name through the full pipeline.
    ///
    /// Order is fixed: lookup, validation, dry-run short-circuit, then the
    /// tool body raced against the timeout and the caller's cancellation
    /// token. A tool that loses the race is aborted, not awaited.
    pub async fn execute(
        &self,
        name: &str,
        policy: &ExecutionPolicy,
        input: Map<String, Value>,
    ) -> Result<ToolResult> {
        let tool = self.get(name)?;

        self.validator
            .validate(&tool.schema(), &input)
            .map_err(|e| e.with_tool(name))?;

        if policy.dry_run {
            debug!(tool = %name, "dry-run requested, skipping execution");
            let mut result =
                ToolResult::success(format!("Dry-run mode: would execute tool {name}"));
            result.metadata.insert("dry_run".to_string(), Value::Bool(true));
            return Ok(self.stamp(result, name));
        }

        let mut body = {
            let tool = tool.clone();
            let policy = policy.clone();
            tokio::spawn(async move { tool.execute(&policy, input).await })
        };

        let result = tokio::select! {
            joined = &mut body => match joined {
                Ok(result) => result,
                Err(join_err) if join_err.is_panic() => {
                    warn!(tool = %name, "tool body panicked");
                    Err(Error::execution_failed("tool panicked during execution"))
                }
                Err(_) => Err(Error::execution_failed("tool task was aborted")),
            },
            _ = tokio::time::sleep(policy.timeout) => {
                body.abort();
                warn!(tool = %name, timeout = ?policy.timeout, "tool timed out");
                return Err(Error::Timeout {
                    tool: name.to_string(),
                    duration: policy.timeout,
                });
            }
            _ = policy.cancel.cancelled() => {
                body.abort();
                debug!(tool = %name, "execution cancelled by caller");
                return Err(Error::execution_failed("execution cancelled").with_tool(name));
            }
        };

        let result = result.map_err(|e| e.with_tool(name))?;

        let output_size = result.output.len() as u64;
        if policy.max_output_size > 0 && output_size > policy.max_output_size {
            return Err(Error::OutputTooLarge {
                tool: name.to_string(),
                output_size,
                max_size: policy.max_output_size,
            });
        }

        Ok(self.stamp(result, name))
    }

    /// Stamp the execution metadata every returned result carries
    fn stamp(&self, mut result: ToolResult, name: &str) -> ToolResult {
        result
            .metadata
            .insert("tool_name".to_string(), Value::String(name.to_string()));
        result.metadata.insert(
            "execution_time".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        result
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes its input back"
        }
        fn schema(&self) -> ToolSchema {
            ToolSchema::builder().string_param("text", "Text to echo", true).build()
        }
        fn category(&self) -> Category {
            Category::Text
        }
        async fn execute(
            &self,
            _policy: &ExecutionPolicy,
            input: Map<String, Value>,
        ) -> Result<ToolResult> {
            let text = input["text"].as_str().unwrap_or_default();
            Ok(ToolResult::success(text))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Sleeps longer than any reasonable timeout"
        }
        fn schema(&self) -> ToolSchema {
            ToolSchema::empty()
        }
        fn category(&self) -> Category {
            Category::System
        }
        async fn execute(
            &self,
            _policy: &ExecutionPolicy,
            _input: Map<String, Value>,
        ) -> Result<ToolResult> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ToolResult::success("never reached"))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn schema(&self) -> ToolSchema {
            ToolSchema::empty()
        }
        fn category(&self) -> Category {
            Category::System
        }
        async fn execute(
            &self,
            _policy: &ExecutionPolicy,
            _input: Map<String, Value>,
        ) -> Result<ToolResult> {
            Err(Error::execution_failed("simulated failure"))
        }
    }

    fn echo_input(text: &str) -> Map<String, Value> {
        let mut input = Map::new();
        input.insert("text".to_string(), Value::String(text.to_string()));
        input
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        assert!(registry.contains("echo"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().name(), "echo");
        assert!(matches!(
            registry.get("missing").unwrap_err(),
            Error::ToolNotFound { .. }
        ));
    }

    #[test]
    fn test_duplicate_registration_is_conflict() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let err = registry.register(Arc::new(EchoTool)).unwrap_err();
        assert!(matches!(err, Error::ToolConflict { tool } if tool == "echo"));
        // the original registration survives
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.unregister("echo").unwrap();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.unregister("echo").unwrap_err(),
            Error::ToolNotFound { .. }
        ));
    }

    #[test]
    fn test_list_returns_snapshot() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.register(Arc::new(SlowTool)).unwrap();

        let tools = registry.list();
        let mut names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        assert_eq!(names, ["echo", "slow"]);

        // the snapshot is detached from later mutations
        registry.unregister("echo").unwrap();
        assert_eq!(tools.len(), 2);
    }

    #[test]
    fn test_list_by_category_and_schemas() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry.register(Arc::new(SlowTool)).unwrap();

        assert_eq!(registry.list_by_category(Category::Text).len(), 1);
        assert_eq!(registry.list_by_category(Category::System).len(), 1);
        assert_eq!(registry.list_by_category(Category::Network).len(), 0);

        let schemas = registry.schemas();
        assert!(schemas["echo"].required.contains(&"text".to_string()));
    }

    #[tokio::test]
    async fn test_execute_stamps_metadata() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let result = registry
            .execute("echo", &ExecutionPolicy::new(), echo_input("hello"))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "hello");
        assert_eq!(result.metadata["tool_name"], "echo");
        assert!(result.metadata["execution_time"].is_string());
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("missing", &ExecutionPolicy::new(), Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { tool } if tool == "missing"));
    }

    #[tokio::test]
    async fn test_validation_failure_names_tool_and_field() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let err = registry
            .execute("echo", &ExecutionPolicy::new(), Map::new())
            .await
            .unwrap_err();

        match err {
            Error::InvalidInput { tool, field, .. } => {
                assert_eq!(tool, "echo");
                assert_eq!(field, "text");
            }
            other => panic!("expected InvalidInput, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_dry_run_short_circuits() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SlowTool)).unwrap();

        // The slow body never runs; dry-run returns immediately.
        let result = registry
            .execute("slow", &ExecutionPolicy::new().dry_run(), Map::new())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.metadata["dry_run"], true);
        assert_eq!(result.metadata["tool_name"], "slow");
        assert!(result.output.contains("slow"));
    }

    #[tokio::test]
    async fn test_dry_run_still_validates() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let err = registry
            .execute("echo", &ExecutionPolicy::new().dry_run(), Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SlowTool)).unwrap();

        let policy = ExecutionPolicy::new().with_timeout(Duration::from_millis(50));
        let started = std::time::Instant::now();
        let err = registry.execute("slow", &policy, Map::new()).await.unwrap_err();
        let elapsed = started.elapsed();

        match err {
            Error::Timeout { tool, duration } => {
                assert_eq!(tool, "slow");
                assert_eq!(duration, Duration::from_millis(50));
            }
            other => panic!("expected Timeout, got {other}"),
        }

        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(5), "timeout fired late: {elapsed:?}");
    }

    #[tokio::test]
    async fn test_cancellation() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SlowTool)).unwrap();

        let cancel = CancellationToken::new();
        let policy = ExecutionPolicy::new().with_cancel(cancel.clone());

        let handle = tokio::spawn(async move { cancel.cancel() });
        let err = registry.execute("slow", &policy, Map::new()).await.unwrap_err();
        handle.await.unwrap();

        assert!(matches!(err, Error::ExecutionFailed { .. }));
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn test_tool_error_carries_tool_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool)).unwrap();

        let err = registry
            .execute("failing", &ExecutionPolicy::new(), Map::new())
            .await
            .unwrap_err();

        match err {
            Error::ExecutionFailed { tool, reason, .. } => {
                assert_eq!(tool, "failing");
                assert_eq!(reason, "simulated failure");
            }
            other => panic!("expected ExecutionFailed, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_output_too_large() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let policy = ExecutionPolicy::new().with_max_output_size(4);
        let err = registry
            .execute("echo", &policy, echo_input("way too long"))
            .await
            .unwrap_err();

        match err {
            Error::OutputTooLarge {
                tool,
                output_size,
                max_size,
            } => {
                assert_eq!(tool, "echo");
                assert_eq!(output_size, 12);
                assert_eq!(max_size, 4);
            }
            other => panic!("expected OutputTooLarge, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_execution() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(EchoTool)).unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .execute("echo", &ExecutionPolicy::new(), echo_input(&format!("msg-{i}")))
                    .await
                    .unwrap()
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap();
            assert_eq!(result.output, format!("msg-{i}"));
        }
    }
}
