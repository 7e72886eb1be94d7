//! Find and replace across files
//!
//! Regex replacement with capture-group support (`$1`, `$2`), per-file
//! atomic rewrites, optional `.bak` backups and a dry-run preview mode.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anvil_foundation::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::builtin::grep::{collect_files, compile_pattern};
use crate::builtin::{opt_bool, opt_int_in_range, opt_str, require_str};
use crate::policy::ExecutionPolicy;
use crate::r#trait::{Tool, ToolResult};
use crate::sandbox::Sandbox;
use crate::schema::{Category, PropertyDef, ToolSchema};

const MAX_PATTERN_LENGTH: usize = 1024;
const MAX_REPLACEMENT_LENGTH: usize = 4096;
const DEFAULT_MAX_FILES: i64 = 100;

/// Performs regex find and replace across files within the sandbox
pub struct SearchReplaceTool {
    sandbox: Arc<Sandbox>,
}

impl SearchReplaceTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for SearchReplaceTool {
    fn name(&self) -> &str {
        "search_replace"
    }

    fn description(&self) -> &str {
        "Performs find and replace operations across files with regex support, backup options, and dry-run mode"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::builder()
            .property(
                "pattern",
                PropertyDef::string("Regular expression pattern to search for")
                    .with_max_length(MAX_PATTERN_LENGTH),
                true,
            )
            .property(
                "replacement",
                PropertyDef::string(
                    "Replacement string (supports regex capture groups like $1, $2)",
                )
                .with_max_length(MAX_REPLACEMENT_LENGTH),
                true,
            )
            .string_param(
                "path",
                "File or directory path to perform replacements (default: current working directory)",
                false,
            )
            .string_param(
                "file_pattern",
                "Glob pattern to filter files (e.g., '*.rs', '*.md')",
                false,
            )
            .property(
                "recursive",
                PropertyDef::boolean("Search recursively through subdirectories (default: false)")
                    .with_default(false),
                false,
            )
            .property(
                "case_sensitive",
                PropertyDef::boolean("Perform case-sensitive search (default: true)")
                    .with_default(true),
                false,
            )
            .property(
                "dry_run",
                PropertyDef::boolean("Preview changes without modifying files (default: false)")
                    .with_default(false),
                false,
            )
            .property(
                "backup",
                PropertyDef::boolean("Create backup files with .bak extension (default: true)")
                    .with_default(true),
                false,
            )
            .property(
                "max_files",
                PropertyDef::integer(format!(
                    "Maximum number of files to process (default: {DEFAULT_MAX_FILES})"
                ))
                .with_default(DEFAULT_MAX_FILES),
                false,
            )
            .build()
    }

    fn category(&self) -> Category {
        Category::Text
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        policy: &ExecutionPolicy,
        input: Map<String, Value>,
    ) -> Result<ToolResult> {
        let pattern_str = require_str(&input, "pattern")?;
        if pattern_str.is_empty() {
            return Err(Error::invalid_input("pattern", "pattern cannot be empty"));
        }
        let replacement = require_str(&input, "replacement")?.to_string();

        let case_sensitive = opt_bool(&input, "case_sensitive", true)?;
        let pattern = compile_pattern(pattern_str, case_sensitive)?;

        let search_path = match opt_str(&input, "path")? {
            Some(p) => self.sandbox.validate_path(p)?,
            None => self.sandbox.validate_path(&self.sandbox.working_directory)?,
        };

        let file_pattern = opt_str(&input, "file_pattern")?.unwrap_or("*");
        let file_pattern = glob::Pattern::new(file_pattern).map_err(|e| {
            Error::invalid_input("file_pattern", format!("invalid glob pattern: {e}"))
        })?;

        let opts = ReplaceOptions {
            pattern,
            replacement,
            file_pattern,
            recursive: opt_bool(&input, "recursive", false)?,
            dry_run: opt_bool(&input, "dry_run", false)?,
            backup: opt_bool(&input, "backup", true)?,
            max_files: opt_int_in_range(&input, "max_files", DEFAULT_MAX_FILES, 1, 1000)? as usize,
        };

        let cancel = policy.cancel.clone();
        let path = search_path.clone();
        let outcome = tokio::task::spawn_blocking(move || replace(&path, &opts, &cancel))
            .await
            .map_err(|e| Error::execution_failed_with("replace task failed", e))??;

        let mut metadata = Map::new();
        metadata.insert("pattern".to_string(), Value::String(pattern_str.to_string()));
        metadata.insert(
            "search_path".to_string(),
            Value::String(search_path.display().to_string()),
        );
        metadata.insert(
            "total_replacements".to_string(),
            Value::from(outcome.total_replacements),
        );
        metadata.insert(
            "files_changed".to_string(),
            Value::from(outcome.files_changed),
        );
        metadata.insert(
            "files_matched".to_string(),
            Value::from(outcome.files_matched.len()),
        );
        metadata.insert("dry_run".to_string(), Value::Bool(outcome.dry_run));
        metadata.insert(
            "backup_created".to_string(),
            Value::Bool(outcome.backup_created),
        );

        let mut result = ToolResult::success(outcome.output);
        result.metadata = metadata;
        Ok(result)
    }
}

struct ReplaceOptions {
    pattern: Regex,
    replacement: String,
    file_pattern: glob::Pattern,
    recursive: bool,
    dry_run: bool,
    backup: bool,
    max_files: usize,
}

struct ReplaceOutcome {
    output: String,
    total_replacements: usize,
    files_changed: usize,
    files_matched: Vec<PathBuf>,
    dry_run: bool,
    backup_created: bool,
}

fn replace(path: &Path, opts: &ReplaceOptions, cancel: &CancellationToken) -> Result<ReplaceOutcome> {
    let meta = fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::execution_failed(format!("search path does not exist: {}", path.display()))
        } else {
            Error::execution_failed_with(
                format!("cannot access search path: {}", path.display()),
                e,
            )
        }
    })?;

    let candidates = if meta.is_dir() {
        collect_files(path, &opts.file_pattern, opts.recursive, opts.max_files)
    } else {
        vec![path.to_path_buf()]
    };

    let mut files_matched = Vec::new();
    let mut files_changed = 0;
    let mut total_replacements = 0;

    for file in &candidates {
        if cancel.is_cancelled() {
            return Err(Error::execution_failed("replacement cancelled"));
        }

        // Files that cannot be processed are skipped, never fatal.
        let Ok(replacements) = replace_in_file(file, opts) else {
            continue;
        };
        if replacements > 0 {
            files_matched.push(file.clone());
            if !opts.dry_run {
                files_changed += 1;
            }
            total_replacements += replacements;
        }
    }

    let output = format_outcome(&files_matched, total_replacements, opts);
    Ok(ReplaceOutcome {
        output,
        total_replacements,
        files_changed,
        backup_created: opts.backup && !opts.dry_run && files_changed > 0,
        files_matched,
        dry_run: opts.dry_run,
    })
}

fn replace_in_file(path: &Path, opts: &ReplaceOptions) -> std::io::Result<usize> {
    let original = fs::read_to_string(path)?;
    let updated = opts.pattern.replace_all(&original, opts.replacement.as_str());

    if updated == original {
        return Ok(0);
    }
    let replacements = opts.pattern.find_iter(&original).count();

    if opts.dry_run {
        return Ok(replacements);
    }

    if opts.backup {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".bak");
        fs::write(path.with_file_name(name), &original)?;
    }

    // Atomic rewrite: temp file next to the target, then rename.
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp = path.with_file_name(temp_name);

    fs::write(&temp, updated.as_bytes())?;
    let perms = fs::metadata(path)?.permissions();
    if let Err(e) = fs::set_permissions(&temp, perms) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }

    Ok(replacements)
}

fn format_outcome(files: &[PathBuf], total: usize, opts: &ReplaceOptions) -> String {
    let mut out = String::new();

    if opts.dry_run {
        out.push_str("DRY RUN - No files were modified\n\n");
    }

    if total == 0 {
        return format!("No matches found for pattern: {}", opts.pattern.as_str());
    }

    let _ = writeln!(out, "Total replacements: {total}");
    let _ = writeln!(out, "Files affected: {}\n", files.len());

    if opts.dry_run {
        out.push_str("The following files would be modified:\n");
    } else {
        out.push_str("Modified files:\n");
    }
    for file in files {
        let _ = writeln!(out, "  - {}", file.display());
    }

    if opts.backup && !opts.dry_run {
        out.push_str("\nBackup files created with .bak extension\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_foundation::SecurityConfig;
    use serde_json::json;

    fn tool_in(dir: &std::path::Path) -> SearchReplaceTool {
        let sandbox = Sandbox::from_config(SecurityConfig {
            allowed_paths: vec![dir.to_path_buf()],
            working_directory: Some(dir.to_path_buf()),
            audit_log: false,
            ..SecurityConfig::default()
        });
        SearchReplaceTool::new(Arc::new(sandbox))
    }

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_simple_replace() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "foo bar foo").unwrap();

        let tool = tool_in(dir.path());
        let result = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({"pattern": "foo", "replacement": "baz", "backup": false})),
            )
            .await
            .unwrap();

        assert_eq!(result.metadata["total_replacements"], 2);
        assert_eq!(result.metadata["files_changed"], 1);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "baz bar baz");
    }

    #[tokio::test]
    async fn test_capture_groups() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("v.txt");
        std::fs::write(&file, "version = 1.2").unwrap();

        let tool = tool_in(dir.path());
        tool.execute(
            &ExecutionPolicy::new(),
            input(json!({
                "pattern": r"version = (\d+)\.(\d+)",
                "replacement": "version = $1.$2.0",
                "backup": false
            })),
        )
        .await
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "version = 1.2.0"
        );
    }

    #[tokio::test]
    async fn test_dry_run_leaves_files_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "foo").unwrap();

        let tool = tool_in(dir.path());
        let result = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({"pattern": "foo", "replacement": "bar", "dry_run": true})),
            )
            .await
            .unwrap();

        assert_eq!(result.metadata["dry_run"], true);
        assert_eq!(result.metadata["total_replacements"], 1);
        assert_eq!(result.metadata["files_changed"], 0);
        assert!(result.output.contains("DRY RUN"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "foo");
    }

    #[tokio::test]
    async fn test_backup_created_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "foo").unwrap();

        let tool = tool_in(dir.path());
        let result = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({"pattern": "foo", "replacement": "bar"})),
            )
            .await
            .unwrap();

        assert_eq!(result.metadata["backup_created"], true);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt.bak")).unwrap(),
            "foo"
        );
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "bar");
    }

    #[tokio::test]
    async fn test_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "nothing here").unwrap();

        let tool = tool_in(dir.path());
        let result = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({"pattern": "absent", "replacement": "x"})),
            )
            .await
            .unwrap();

        assert_eq!(result.metadata["total_replacements"], 0);
        assert!(result.output.contains("No matches found"));
    }

    #[tokio::test]
    async fn test_recursive_off_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("top.txt"), "foo").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/deep.txt"), "foo").unwrap();

        let tool = tool_in(dir.path());
        let result = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({"pattern": "foo", "replacement": "bar", "backup": false})),
            )
            .await
            .unwrap();

        assert_eq!(result.metadata["files_changed"], 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("sub/deep.txt")).unwrap(),
            "foo"
        );
    }

    #[tokio::test]
    async fn test_single_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("only.txt");
        std::fs::write(&file, "foo").unwrap();
        std::fs::write(dir.path().join("other.txt"), "foo").unwrap();

        let tool = tool_in(dir.path());
        let result = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({
                    "pattern": "foo",
                    "replacement": "bar",
                    "path": file.to_str().unwrap(),
                    "backup": false
                })),
            )
            .await
            .unwrap();

        assert_eq!(result.metadata["files_changed"], 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("other.txt")).unwrap(),
            "foo"
        );
    }

    #[tokio::test]
    async fn test_invalid_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());

        let err = tool
            .execute(
                &ExecutionPolicy::new(),
                input(json!({"pattern": "(dangling", "replacement": "x"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { ref field, .. } if field == "pattern"));
    }
}
