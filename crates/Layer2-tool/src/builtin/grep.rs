//! Pattern search across files
//!
//! Regex search with context lines, glob file filtering and hard result
//! ceilings. The walk and scan run on the blocking pool; the caller's
//! cancellation token is polled between files.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anvil_foundation::{Error, Result};
use async_trait::async_trait;
use glob::Pattern;
use regex::Regex;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::builtin::{opt_bool, opt_int_in_range, opt_str, require_str};
use crate::policy::ExecutionPolicy;
use crate::r#trait::{Tool, ToolResult};
use crate::sandbox::Sandbox;
use crate::schema::{Category, PropertyDef, ToolSchema};

const MAX_PATTERN_LENGTH: usize = 1024;
const MAX_GLOB_LENGTH: usize = 256;
const DEFAULT_MAX_MATCHES: i64 = 1000;
const DEFAULT_MAX_FILES: i64 = 100;

/// Searches for regex patterns across files within the sandbox
pub struct GrepTool {
    sandbox: Arc<Sandbox>,
}

impl GrepTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Searches for patterns across files using regex with context lines, file filtering, and performance limits"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::builder()
            .property(
                "pattern",
                PropertyDef::string("Regular expression pattern to search for")
                    .with_max_length(MAX_PATTERN_LENGTH),
                true,
            )
            .string_param(
                "path",
                "Directory or file path to search (default: current working directory)",
                false,
            )
            .property(
                "file_pattern",
                PropertyDef::string("Glob pattern to filter files (e.g., '*.rs', '*.md')")
                    .with_max_length(MAX_GLOB_LENGTH),
                false,
            )
            .property(
                "recursive",
                PropertyDef::boolean("Search recursively through subdirectories (default: true)")
                    .with_default(true),
                false,
            )
            .property(
                "case_sensitive",
                PropertyDef::boolean("Perform case-sensitive search (default: true)")
                    .with_default(true),
                false,
            )
            .property(
                "context_before",
                PropertyDef::integer("Number of lines to show before each match (default: 0)")
                    .with_default(0),
                false,
            )
            .property(
                "context_after",
                PropertyDef::integer("Number of lines to show after each match (default: 0)")
                    .with_default(0),
                false,
            )
            .property(
                "max_matches",
                PropertyDef::integer(format!(
                    "Maximum number of matches to return (default: {DEFAULT_MAX_MATCHES})"
                ))
                .with_default(DEFAULT_MAX_MATCHES),
                false,
            )
            .property(
                "max_files",
                PropertyDef::integer(format!(
                    "Maximum number of files to search (default: {DEFAULT_MAX_FILES})"
                ))
                .with_default(DEFAULT_MAX_FILES),
                false,
            )
            .property(
                "show_line_numbers",
                PropertyDef::boolean("Show line numbers in results (default: true)")
                    .with_default(true),
                false,
            )
            .build()
    }

    fn category(&self) -> Category {
        Category::Text
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

        let case_sensitive = opt_bool(&input, "case_sensitive", true)?;
        let pattern = compile_pattern(pattern_str, case_sensitive)?;

        let search_path = match opt_str(&input, "path")? {
            Some(p) => self.sandbox.validate_path(p)?,
            None => self.sandbox.validate_path(&self.sandbox.working_directory)?,
        };

        let opts = GrepOptions {
            pattern,
            file_pattern: glob_filter(&input)?,
            recursive: opt_bool(&input, "recursive", true)?,
            context_before: opt_int_in_range(&input, "context_before", 0, 0, 10)? as usize,
            context_after: opt_int_in_range(&input, "context_after", 0, 0, 10)? as usize,
            max_matches: opt_int_in_range(&input, "max_matches", DEFAULT_MAX_MATCHES, 1, 10_000)?
                as usize,
            max_files: opt_int_in_range(&input, "max_files", DEFAULT_MAX_FILES, 1, 1000)? as usize,
            show_line_numbers: opt_bool(&input, "show_line_numbers", true)?,
        };

        let cancel = policy.cancel.clone();
        let path = search_path.clone();
        let outcome = tokio::task::spawn_blocking(move || search(&path, &opts, &cancel))
            .await
            .map_err(|e| Error::execution_failed_with("search task failed", e))??;

        self.sandbox.validate_output_size(outcome.output.len() as u64)?;

        let mut metadata = Map::new();
        metadata.insert("pattern".to_string(), Value::String(pattern_str.to_string()));
        metadata.insert(
            "search_path".to_string(),
            Value::String(search_path.display().to_string()),
        );
        metadata.insert(
            "total_matches".to_string(),
            Value::from(outcome.total_matches),
        );
        metadata.insert(
            "files_searched".to_string(),
            Value::from(outcome.files_searched),
        );
        metadata.insert(
            "files_with_matches".to_string(),
            Value::from(outcome.files_with_matches),
        );
        metadata.insert("truncated".to_string(), Value::Bool(outcome.truncated));

        let mut result = ToolResult::success(outcome.output);
        result.metadata = metadata;
        Ok(result)
    }
}

pub(crate) fn compile_pattern(pattern: &str, case_sensitive: bool) -> Result<Regex> {
    let source = if case_sensitive {
        pattern.to_string()
    } else {
        format!("(?i){pattern}")
    };
    Regex::new(&source)
        .map_err(|e| Error::invalid_input("pattern", format!("invalid regex pattern: {e}")))
}

fn glob_filter(input: &Map<String, Value>) -> Result<Pattern> {
    let raw = opt_str(input, "file_pattern")?.unwrap_or("*");
    Pattern::new(raw)
        .map_err(|e| Error::invalid_input("file_pattern", format!("invalid glob pattern: {e}")))
}

struct GrepOptions {
    pattern: Regex,
    file_pattern: Pattern,
    recursive: bool,
    context_before: usize,
    context_after: usize,
    max_matches: usize,
    max_files: usize,
    show_line_numbers: bool,
}

struct GrepOutcome {
    output: String,
    total_matches: usize,
    files_searched: usize,
    files_with_matches: usize,
    truncated: bool,
}

struct FileMatch {
    path: PathBuf,
    line_number: usize,
    line: String,
    before: Vec<String>,
    after: Vec<String>,
}

fn search(path: &Path, opts: &GrepOptions, cancel: &CancellationToken) -> Result<GrepOutcome> {
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

    let mut matches = Vec::new();
    let mut total_matches = 0;
    let mut files_searched = 0;
    let mut files_with_matches = 0;

    for file in &candidates {
        if cancel.is_cancelled() {
            return Err(Error::execution_failed("search cancelled"));
        }
        if files_searched >= opts.max_files || total_matches >= opts.max_matches {
            break;
        }

        files_searched += 1;
        // Unreadable or non-text files are skipped, never fatal.
        let Ok(content) = fs::read_to_string(file) else {
            continue;
        };

        let file_matches = search_content(file, &content, opts, opts.max_matches - total_matches);
        if !file_matches.is_empty() {
            files_with_matches += 1;
            total_matches += file_matches.len();
            matches.extend(file_matches);
        }
    }

    Ok(GrepOutcome {
        output: format_matches(&matches, opts),
        total_matches,
        files_searched,
        files_with_matches,
        truncated: total_matches >= opts.max_matches,
    })
}

fn search_content(
    path: &Path,
    content: &str,
    opts: &GrepOptions,
    budget: usize,
) -> Vec<FileMatch> {
    let lines: Vec<&str> = content.lines().collect();
    let mut matches = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if matches.len() >= budget {
            break;
        }
        if !opts.pattern.is_match(line) {
            continue;
        }

        let before_start = idx.saturating_sub(opts.context_before);
        let after_end = (idx + 1 + opts.context_after).min(lines.len());

        matches.push(FileMatch {
            path: path.to_path_buf(),
            line_number: idx + 1,
            line: (*line).to_string(),
            before: lines[before_start..idx].iter().map(|l| l.to_string()).collect(),
            after: lines[idx + 1..after_end].iter().map(|l| l.to_string()).collect(),
        });
    }

    matches
}

/// Files under `dir` whose name matches the glob, depth-first, capped
pub(crate) fn collect_files(
    dir: &Path,
    file_pattern: &Pattern,
    recursive: bool,
    max_files: usize,
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        if files.len() >= max_files {
            break;
        }
        let Ok(entries) = fs::read_dir(&current) else {
            continue;
        };

        let mut dirs = Vec::new();
        let mut entries: Vec<_> = entries.flatten().collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            if files.len() >= max_files {
                break;
            }
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                if recursive {
                    dirs.push(path);
                }
            } else if file_pattern.matches(&entry.file_name().to_string_lossy()) {
                files.push(path);
            }
        }
        // Push in reverse so the stack yields directories in name order
        for dir in dirs.into_iter().rev() {
            stack.push(dir);
        }
    }

    files
}

fn format_matches(matches: &[FileMatch], opts: &GrepOptions) -> String {
    if matches.is_empty() {
        return "No matches found".to_string();
    }

    let mut out = String::new();
    let mut current_file: Option<&Path> = None;

    for m in matches {
        if current_file != Some(m.path.as_path()) {
            if current_file.is_some() {
                out.push('\n');
            }
            let _ = writeln!(out, "=== {} ===", m.path.display());
            current_file = Some(m.path.as_path());
        }

        for line in &m.before {
            let _ = writeln!(out, "    {line}");
        }
        if opts.show_line_numbers {
            let _ = writeln!(out, "{}: {}", m.line_number, m.line);
        } else {
            let _ = writeln!(out, "{}", m.line);
        }
        for line in &m.after {
            let _ = writeln!(out, "    {line}");
        }
    }

    out
}
