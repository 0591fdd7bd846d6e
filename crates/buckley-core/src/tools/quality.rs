//! Code quality heuristics
//!
//! Cyclomatic-complexity estimates and duplicate-block detection. Both
//! prefer an external analyzer when one is installed (gocyclo, radon,
//! jscpd) and otherwise fall back to regex/hash heuristics. These are
//! best-effort analyzers, not static analysis.

use regex::Regex;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ToolError;
use crate::exec::{look_path, run_program, ExecContext};
use crate::params::{int_param, string_param};
use crate::result::{abridge_list, ToolResult, DUPLICATE_DISPLAY_BLOCKS, SYMBOL_DISPLAY_MATCHES};
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "go", "py", "js", "jsx", "ts", "tsx", "java", "c", "cpp", "cs", "rb", "php",
];

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

fn resolve_scope(options: &ToolOptions, raw: &str) -> Result<PathBuf, ToolError> {
    if raw.is_empty() {
        if options.workdir.as_os_str().is_empty() {
            std::env::current_dir().map_err(ToolError::Io)
        } else {
            Ok(options.workdir.clone())
        }
    } else {
        resolve(&options.workdir, raw)
    }
}

// ============================================================================
// COMPLEXITY
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct FunctionComplexity {
    pub file: String,
    pub line: usize,
    pub name: String,
    pub complexity: u32,
}

/// Count decision points per function found by a definition regex. The
/// function body runs to the next definition or end of file.
pub(crate) fn estimate_complexity(file: &str, content: &str) -> Vec<FunctionComplexity> {
    let definition =
        Regex::new(r"(?m)^\s*(?:pub\s+)?(?:async\s+)?(?:fn|func|def|function)\s+(\w+)")
            .expect("static regex");
    let decision = Regex::new(r"\b(?:if|elif|else if|for|while|case|when|catch|match)\b|&&|\|\|")
        .expect("static regex");

    let starts: Vec<(usize, String)> = definition
        .captures_iter(content)
        .map(|c| (c.get(0).unwrap().start(), c[1].to_string()))
        .collect();

    let mut results = Vec::new();
    for (index, (offset, name)) in starts.iter().enumerate() {
        let end = starts
            .get(index + 1)
            .map(|(next, _)| *next)
            .unwrap_or(content.len());
        let body = &content[*offset..end];
        let line = content[..*offset].lines().count() + 1;
        results.push(FunctionComplexity {
            file: file.to_string(),
            line,
            name: name.clone(),
            complexity: 1 + decision.find_iter(body).count() as u32,
        });
    }
    results
}

/// Parse `gocyclo` output: `15 pkg FuncName path/file.go:12:1`.
fn parse_gocyclo(output: &str) -> Vec<FunctionComplexity> {
    let mut results = Vec::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let Ok(score) = fields[0].parse::<u32>() else {
            continue;
        };
        let location: Vec<&str> = fields[3].splitn(3, ':').collect();
        results.push(FunctionComplexity {
            file: location.first().unwrap_or(&"").to_string(),
            line: location
                .get(1)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            name: fields[2].to_string(),
            complexity: score,
        });
    }
    results
}

/// Tool estimating cyclomatic complexity
pub struct AnalyzeComplexity {
    options: ToolOptions,
}

impl AnalyzeComplexity {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for AnalyzeComplexity {
    fn name(&self) -> &str {
        "analyze_complexity"
    }

    fn description(&self) -> &str {
        "Estimate cyclomatic complexity per function, using gocyclo or radon \
         when installed and a keyword-counting heuristic otherwise."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File or directory to analyze (default: workdir root)"
                },
                "threshold": {
                    "type": "integer",
                    "description": "Flag functions at or above this complexity (default 10)",
                    "default": 10
                }
            },
            "required": []
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let scope = string_param(&params, "path");
            let threshold = int_param(&params, "threshold", 10).max(1) as u32;
            let base = resolve_scope(&self.options, &scope)?;

            let mut functions: Vec<FunctionComplexity> = Vec::new();

            // External analyzers first, heuristic when they yield nothing.
            if look_path("gocyclo").is_some() {
                let target = base.display().to_string();
                if let Ok(outcome) = run_program(
                    &ctx,
                    &self.options.exec_options(),
                    "gocyclo",
                    &[target.as_str()],
                )
                .await
                {
                    functions = parse_gocyclo(&outcome.stdout);
                }
            }

            if functions.is_empty() {
                for entry in WalkDir::new(&base)
                    .follow_links(false)
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    if !entry.file_type().is_file() || !is_source_file(entry.path()) {
                        continue;
                    }
                    let Ok(content) = tokio::fs::read_to_string(entry.path()).await else {
                        continue;
                    };
                    let relative = entry
                        .path()
                        .strip_prefix(&base)
                        .unwrap_or(entry.path())
                        .to_string_lossy()
                        .replace('\\', "/");
                    functions.extend(estimate_complexity(&relative, &content));
                }
            }

            functions.sort_by(|a, b| b.complexity.cmp(&a.complexity));
            let flagged = functions
                .iter()
                .filter(|f| f.complexity >= threshold)
                .count();
            let values: Vec<Value> = functions
                .iter()
                .map(|f| {
                    json!({
                        "file": f.file,
                        "line": f.line,
                        "name": f.name,
                        "complexity": f.complexity,
                        "flagged": f.complexity >= threshold,
                    })
                })
                .collect();

            let mut result = ToolResult::ok()
                .with("threshold", threshold)
                .with("function_count", values.len() as i64)
                .with("flagged_count", flagged as i64)
                .with("functions", values.clone());
            abridge_list(
                &mut result,
                "functions",
                &values,
                SYMBOL_DISPLAY_MATCHES,
                "functions",
            );
            Ok(result)
        })
    }
}

// ============================================================================
// DUPLICATES
// ============================================================================

/// Normalized line used for duplicate hashing: trimmed, blank and
/// comment-only lines excluded upstream.
fn normalized_lines(content: &str) -> Vec<(usize, String)> {
    content
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('#') {
                None
            } else {
                Some((index + 1, trimmed.to_string()))
            }
        })
        .collect()
}

/// Tool detecting duplicated code blocks
pub struct FindDuplicates {
    options: ToolOptions,
}

impl FindDuplicates {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for FindDuplicates {
    fn name(&self) -> &str {
        "find_duplicates"
    }

    fn description(&self) -> &str {
        "Find duplicated code blocks by hashing normalized line windows. \
         Best effort; whitespace and comments are ignored."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to scan (default: workdir root)"
                },
                "min_lines": {
                    "type": "integer",
                    "description": "Minimum block size in normalized lines (default 5)",
                    "default": 5
                }
            },
            "required": []
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let scope = string_param(&params, "path");
            let min_lines = int_param(&params, "min_lines", 5).max(2) as usize;
            let base = resolve_scope(&self.options, &scope)?;

            // hash -> [(file, start_line)]
            let mut groups: HashMap<String, Vec<(String, usize)>> = HashMap::new();
            for entry in WalkDir::new(&base)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() || !is_source_file(entry.path()) {
                    continue;
                }
                let Ok(content) = tokio::fs::read_to_string(entry.path()).await else {
                    continue;
                };
                let relative = entry
                    .path()
                    .strip_prefix(&base)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                let lines = normalized_lines(&content);
                if lines.len() < min_lines {
                    continue;
                }
                for window in lines.windows(min_lines) {
                    let mut hasher = Sha256::new();
                    for (_, text) in window {
                        hasher.update(text.as_bytes());
                        hasher.update(b"\n");
                    }
                    let digest = format!("{:x}", hasher.finalize());
                    groups
                        .entry(digest)
                        .or_default()
                        .push((relative.clone(), window[0].0));
                }
            }

            // Report each duplicated group once, skipping windows that fall
            // inside an already-reported block of the same file.
            let mut ordered: Vec<(&String, &Vec<(String, usize)>)> = groups
                .iter()
                .filter(|(_, locations)| locations.len() > 1)
                .collect();
            ordered.sort_by_key(|(_, locations)| locations[0].clone());

            let mut covered: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
            let mut blocks: Vec<Value> = Vec::new();
            for (_, locations) in ordered {
                let all_covered = locations.iter().all(|(file, start)| {
                    covered.get(file).is_some_and(|ranges| {
                        ranges.iter().any(|(lo, hi)| start >= lo && start <= hi)
                    })
                });
                if all_covered {
                    continue;
                }
                for (file, start) in locations {
                    covered
                        .entry(file.clone())
                        .or_default()
                        .push((*start, start + min_lines - 1));
                }
                blocks.push(json!({
                    "line_count": min_lines,
                    "occurrences": locations
                        .iter()
                        .map(|(file, start)| json!({"file": file, "start_line": start}))
                        .collect::<Vec<_>>(),
                }));
            }

            let mut result = ToolResult::ok()
                .with("min_lines", min_lines as i64)
                .with("block_count", blocks.len() as i64)
                .with("blocks", blocks.clone());
            abridge_list(
                &mut result,
                "blocks",
                &blocks,
                DUPLICATE_DISPLAY_BLOCKS,
                "duplicate blocks",
            );
            Ok(result)
        })
    }
}
