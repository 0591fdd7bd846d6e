//! Refactoring tools
//!
//! Word-boundary rewrites over the workspace tree. These are textual, not
//! semantic: renames touch comments and strings too, which is stated in the
//! tool descriptions.

use regex::Regex;
use serde_json::{json, Value};
use std::path::Path;
use walkdir::WalkDir;

use crate::diff::generate_diff;
use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{bool_param, int_param, required_str, string_param};
use crate::result::{abridge_list, ToolResult, SYMBOL_DISPLAY_MATCHES};
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "go", "py", "js", "jsx", "ts", "tsx", "java", "c", "h", "cpp", "hpp", "cc", "cs", "rb",
    "php", "swift", "kt", "scala", "sh",
];

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Tool renaming a symbol across the workspace
pub struct RenameSymbol {
    options: ToolOptions,
}

impl RenameSymbol {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for RenameSymbol {
    fn name(&self) -> &str {
        "rename_symbol"
    }

    fn description(&self) -> &str {
        "Rename a symbol across source files using a word-boundary rewrite. \
         Textual: comments and strings containing the name change too. Use \
         dry_run=true to preview without writing."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "old_name": {
                    "type": "string",
                    "description": "Current symbol name"
                },
                "new_name": {
                    "type": "string",
                    "description": "Replacement symbol name"
                },
                "path": {
                    "type": "string",
                    "description": "Subtree to rewrite (default: workdir root)"
                },
                "dry_run": {
                    "type": "boolean",
                    "description": "Collect the changes without writing (default false)",
                    "default": false
                }
            },
            "required": ["old_name", "new_name"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let old_name = required_str(&params, "old_name")?;
            let new_name = required_str(&params, "new_name")?;
            let dry_run = bool_param(&params, "dry_run", false);
            let scope = string_param(&params, "path");

            if !is_identifier(old_name) {
                return Err(ToolError::InvalidParams(format!(
                    "old_name {:?} is not a valid identifier",
                    old_name
                )));
            }
            if !is_identifier(new_name) {
                return Err(ToolError::InvalidParams(format!(
                    "new_name {:?} is not a valid identifier",
                    new_name
                )));
            }

            let base = if scope.is_empty() {
                if self.options.workdir.as_os_str().is_empty() {
                    std::env::current_dir().map_err(ToolError::Io)?
                } else {
                    self.options.workdir.clone()
                }
            } else {
                resolve(&self.options.workdir, &scope)?
            };

            let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(old_name)))
                .map_err(|e| ToolError::InvalidParams(format!("invalid symbol: {}", e)))?;

            let mut files: Vec<Value> = Vec::new();
            let mut total_replacements = 0usize;
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
                let count = pattern.find_iter(&content).count();
                if count == 0 {
                    continue;
                }
                let new_content = pattern
                    .replace_all(&content, regex::NoExpand(new_name))
                    .into_owned();
                if !dry_run {
                    tokio::fs::write(entry.path(), &new_content)
                        .await
                        .map_err(ToolError::Io)?;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&base)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                total_replacements += count;
                files.push(json!({
                    "path": relative,
                    "replacements": count,
                }));
            }

            let mut result = ToolResult::ok()
                .with("old_name", old_name)
                .with("new_name", new_name)
                .with("dry_run", dry_run)
                .with("file_count", files.len() as i64)
                .with("total_replacements", total_replacements as i64)
                .with("files", files.clone())
                .with_display(
                    "summary",
                    format!(
                        "{} {} -> {} in {} file(s)",
                        if dry_run { "would rename" } else { "renamed" },
                        old_name,
                        new_name,
                        files.len()
                    ),
                )
                .abridged();
            abridge_list(&mut result, "files", &files, SYMBOL_DISPLAY_MATCHES, "files");
            Ok(result)
        })
    }
}

/// Tool extracting a line range into a named function
pub struct ExtractFunction {
    options: ToolOptions,
}

impl ExtractFunction {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }

    /// Language-shaped wrapper for the extracted body, appended at the end
    /// of the file, plus the call that replaces the range.
    fn scaffold(extension: &str, name: &str, body: &str, indent: &str) -> (String, String) {
        match extension {
            "py" => (
                format!("\n\ndef {}():\n{}\n", name, reindent(body, "    ")),
                format!("{}{}()", indent, name),
            ),
            "go" => (
                format!("\n\nfunc {}() {{\n{}\n}}\n", name, reindent(body, "\t")),
                format!("{}{}()", indent, name),
            ),
            "js" | "jsx" | "ts" | "tsx" => (
                format!("\n\nfunction {}() {{\n{}\n}}\n", name, reindent(body, "    ")),
                format!("{}{}();", indent, name),
            ),
            _ => (
                format!("\n\nfn {}() {{\n{}\n}}\n", name, reindent(body, "    ")),
                format!("{}{}();", indent, name),
            ),
        }
    }
}

fn reindent(body: &str, indent: &str) -> String {
    body.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, line.trim_start())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Tool for ExtractFunction {
    fn name(&self) -> &str {
        "extract_function"
    }

    fn description(&self) -> &str {
        "Extract a 1-indexed line range into a new function appended at the \
         end of the file, replacing the range with a call. Best-effort and \
         textual; review the diff."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file": {
                    "type": "string",
                    "description": "File to refactor (relative to workdir)"
                },
                "start_line": {
                    "type": "integer",
                    "description": "First line of the range (1-indexed)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Last line of the range (inclusive)"
                },
                "name": {
                    "type": "string",
                    "description": "Name for the extracted function"
                }
            },
            "required": ["file", "start_line", "end_line", "name"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let file = required_str(&params, "file")?;
            let name = required_str(&params, "name")?;
            let start = int_param(&params, "start_line", 0);
            let end = int_param(&params, "end_line", 0);

            if !is_identifier(name) {
                return Err(ToolError::InvalidParams(format!(
                    "name {:?} is not a valid identifier",
                    name
                )));
            }
            if start < 1 || end < start {
                return Err(ToolError::InvalidParams(
                    "start_line must be >= 1 and end_line >= start_line".into(),
                ));
            }

            let path = resolve(&self.options.workdir, file)?;
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|_| ToolError::NotFound(format!("file not found: {}", file)))?;

            let lines: Vec<&str> = content.lines().collect();
            if end as usize > lines.len() {
                return Err(ToolError::InvalidParams(format!(
                    "end_line {} is past the end of the file ({} lines)",
                    end,
                    lines.len()
                )));
            }

            let range = &lines[start as usize - 1..end as usize];
            let body = range.join("\n");
            let indent: String = range
                .first()
                .map(|l| l.chars().take_while(|c| c.is_whitespace()).collect())
                .unwrap_or_default();
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            let (function_text, call) = Self::scaffold(extension, name, &body, &indent);

            let mut new_lines: Vec<String> = Vec::with_capacity(lines.len());
            new_lines.extend(lines[..start as usize - 1].iter().map(|s| s.to_string()));
            new_lines.push(call);
            new_lines.extend(lines[end as usize..].iter().map(|s| s.to_string()));
            let mut new_content = new_lines.join("\n");
            new_content.push_str(&function_text);

            let preview = generate_diff(file, &content, &new_content);
            tokio::fs::write(&path, &new_content)
                .await
                .map_err(ToolError::Io)?;

            let mut result = ToolResult::ok()
                .with("path", path.display().to_string())
                .with("function", name)
                .with("lines_extracted", (end - start + 1) as i64)
                .with_display(
                    "summary",
                    format!("extracted lines {}-{} of {} into {}()", start, end, file, name),
                )
                .abridged();
            result.diff_preview = Some(preview);
            Ok(result)
        })
    }
}
