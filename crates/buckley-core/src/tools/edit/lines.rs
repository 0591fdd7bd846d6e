//! Line-oriented edit tools

use serde_json::{json, Value};

use crate::diff::generate_diff;
use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{int_param, required_str};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Tool inserting text at a 1-indexed line position
pub struct InsertText {
    options: ToolOptions,
}

impl InsertText {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for InsertText {
    fn name(&self) -> &str {
        "insert_text"
    }

    fn description(&self) -> &str {
        "Insert text at a given line number (1-indexed). The inserted text \
         becomes that line; existing lines shift down."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to modify (relative to workdir)"
                },
                "line": {
                    "type": "integer",
                    "description": "1-indexed line to insert at"
                },
                "text": {
                    "type": "string",
                    "description": "Text to insert (may span multiple lines)"
                }
            },
            "required": ["path", "line", "text"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let path_str = required_str(&params, "path")?;
            let text = required_str(&params, "text")?;
            let line = int_param(&params, "line", 0);
            if line < 1 {
                return Err(ToolError::InvalidParams(
                    "line must be a positive 1-indexed line number".into(),
                ));
            }

            let path = resolve(&self.options.workdir, path_str)?;
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|_| ToolError::NotFound(format!("file not found: {}", path_str)))?;

            let mut lines: Vec<&str> = content.lines().collect();
            let index = (line - 1) as usize;
            if index > lines.len() {
                return Err(ToolError::InvalidParams(format!(
                    "line {} is past the end of the file ({} lines)",
                    line,
                    lines.len()
                )));
            }
            lines.insert(index, text);
            let mut new_content = lines.join("\n");
            if content.ends_with('\n') || content.is_empty() {
                new_content.push('\n');
            }

            let preview = generate_diff(path_str, &content, &new_content);
            tokio::fs::write(&path, &new_content)
                .await
                .map_err(ToolError::Io)?;

            let mut result = ToolResult::ok()
                .with("path", path.display().to_string())
                .with("line", line)
                .with_display("summary", format!("inserted at line {} of {}", line, path_str))
                .abridged();
            result.diff_preview = Some(preview);
            Ok(result)
        })
    }
}

/// Tool deleting an inclusive 1-indexed line range
pub struct DeleteLines {
    options: ToolOptions,
}

impl DeleteLines {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for DeleteLines {
    fn name(&self) -> &str {
        "delete_lines"
    }

    fn description(&self) -> &str {
        "Delete an inclusive range of lines from a file (1-indexed)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to modify (relative to workdir)"
                },
                "start_line": {
                    "type": "integer",
                    "description": "First line to delete (1-indexed)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Last line to delete (inclusive)"
                }
            },
            "required": ["path", "start_line", "end_line"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let path_str = required_str(&params, "path")?;
            let start = int_param(&params, "start_line", 0);
            let end = int_param(&params, "end_line", 0);
            if start < 1 || end < start {
                return Err(ToolError::InvalidParams(
                    "start_line must be >= 1 and end_line >= start_line".into(),
                ));
            }

            let path = resolve(&self.options.workdir, path_str)?;
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|_| ToolError::NotFound(format!("file not found: {}", path_str)))?;

            let lines: Vec<&str> = content.lines().collect();
            if start as usize > lines.len() {
                return Err(ToolError::InvalidParams(format!(
                    "start_line {} is past the end of the file ({} lines)",
                    start,
                    lines.len()
                )));
            }
            let end_index = (end as usize).min(lines.len());
            let deleted = end_index - (start as usize - 1);

            let mut kept: Vec<&str> = Vec::with_capacity(lines.len() - deleted);
            kept.extend(&lines[..start as usize - 1]);
            kept.extend(&lines[end_index..]);
            let mut new_content = kept.join("\n");
            if content.ends_with('\n') && !new_content.is_empty() {
                new_content.push('\n');
            }

            let preview = generate_diff(path_str, &content, &new_content);
            tokio::fs::write(&path, &new_content)
                .await
                .map_err(ToolError::Io)?;

            let mut result = ToolResult::ok()
                .with("path", path.display().to_string())
                .with("lines_deleted", deleted as i64)
                .with_display(
                    "summary",
                    format!("deleted lines {}-{} of {}", start, end_index, path_str),
                )
                .abridged();
            result.diff_preview = Some(preview);
            Ok(result)
        })
    }
}
