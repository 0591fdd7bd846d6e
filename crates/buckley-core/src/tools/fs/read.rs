//! Read file tool

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::required_str;
use crate::result::{abridge_text, ToolResult, READ_DISPLAY_LINES};
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Tool for reading file contents
pub struct ReadFile {
    options: ToolOptions,
}

impl ReadFile {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Large files are summarized for display \
         while the full content stays available to the agent."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to read (relative to workdir)"
                }
            },
            "required": ["path"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let path_str = required_str(&params, "path")?;
            let path = resolve(&self.options.workdir, path_str)?;

            let metadata = tokio::fs::metadata(&path)
                .await
                .map_err(|_| ToolError::NotFound(format!("file not found: {}", path_str)))?;
            if !metadata.is_file() {
                return Err(ToolError::InvalidParams(format!(
                    "{} is not a regular file",
                    path_str
                )));
            }
            if self.options.max_file_size > 0 && metadata.len() as usize > self.options.max_file_size
            {
                return Err(ToolError::InvalidParams(format!(
                    "{} is {} bytes, over the {} byte limit",
                    path_str,
                    metadata.len(),
                    self.options.max_file_size
                )));
            }

            let content = tokio::fs::read_to_string(&path).await.map_err(ToolError::Io)?;
            let total_lines = content.lines().count();

            let mut result = ToolResult::ok()
                .with("content", content.clone())
                .with("path", path.display().to_string())
                .with("lines", total_lines as i64)
                .with("size", metadata.len() as i64);
            abridge_text(&mut result, "content", &content, READ_DISPLAY_LINES);
            Ok(result)
        })
    }
}
