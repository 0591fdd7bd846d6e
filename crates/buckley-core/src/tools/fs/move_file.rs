//! Move/rename tool

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{bool_param, required_str};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Tool for moving or renaming a file within the workspace
pub struct MoveFile {
    options: ToolOptions,
}

impl MoveFile {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for MoveFile {
    fn name(&self) -> &str {
        "move_file"
    }

    fn description(&self) -> &str {
        "Move or rename a file. Both endpoints must stay inside the workdir; \
         an existing destination is only replaced with overwrite=true."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": {
                    "type": "string",
                    "description": "Current path (relative to workdir)"
                },
                "destination": {
                    "type": "string",
                    "description": "New path (relative to workdir)"
                },
                "overwrite": {
                    "type": "boolean",
                    "description": "Replace the destination if it exists (default false)",
                    "default": false
                }
            },
            "required": ["source", "destination"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let source_str = required_str(&params, "source")?;
            let dest_str = required_str(&params, "destination")?;
            let overwrite = bool_param(&params, "overwrite", false);

            let source = resolve(&self.options.workdir, source_str)?;
            let destination = resolve(&self.options.workdir, dest_str)?;

            if !source.exists() {
                return Err(ToolError::NotFound(format!(
                    "source not found: {}",
                    source_str
                )));
            }
            if destination.exists() && !overwrite {
                return Err(ToolError::InvalidParams(format!(
                    "destination {} exists; pass overwrite=true to replace it",
                    dest_str
                )));
            }
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(ToolError::Io)?;
            }
            tokio::fs::rename(&source, &destination)
                .await
                .map_err(ToolError::Io)?;

            Ok(ToolResult::ok()
                .with("source", source.display().to_string())
                .with("destination", destination.display().to_string())
                .with_display("summary", format!("moved {} -> {}", source_str, dest_str))
                .abridged())
        })
    }
}
