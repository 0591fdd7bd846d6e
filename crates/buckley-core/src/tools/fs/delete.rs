//! Delete file tool
//!
//! Deletion is approval-gated: the tool computes the removal diff and
//! returns it with `needs_approval=true`; nothing is removed until the host
//! invokes the approval callback with consent.

use serde_json::{json, Value};
use std::path::PathBuf;

use crate::diff::generate_diff;
use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::required_str;
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Tool for removing a file, pending user approval
pub struct DeleteFile {
    options: ToolOptions,
}

impl DeleteFile {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for DeleteFile {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file. The deletion is previewed and requires approval \
         before anything is removed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to delete (relative to workdir)"
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

            if !path.is_file() {
                return Err(ToolError::NotFound(format!("file not found: {}", path_str)));
            }
            let old_content = tokio::fs::read_to_string(&path)
                .await
                .unwrap_or_else(|_| String::from("<binary content>"));

            let preview = generate_diff(path_str, &old_content, "");
            let apply_path: PathBuf = path.clone();
            let display_path = path_str.to_string();

            let result = ToolResult::ok()
                .with("path", path.display().to_string())
                .with_display("summary", format!("delete {} (pending approval)", path_str))
                .abridged()
                .pending_approval(
                    preview,
                    Box::new(move |approved| {
                        Box::pin(async move {
                            if !approved {
                                return Ok(ToolResult::ok()
                                    .with("deleted", false)
                                    .with_display("summary", "deletion declined")
                                    .abridged());
                            }
                            tokio::fs::remove_file(&apply_path)
                                .await
                                .map_err(ToolError::Io)?;
                            Ok(ToolResult::ok()
                                .with("deleted", true)
                                .with_display("summary", format!("deleted {}", display_path))
                                .abridged())
                        })
                    }),
                );
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_delete_is_gated_until_approval() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("doomed.txt");
        std::fs::write(&file, "contents\n").unwrap();

        let mut result = DeleteFile::new(ToolOptions::new(dir.path()))
            .execute(json!({"path": "doomed.txt"}))
            .await
            .unwrap();
        assert!(result.needs_approval);
        let preview = result.diff_preview.as_ref().unwrap();
        assert!(preview.is_delete);
        // Nothing was removed yet.
        assert!(file.exists());

        let apply = result.approval_func.take().unwrap();
        let applied = apply(true).await.unwrap();
        assert!(applied.success);
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_declined_deletion_keeps_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("kept.txt");
        std::fs::write(&file, "contents\n").unwrap();

        let mut result = DeleteFile::new(ToolOptions::new(dir.path()))
            .execute(json!({"path": "kept.txt"}))
            .await
            .unwrap();
        let apply = result.approval_func.take().unwrap();
        let declined = apply(false).await.unwrap();
        assert!(declined.success);
        assert_eq!(declined.data["deleted"], json!(false));
        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = DeleteFile::new(ToolOptions::new(dir.path()))
            .execute(json!({"path": "ghost.txt"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
