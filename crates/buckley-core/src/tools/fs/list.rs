//! Directory listing tool

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::string_param;
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Tool for listing directory entries with name, kind, and size
pub struct ListDirectory {
    options: ToolOptions,
}

impl ListDirectory {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for ListDirectory {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory with name, type, and size."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: workdir root)"
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
            let raw = string_param(&params, "path");
            let path = if raw.is_empty() {
                if self.options.workdir.as_os_str().is_empty() {
                    std::env::current_dir().map_err(ToolError::Io)?
                } else {
                    self.options.workdir.clone()
                }
            } else {
                resolve(&self.options.workdir, &raw)?
            };

            let mut reader = tokio::fs::read_dir(&path)
                .await
                .map_err(|_| ToolError::NotFound(format!("directory not found: {}", path.display())))?;

            let mut entries = Vec::new();
            while let Some(entry) = reader.next_entry().await.map_err(ToolError::Io)? {
                let metadata = entry.metadata().await.map_err(ToolError::Io)?;
                entries.push(json!({
                    "name": entry.file_name().to_string_lossy(),
                    "is_dir": metadata.is_dir(),
                    "size": metadata.len(),
                }));
            }
            entries.sort_by(|a, b| {
                a["name"]
                    .as_str()
                    .unwrap_or_default()
                    .cmp(b["name"].as_str().unwrap_or_default())
            });

            Ok(ToolResult::ok()
                .with("path", path.display().to_string())
                .with("count", entries.len() as i64)
                .with("entries", entries))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "12345").unwrap();
        std::fs::create_dir(dir.path().join("a_dir")).unwrap();

        let result = ListDirectory::new(ToolOptions::new(dir.path()))
            .execute(json!({}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(!result.should_abridge);
        let entries = result.data["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], json!("a_dir"));
        assert_eq!(entries[0]["is_dir"], json!(true));
        assert_eq!(entries[1]["size"], json!(5));
    }

    #[tokio::test]
    async fn test_list_subdirectory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/x.txt"), "x").unwrap();

        let result = ListDirectory::new(ToolOptions::new(dir.path()))
            .execute(json!({"path": "sub"}))
            .await
            .unwrap();
        assert_eq!(result.data["count"], json!(1));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = ListDirectory::new(ToolOptions::new(dir.path()))
            .execute(json!({"path": "nope"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
