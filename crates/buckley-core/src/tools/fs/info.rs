//! File existence and metadata tools

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::required_str;
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Tool reporting whether a path exists
pub struct FileExists {
    options: ToolOptions,
}

impl FileExists {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for FileExists {
    fn name(&self) -> &str {
        "file_exists"
    }

    fn description(&self) -> &str {
        "Check whether a file or directory exists."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to check (relative to workdir)"
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
            let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
            Ok(ToolResult::ok()
                .with("path", path.display().to_string())
                .with("exists", exists))
        })
    }
}

/// Tool returning stat-style metadata for a path
pub struct GetFileInfo {
    options: ToolOptions,
}

impl GetFileInfo {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for GetFileInfo {
    fn name(&self) -> &str {
        "get_file_info"
    }

    fn description(&self) -> &str {
        "Get metadata for a file or directory: size, kind, and modification time."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to inspect (relative to workdir)"
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
                .map_err(|_| ToolError::NotFound(format!("path not found: {}", path_str)))?;

            let modified = metadata
                .modified()
                .ok()
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

            let mut result = ToolResult::ok()
                .with("path", path.display().to_string())
                .with("size", metadata.len() as i64)
                .with("is_dir", metadata.is_dir())
                .with("is_file", metadata.is_file())
                .with("readonly", metadata.permissions().readonly());
            if let Some(modified) = modified {
                result = result.with("modified", modified);
            }
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_exists_true_and_false() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();

        let tool = FileExists::new(ToolOptions::new(dir.path()));
        let result = tool.execute(json!({"path": "a.txt"})).await.unwrap();
        assert_eq!(result.data["exists"], json!(true));

        let result = tool.execute(json!({"path": "b.txt"})).await.unwrap();
        assert_eq!(result.data["exists"], json!(false));
    }

    #[tokio::test]
    async fn test_file_info() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "12345").unwrap();

        let result = GetFileInfo::new(ToolOptions::new(dir.path()))
            .execute(json!({"path": "a.txt"}))
            .await
            .unwrap();
        assert_eq!(result.data["size"], json!(5));
        assert_eq!(result.data["is_file"], json!(true));
        assert!(result.data["modified"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn test_info_missing_path() {
        let dir = TempDir::new().unwrap();
        let err = GetFileInfo::new(ToolOptions::new(dir.path()))
            .execute(json!({"path": "nope"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
