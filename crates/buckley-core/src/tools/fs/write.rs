//! Write file tool

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::required_str;
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Tool for writing file contents, creating parent directories as needed
pub struct WriteFile {
    options: ToolOptions,
}

impl WriteFile {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, overwriting if it exists. Parent directories \
         are created automatically."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to write (relative to workdir)"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let path_str = required_str(&params, "path")?;
            let content = required_str(&params, "content")?;
            let path = resolve(&self.options.workdir, path_str)?;

            let created = !path.exists();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(ToolError::Io)?;
            }
            tokio::fs::write(&path, content).await.map_err(ToolError::Io)?;

            let lines = content.lines().count();
            let summary = format!(
                "{} {} ({} lines)",
                if created { "created" } else { "wrote" },
                path_str,
                lines
            );
            Ok(ToolResult::ok()
                .with("path", path.display().to_string())
                .with("created", created)
                .with("bytes_written", content.len() as i64)
                .with("lines", lines as i64)
                .with_display("summary", summary)
                .abridged())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tool(dir: &TempDir) -> WriteFile {
        WriteFile::new(ToolOptions::new(dir.path()))
    }

    #[tokio::test]
    async fn test_write_new_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let result = tool(&dir)
            .execute(json!({"path": "nested/deep/a.txt", "content": "one\ntwo\n"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data["created"], json!(true));
        assert!(result.should_abridge);
        assert!(result.display_data["summary"]
            .as_str()
            .unwrap()
            .starts_with("created"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("nested/deep/a.txt")).unwrap(),
            "one\ntwo\n"
        );
    }

    #[tokio::test]
    async fn test_overwrite_reports_not_created() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        let result = tool(&dir)
            .execute(json!({"path": "a.txt", "content": "new"}))
            .await
            .unwrap();
        assert_eq!(result.data["created"], json!(false));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "new"
        );
    }

    #[tokio::test]
    async fn test_escape_rejected() {
        let dir = TempDir::new().unwrap();
        let err = tool(&dir)
            .execute(json!({"path": "../evil.txt", "content": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("escapes workdir"));
    }

    #[tokio::test]
    async fn test_content_required() {
        let dir = TempDir::new().unwrap();
        let err = tool(&dir)
            .execute(json!({"path": "a.txt"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("content is required"));
    }
}
