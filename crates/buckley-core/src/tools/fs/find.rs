//! File name search tool

use globset::Glob;
use serde_json::{json, Value};
use walkdir::WalkDir;

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{required_str, string_param};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Tool for finding files whose basename matches a glob pattern
pub struct FindFiles {
    options: ToolOptions,
}

impl FindFiles {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for FindFiles {
    fn name(&self) -> &str {
        "find_files"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern (matched against the basename), \
         walking the tree under base_path."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern, e.g. '*.rs' or 'test_*.py'"
                },
                "base_path": {
                    "type": "string",
                    "description": "Directory to search from (default: workdir root)"
                }
            },
            "required": ["pattern"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let pattern = required_str(&params, "pattern")?;
            let base_raw = string_param(&params, "base_path");
            let base = if base_raw.is_empty() {
                if self.options.workdir.as_os_str().is_empty() {
                    std::env::current_dir().map_err(ToolError::Io)?
                } else {
                    self.options.workdir.clone()
                }
            } else {
                resolve(&self.options.workdir, &base_raw)?
            };

            let matcher = Glob::new(pattern)
                .map_err(|e| ToolError::InvalidParams(format!("invalid glob pattern: {}", e)))?
                .compile_matcher();

            let mut matches = Vec::new();
            for entry in WalkDir::new(&base)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                if matcher.is_match(entry.file_name()) {
                    let relative = entry
                        .path()
                        .strip_prefix(&base)
                        .unwrap_or(entry.path())
                        .to_string_lossy()
                        .replace('\\', "/");
                    matches.push(Value::String(relative));
                }
            }
            matches.sort_by(|a, b| {
                a.as_str()
                    .unwrap_or_default()
                    .cmp(b.as_str().unwrap_or_default())
            });

            Ok(ToolResult::ok()
                .with("pattern", pattern)
                .with("count", matches.len() as i64)
                .with("files", matches))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_find_by_basename() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();

        let result = FindFiles::new(ToolOptions::new(dir.path()))
            .execute(json!({"pattern": "*.rs"}))
            .await
            .unwrap();
        assert_eq!(result.data["count"], json!(2));
        let files = result.data["files"].as_array().unwrap();
        assert_eq!(files[0], json!("src/lib.rs"));
        assert_eq!(files[1], json!("src/main.rs"));
    }

    #[tokio::test]
    async fn test_find_with_base_path() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("a/x.txt"), "").unwrap();
        std::fs::write(dir.path().join("b/y.txt"), "").unwrap();

        let result = FindFiles::new(ToolOptions::new(dir.path()))
            .execute(json!({"pattern": "*.txt", "base_path": "a"}))
            .await
            .unwrap();
        assert_eq!(result.data["files"], json!(["x.txt"]));
    }

    #[tokio::test]
    async fn test_invalid_pattern() {
        let dir = TempDir::new().unwrap();
        let err = FindFiles::new(ToolOptions::new(dir.path()))
            .execute(json!({"pattern": "a[unclosed"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid glob"));
    }
}
