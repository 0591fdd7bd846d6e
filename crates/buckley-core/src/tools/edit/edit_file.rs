//! Exact string replacement tool

use serde_json::{json, Value};

use crate::diff::generate_diff;
use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{bool_param, required_str};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Tool for performing exact string replacements in files
pub struct EditFile {
    options: ToolOptions,
}

impl EditFile {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for EditFile {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Perform an exact string replacement in a file. The edit fails if \
         old_string is not unique; provide more surrounding context or set \
         replace_all to change every occurrence."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to modify (relative to workdir)"
                },
                "old_string": {
                    "type": "string",
                    "description": "The text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The text to replace it with (must differ from old_string)"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences of old_string (default false)",
                    "default": false
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let path_str = required_str(&params, "path")?;
            let old_string = required_str(&params, "old_string")?;
            let new_string = required_str(&params, "new_string")?;
            let replace_all = bool_param(&params, "replace_all", false);

            if old_string == new_string {
                return Err(ToolError::InvalidParams(
                    "old_string and new_string must be different".into(),
                ));
            }
            if old_string.is_empty() {
                return Err(ToolError::InvalidParams("old_string is required".into()));
            }

            let path = resolve(&self.options.workdir, path_str)?;
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|_| ToolError::NotFound(format!("file not found: {}", path_str)))?;

            let occurrences = content.matches(old_string).count();
            if occurrences == 0 {
                return Err(ToolError::InvalidParams(
                    "old_string not found in file. Match the exact content including \
                     whitespace and indentation."
                        .into(),
                ));
            }
            if !replace_all && occurrences > 1 {
                return Err(ToolError::InvalidParams(format!(
                    "old_string appears {} times in the file. Provide more context to \
                     make it unique, or set replace_all=true.",
                    occurrences
                )));
            }

            let new_content = if replace_all {
                content.replace(old_string, new_string)
            } else {
                content.replacen(old_string, new_string, 1)
            };

            let preview = generate_diff(path_str, &content, &new_content);
            tokio::fs::write(&path, &new_content)
                .await
                .map_err(ToolError::Io)?;

            let replaced = if replace_all { occurrences } else { 1 };
            let mut result = ToolResult::ok()
                .with("path", path.display().to_string())
                .with("occurrences_replaced", replaced as i64)
                .with("lines_added", preview.lines_added as i64)
                .with("lines_removed", preview.lines_removed as i64)
                .with_display(
                    "summary",
                    format!(
                        "edited {} ({} replacement{})",
                        path_str,
                        replaced,
                        if replaced == 1 { "" } else { "s" }
                    ),
                )
                .abridged();
            result.diff_preview = Some(preview);
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tool(dir: &TempDir) -> EditFile {
        EditFile::new(ToolOptions::new(dir.path()))
    }

    #[tokio::test]
    async fn test_unique_replacement() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha beta gamma").unwrap();

        let result = tool(&dir)
            .execute(json!({
                "path": "a.txt",
                "old_string": "beta",
                "new_string": "delta"
            }))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.should_abridge);
        assert!(result.diff_preview.is_some());
        assert!(!result.needs_approval);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "alpha delta gamma"
        );
    }

    #[tokio::test]
    async fn test_uniqueness_guard_names_count() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), "hello hello hello").unwrap();

        let err = tool(&dir)
            .execute(json!({
                "path": "f.txt",
                "old_string": "hello",
                "new_string": "hi"
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("appears 3 times"));
        // File untouched on refusal.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            "hello hello hello"
        );
    }

    #[tokio::test]
    async fn test_replace_all() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), "hello hello hello").unwrap();

        let result = tool(&dir)
            .execute(json!({
                "path": "f.txt",
                "old_string": "hello",
                "new_string": "hi",
                "replace_all": true
            }))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data["occurrences_replaced"], json!(3));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            "hi hi hi"
        );
    }

    #[tokio::test]
    async fn test_not_found_string() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), "abc").unwrap();
        let err = tool(&dir)
            .execute(json!({
                "path": "f.txt",
                "old_string": "xyz",
                "new_string": "q"
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found in file"));
    }

    #[tokio::test]
    async fn test_identical_strings_rejected() {
        let dir = TempDir::new().unwrap();
        let err = tool(&dir)
            .execute(json!({
                "path": "f.txt",
                "old_string": "same",
                "new_string": "same"
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be different"));
    }
}
