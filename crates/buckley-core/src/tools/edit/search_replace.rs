//! Pattern replacement tool

use regex::RegexBuilder;
use serde_json::{json, Value};

use crate::diff::generate_diff;
use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{bool_param, int_param, required_str};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Tool for literal or regex replacement across a file
pub struct SearchReplace {
    options: ToolOptions,
}

impl SearchReplace {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for SearchReplace {
    fn name(&self) -> &str {
        "search_replace"
    }

    fn description(&self) -> &str {
        "Replace text in a file, either literally or with a regular \
         expression. A literal that matches more than once is rejected \
         unless replace_all is set; max_replacements caps the count."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to modify (relative to workdir)"
                },
                "search": {
                    "type": "string",
                    "description": "Text or pattern to search for"
                },
                "replace": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "use_regex": {
                    "type": "boolean",
                    "description": "Treat search as a regular expression (default false)",
                    "default": false
                },
                "case_sensitive": {
                    "type": "boolean",
                    "description": "Match case exactly (default true)",
                    "default": true
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence (default false)",
                    "default": false
                },
                "max_replacements": {
                    "type": "integer",
                    "description": "Upper bound on replacements; 0 means no cap",
                    "default": 0
                }
            },
            "required": ["path", "search", "replace"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let path_str = required_str(&params, "path")?;
            let search = required_str(&params, "search")?;
            let replace = required_str(&params, "replace")?;
            let use_regex = bool_param(&params, "use_regex", false);
            let case_sensitive = bool_param(&params, "case_sensitive", true);
            let replace_all = bool_param(&params, "replace_all", false);
            let max_replacements = int_param(&params, "max_replacements", 0).max(0) as usize;

            if search.is_empty() {
                return Err(ToolError::InvalidParams("search is required".into()));
            }

            let pattern = if use_regex {
                search.to_string()
            } else {
                regex::escape(search)
            };
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(!case_sensitive)
                .build()
                .map_err(|e| ToolError::InvalidParams(format!("invalid regex: {}", e)))?;

            let path = resolve(&self.options.workdir, path_str)?;
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|_| ToolError::NotFound(format!("file not found: {}", path_str)))?;

            let occurrences = regex.find_iter(&content).count();
            if occurrences == 0 {
                return Err(ToolError::InvalidParams(format!(
                    "no matches for {:?} in {}",
                    search, path_str
                )));
            }
            if !replace_all && occurrences > 1 {
                return Err(ToolError::InvalidParams(format!(
                    "search text appears {} times in the file. Set replace_all=true \
                     or narrow the pattern.",
                    occurrences
                )));
            }

            let limit = if !replace_all {
                1
            } else if max_replacements > 0 {
                max_replacements
            } else {
                0 // regex replace semantics: 0 = all
            };
            // Literal mode must not expand $-references in the replacement.
            let new_content = if use_regex {
                regex.replacen(&content, limit, replace).into_owned()
            } else {
                regex
                    .replacen(&content, limit, regex::NoExpand(replace))
                    .into_owned()
            };
            let replaced = occurrences.min(if limit == 0 { occurrences } else { limit });

            let preview = generate_diff(path_str, &content, &new_content);
            tokio::fs::write(&path, &new_content)
                .await
                .map_err(ToolError::Io)?;

            let mut result = ToolResult::ok()
                .with("path", path.display().to_string())
                .with("occurrences_found", occurrences as i64)
                .with("occurrences_replaced", replaced as i64)
                .with_display(
                    "summary",
                    format!("replaced {} occurrence(s) in {}", replaced, path_str),
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

    fn tool(dir: &TempDir) -> SearchReplace {
        SearchReplace::new(ToolOptions::new(dir.path()))
    }

    #[tokio::test]
    async fn test_literal_single_replacement() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "value = 1 + 2").unwrap();
        let result = tool(&dir)
            .execute(json!({"path": "a.txt", "search": "1 + 2", "replace": "3"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "value = 3"
        );
    }

    #[tokio::test]
    async fn test_multiple_literal_matches_need_replace_all() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x x x").unwrap();
        let err = tool(&dir)
            .execute(json!({"path": "a.txt", "search": "x", "replace": "y"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("appears 3 times"));
    }

    #[tokio::test]
    async fn test_regex_replace_all_with_cap() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a1 a2 a3 a4").unwrap();
        let result = tool(&dir)
            .execute(json!({
                "path": "a.txt",
                "search": r"a\d",
                "replace": "b",
                "use_regex": true,
                "replace_all": true,
                "max_replacements": 2
            }))
            .await
            .unwrap();
        assert_eq!(result.data["occurrences_replaced"], json!(2));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "b b a3 a4"
        );
    }

    #[tokio::test]
    async fn test_case_insensitive() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Hello world").unwrap();
        let result = tool(&dir)
            .execute(json!({
                "path": "a.txt",
                "search": "hello",
                "replace": "goodbye",
                "case_sensitive": false
            }))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "goodbye world"
        );
    }

    #[tokio::test]
    async fn test_literal_special_chars_quoted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "price is $5.00").unwrap();
        let result = tool(&dir)
            .execute(json!({"path": "a.txt", "search": "$5.00", "replace": "$6.00"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "price is $6.00"
        );
    }

    #[tokio::test]
    async fn test_no_matches() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "abc").unwrap();
        let err = tool(&dir)
            .execute(json!({"path": "a.txt", "search": "zzz", "replace": "q"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no matches"));
    }
}
