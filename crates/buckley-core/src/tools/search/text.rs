//! Text search tool
//!
//! Delegates to ripgrep when installed, falling back to grep. Match lines
//! are parsed as `path:line:col:content` (ripgrep) or `path:line:content`
//! (grep); malformed lines are dropped, invalid numeric fields read as
//! zero, and a bare `path:line` still yields a record with empty content.
//! Exit code 1 with no output is "no matches", not a failure.

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::exec::{look_path, run_program, ExecContext};
use crate::params::{bool_param, int_param, required_str, string_param};
use crate::result::{abridge_list, ToolResult, SEARCH_DISPLAY_MATCHES};
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve;

/// Tool for searching file contents via ripgrep or grep
pub struct SearchText {
    options: ToolOptions,
}

impl SearchText {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

/// One parsed search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchMatch {
    pub path: String,
    pub line: u64,
    pub column: u64,
    pub content: String,
}

impl SearchMatch {
    fn to_json(&self) -> Value {
        json!({
            "path": self.path,
            "line": self.line,
            "column": self.column,
            "match": self.content,
        })
    }
}

/// Parse one ripgrep/grep output line. `with_column` is true for ripgrep's
/// `path:line:col:content` shape.
pub(crate) fn parse_match_line(line: &str, with_column: bool) -> Option<SearchMatch> {
    let segments: Vec<&str> = if with_column {
        line.splitn(4, ':').collect()
    } else {
        line.splitn(3, ':').collect()
    };
    if segments.len() < 2 || segments[0].is_empty() {
        return None;
    }

    // A line number that does not parse marks the line malformed.
    let line_number = segments[1].parse::<u64>().ok()?;

    let (column, content) = if with_column {
        let column = segments
            .get(2)
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        // When only two fields are present the content segment is dropped
        // and the match string stays empty.
        (column, segments.get(3).copied().unwrap_or(""))
    } else {
        (0, segments.get(2).copied().unwrap_or(""))
    };

    Some(SearchMatch {
        path: segments[0].to_string(),
        line: line_number,
        column,
        content: content.to_string(),
    })
}

impl Tool for SearchText {
    fn name(&self) -> &str {
        "search_text"
    }

    fn description(&self) -> &str {
        "Search file contents for a pattern using ripgrep (or grep). Returns \
         matches with path, line, and column."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search (default: workdir root)"
                },
                "case_sensitive": {
                    "type": "boolean",
                    "description": "Match case exactly (default true)",
                    "default": true
                },
                "context_before": {
                    "type": "integer",
                    "description": "Context lines before each match",
                    "default": 0
                },
                "context_after": {
                    "type": "integer",
                    "description": "Context lines after each match",
                    "default": 0
                },
                "glob": {
                    "type": "string",
                    "description": "Glob filter for searched files (ripgrep only)"
                }
            },
            "required": ["query"]
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let query = required_str(&params, "query")?;
            let case_sensitive = bool_param(&params, "case_sensitive", true);
            let before = int_param(&params, "context_before", 0).max(0);
            let after = int_param(&params, "context_after", 0).max(0);
            let glob = string_param(&params, "glob");

            let raw_path = string_param(&params, "path");
            let target = if raw_path.is_empty() {
                if self.options.workdir.as_os_str().is_empty() {
                    ".".to_string()
                } else {
                    self.options.workdir.display().to_string()
                }
            } else {
                resolve(&self.options.workdir, &raw_path)?
                    .display()
                    .to_string()
            };

            let use_ripgrep = look_path("rg").is_some();
            if !use_ripgrep && look_path("grep").is_none() {
                return Err(ToolError::Unavailable("rg or grep".into()));
            }

            let before_arg = before.to_string();
            let after_arg = after.to_string();
            let mut args: Vec<&str> = Vec::new();
            if use_ripgrep {
                args.extend(["--line-number", "--column", "--no-heading", "--color", "never"]);
                if !case_sensitive {
                    args.push("-i");
                }
                if before > 0 {
                    args.extend(["-B", before_arg.as_str()]);
                }
                if after > 0 {
                    args.extend(["-A", after_arg.as_str()]);
                }
                if !glob.is_empty() {
                    args.extend(["--glob", glob.as_str()]);
                }
            } else {
                args.extend(["-r", "-n", "-I"]);
                if !case_sensitive {
                    args.push("-i");
                }
                if before > 0 {
                    args.extend(["-B", before_arg.as_str()]);
                }
                if after > 0 {
                    args.extend(["-A", after_arg.as_str()]);
                }
            }
            args.extend(["--", query, target.as_str()]);

            let program = if use_ripgrep { "rg" } else { "grep" };
            let outcome = run_program(&ctx, &self.options.exec_options(), program, &args).await?;

            // Exit 1 means no matches for both tools.
            if outcome.exit_code > 1 {
                return Err(ToolError::ExecutionFailed(format!(
                    "{} exited with {}: {}",
                    program,
                    outcome.exit_code,
                    outcome.stderr.trim()
                )));
            }

            let matches: Vec<Value> = outcome
                .stdout
                .lines()
                .filter_map(|line| parse_match_line(line, use_ripgrep))
                .map(|m| m.to_json())
                .collect();

            let mut result = ToolResult::ok()
                .with("query", query)
                .with("count", matches.len() as i64)
                .with("matches", matches.clone())
                .with("exit_code", outcome.exit_code);
            if outcome.stdout_truncated {
                crate::result::mark_truncated(&mut result, "stdout", true);
            }
            abridge_list(&mut result, "matches", &matches, SEARCH_DISPLAY_MATCHES, "matches");
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_ripgrep_line() {
        let m = parse_match_line("src/main.rs:42:7:    let x = 1;", true).unwrap();
        assert_eq!(m.path, "src/main.rs");
        assert_eq!(m.line, 42);
        assert_eq!(m.column, 7);
        assert_eq!(m.content, "    let x = 1;");
    }

    #[test]
    fn test_parse_grep_line() {
        let m = parse_match_line("src/main.rs:42:    let x = 1;", false).unwrap();
        assert_eq!(m.line, 42);
        assert_eq!(m.column, 0);
        assert_eq!(m.content, "    let x = 1;");
    }

    #[test]
    fn test_parse_content_with_colons() {
        let m = parse_match_line("a.rs:1:2:key: value: more", true).unwrap();
        assert_eq!(m.content, "key: value: more");
    }

    #[test]
    fn test_parse_invalid_column_defaults_zero() {
        let m = parse_match_line("a.rs:3:abc:text", true).unwrap();
        assert_eq!(m.column, 0);
        assert_eq!(m.content, "text");
    }

    #[test]
    fn test_parse_two_fields_keeps_empty_content() {
        let m = parse_match_line("a.rs:3", true).unwrap();
        assert_eq!(m.line, 3);
        assert_eq!(m.content, "");
    }

    #[test]
    fn test_parse_malformed_dropped() {
        assert!(parse_match_line("no separators here", true).is_none());
        assert!(parse_match_line("a.rs:notanumber:1:x", true).is_none());
        assert!(parse_match_line(":3:1:x", true).is_none());
        assert!(parse_match_line("--", true).is_none());
    }

    #[tokio::test]
    async fn test_search_finds_matches() {
        if look_path("rg").is_none() && look_path("grep").is_none() {
            return;
        }
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "needle one\nhay\nneedle two\n").unwrap();

        let result = SearchText::new(ToolOptions::new(dir.path()))
            .execute(json!({"query": "needle"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data["count"], json!(2));
    }

    #[tokio::test]
    async fn test_no_matches_is_success() {
        if look_path("rg").is_none() && look_path("grep").is_none() {
            return;
        }
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "nothing here\n").unwrap();

        let result = SearchText::new(ToolOptions::new(dir.path()))
            .execute(json!({"query": "absent_token_xyz"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data["count"], json!(0));
        assert_eq!(result.data["exit_code"], json!(1));
    }

    #[tokio::test]
    async fn test_case_insensitive_search() {
        if look_path("rg").is_none() && look_path("grep").is_none() {
            return;
        }
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Needle\n").unwrap();

        let result = SearchText::new(ToolOptions::new(dir.path()))
            .execute(json!({"query": "needle", "case_sensitive": false}))
            .await
            .unwrap();
        assert_eq!(result.data["count"], json!(1));
    }
}
