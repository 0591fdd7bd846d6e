//! Merge conflict tools

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::required_str;
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::{resolve, resolve_rel};

use super::run_git;

/// One conflict hunk inside a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConflictHunk {
    /// 1-indexed line of the `<<<<<<<` marker
    pub start_line: usize,
    pub ours: String,
    pub theirs: String,
}

/// Parse conflict-marker hunks out of file content.
pub(crate) fn parse_conflicts(content: &str) -> Vec<ConflictHunk> {
    let mut hunks = Vec::new();
    let mut ours: Vec<&str> = Vec::new();
    let mut theirs: Vec<&str> = Vec::new();
    let mut start_line = 0usize;
    // 0 = outside, 1 = in ours, 2 = in theirs
    let mut state = 0u8;

    for (index, line) in content.lines().enumerate() {
        if line.starts_with("<<<<<<<") {
            state = 1;
            start_line = index + 1;
            ours.clear();
            theirs.clear();
        } else if line.starts_with("=======") && state == 1 {
            state = 2;
        } else if line.starts_with(">>>>>>>") && state == 2 {
            hunks.push(ConflictHunk {
                start_line,
                ours: ours.join("\n"),
                theirs: theirs.join("\n"),
            });
            state = 0;
        } else if state == 1 {
            ours.push(line);
        } else if state == 2 {
            theirs.push(line);
        }
    }
    hunks
}

/// Tool listing files with unresolved merge conflicts
pub struct ListMergeConflicts {
    options: ToolOptions,
}

impl ListMergeConflicts {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for ListMergeConflicts {
    fn name(&self) -> &str {
        "list_merge_conflicts"
    }

    fn description(&self) -> &str {
        "List files with unresolved merge conflicts, including each conflict \
         hunk's ours/theirs content."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        let _ = params;
        Box::pin(async move {
            let outcome = run_git(
                &ctx,
                &self.options,
                &["diff", "--name-only", "--diff-filter=U"],
            )
            .await?;
            if !outcome.success() {
                return Ok(ToolResult::failure(format!(
                    "git exited with {}: {}",
                    outcome.exit_code,
                    outcome.stderr.trim()
                )));
            }

            let mut files = Vec::new();
            for name in outcome.stdout.lines().filter(|l| !l.trim().is_empty()) {
                let path = resolve(&self.options.workdir, name)?;
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .unwrap_or_default();
                let conflicts: Vec<Value> = parse_conflicts(&content)
                    .into_iter()
                    .map(|hunk| {
                        json!({
                            "start_line": hunk.start_line,
                            "ours": hunk.ours,
                            "theirs": hunk.theirs,
                        })
                    })
                    .collect();
                files.push(json!({
                    "path": name,
                    "conflict_count": conflicts.len(),
                    "conflicts": conflicts,
                }));
            }

            Ok(ToolResult::ok()
                .with("count", files.len() as i64)
                .with("files", files))
        })
    }
}

/// Tool staging a file whose conflicts are resolved
pub struct MarkConflictResolved {
    options: ToolOptions,
}

impl MarkConflictResolved {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for MarkConflictResolved {
    fn name(&self) -> &str {
        "mark_conflict_resolved"
    }

    fn description(&self) -> &str {
        "Stage a file to mark its merge conflicts as resolved (git add)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File to stage (relative to workdir)"
                }
            },
            "required": ["path"]
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let path = required_str(&params, "path")?;
            let (_, relative) = resolve_rel(&self.options.workdir, path)?;
            let relative = relative.to_string_lossy().into_owned();

            let outcome = run_git(&ctx, &self.options, &["add", "--", relative.as_str()]).await?;
            if !outcome.success() {
                return Ok(ToolResult::failure(format!(
                    "git add exited with {}: {}",
                    outcome.exit_code,
                    outcome.stderr.trim()
                )));
            }
            Ok(ToolResult::ok()
                .with("path", relative.clone())
                .with("staged", true))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::look_path;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_and_resolve_real_conflict() {
        if look_path("git").is_none() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let opts = ToolOptions::new(dir.path());
        let ctx = ExecContext::background();
        let git = |args: Vec<&'static str>| {
            let opts = opts.clone();
            async move { run_git(&ExecContext::background(), &opts, &args).await.unwrap() }
        };

        git(vec!["init", "-q", "-b", "main"]).await;
        git(vec!["config", "user.email", "t@example.com"]).await;
        git(vec!["config", "user.name", "t"]).await;
        std::fs::write(dir.path().join("a.txt"), "base\n").unwrap();
        git(vec!["add", "."]).await;
        git(vec!["commit", "-qm", "base"]).await;

        git(vec!["checkout", "-q", "-b", "feature"]).await;
        std::fs::write(dir.path().join("a.txt"), "theirs\n").unwrap();
        git(vec!["commit", "-aqm", "theirs"]).await;

        git(vec!["checkout", "-q", "main"]).await;
        std::fs::write(dir.path().join("a.txt"), "ours\n").unwrap();
        git(vec!["commit", "-aqm", "ours"]).await;

        // The merge is expected to fail with a conflict.
        let merge = run_git(&ctx, &opts, &["merge", "feature"]).await.unwrap();
        assert!(!merge.success());

        let result = ListMergeConflicts::new(opts.clone())
            .execute(json!({}))
            .await
            .unwrap();
        assert!(result.success, "{}", result.error);
        assert_eq!(result.data["count"], json!(1));
        let conflict = &result.data["files"][0]["conflicts"][0];
        assert_eq!(conflict["ours"], json!("ours"));
        assert_eq!(conflict["theirs"], json!("theirs"));
        assert_eq!(result.data["files"][0]["path"], json!("a.txt"));

        // Resolve and stage; the conflict list empties.
        std::fs::write(dir.path().join("a.txt"), "merged\n").unwrap();
        let staged = MarkConflictResolved::new(opts.clone())
            .execute(json!({"path": "a.txt"}))
            .await
            .unwrap();
        assert!(staged.success);

        let after = ListMergeConflicts::new(opts.clone())
            .execute(json!({}))
            .await
            .unwrap();
        assert_eq!(after.data["count"], json!(0));
    }

    #[test]
    fn test_parse_single_conflict() {
        let content = "<<<<<<<\nours\n=======\ntheirs\n>>>>>>>\n";
        let hunks = parse_conflicts(content);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].start_line, 1);
        assert_eq!(hunks[0].ours, "ours");
        assert_eq!(hunks[0].theirs, "theirs");
    }

    #[test]
    fn test_parse_conflict_with_labels_and_context() {
        let content = "line 1\n<<<<<<< HEAD\nour a\nour b\n======= \ntheir a\n>>>>>>> feature\ntail\n";
        let hunks = parse_conflicts(content);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].start_line, 2);
        assert_eq!(hunks[0].ours, "our a\nour b");
        assert_eq!(hunks[0].theirs, "their a");
    }

    #[test]
    fn test_parse_multiple_conflicts() {
        let content = "<<<<<<<\na\n=======\nb\n>>>>>>>\nmid\n<<<<<<<\nc\n=======\nd\n>>>>>>>\n";
        let hunks = parse_conflicts(content);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[1].start_line, 7);
        assert_eq!(hunks[1].ours, "c");
        assert_eq!(hunks[1].theirs, "d");
    }

    #[test]
    fn test_parse_no_conflicts() {
        assert!(parse_conflicts("plain content\n").is_empty());
        // An unterminated hunk is not reported.
        assert!(parse_conflicts("<<<<<<<\nours\n").is_empty());
    }
}
