//! Git tools
//!
//! Thin, bounded wrappers over the `git` binary. Output flows through the
//! shared executor caps; repo-relative paths come from the confinement
//! layer's `resolve_rel`.

mod conflicts;

pub use conflicts::{ListMergeConflicts, MarkConflictResolved};

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::exec::{look_path, run_program, ExecContext, ExecOutcome};
use crate::params::{bool_param, int_param, required_str, string_param};
use crate::result::{mark_truncated, ToolResult};
use crate::tools::{BoxFuture, Tool, ToolOptions};
use crate::workspace::resolve_rel;

pub(crate) async fn run_git(
    ctx: &ExecContext,
    options: &ToolOptions,
    args: &[&str],
) -> Result<ExecOutcome, ToolError> {
    if look_path("git").is_none() {
        return Err(ToolError::Unavailable("git".into()));
    }
    run_program(ctx, &options.exec_options(), "git", args).await
}

/// Wrap a git invocation's outcome in the envelope.
fn git_result(outcome: ExecOutcome) -> ToolResult {
    let mut result = if outcome.success() {
        ToolResult::ok()
    } else {
        ToolResult::failure(format!(
            "git exited with {}: {}",
            outcome.exit_code,
            outcome.stderr.trim()
        ))
    };
    result = result
        .with("output", outcome.stdout.clone())
        .with("exit_code", outcome.exit_code);
    mark_truncated(&mut result, "stdout", outcome.stdout_truncated);
    mark_truncated(&mut result, "stderr", outcome.stderr_truncated);
    result
}

/// Tool reporting working-tree status
pub struct GitStatus {
    options: ToolOptions,
}

impl GitStatus {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for GitStatus {
    fn name(&self) -> &str {
        "git_status"
    }

    fn description(&self) -> &str {
        "Show the git working-tree status (porcelain format, with branch)."
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
            let outcome = run_git(&ctx, &self.options, &["status", "--porcelain=v1", "--branch"])
                .await?;
            let mut result = git_result(outcome);
            if result.success {
                let raw = result.data["output"].as_str().unwrap_or_default().to_owned();
                let mut branch = String::new();
                let mut files = Vec::new();
                for line in raw.lines() {
                    if let Some(rest) = line.strip_prefix("## ") {
                        branch = rest.to_string();
                    } else if line.len() > 3 {
                        files.push(json!({
                            "status": line[..2].trim(),
                            "path": line[3..].to_string(),
                        }));
                    }
                }
                result = result.with("branch", branch).with("files", files);
            }
            Ok(result)
        })
    }
}

/// Tool showing diffs
pub struct GitDiff {
    options: ToolOptions,
}

impl GitDiff {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for GitDiff {
    fn name(&self) -> &str {
        "git_diff"
    }

    fn description(&self) -> &str {
        "Show git diff output, optionally staged or limited to one file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file": {
                    "type": "string",
                    "description": "Limit the diff to one file (relative to workdir)"
                },
                "staged": {
                    "type": "boolean",
                    "description": "Diff the index instead of the working tree",
                    "default": false
                }
            },
            "required": []
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let staged = bool_param(&params, "staged", false);
            let file = string_param(&params, "file");

            let mut args: Vec<String> = vec!["diff".into()];
            if staged {
                args.push("--staged".into());
            }
            if !file.is_empty() {
                let (_, relative) = resolve_rel(&self.options.workdir, &file)?;
                args.push("--".into());
                args.push(relative.to_string_lossy().into_owned());
            }
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let outcome = run_git(&ctx, &self.options, &arg_refs).await?;
            Ok(git_result(outcome))
        })
    }
}

/// Tool showing commit history
pub struct GitLog {
    options: ToolOptions,
}

impl GitLog {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for GitLog {
    fn name(&self) -> &str {
        "git_log"
    }

    fn description(&self) -> &str {
        "Show recent commits (oneline format), optionally for one file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "count": {
                    "type": "integer",
                    "description": "Number of commits to show (default 10)",
                    "default": 10
                },
                "file": {
                    "type": "string",
                    "description": "Limit history to one file (relative to workdir)"
                }
            },
            "required": []
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let count = int_param(&params, "count", 10).clamp(1, 1000);
            let file = string_param(&params, "file");

            let count_arg = format!("-n{}", count);
            let mut args: Vec<String> = vec!["log".into(), "--oneline".into(), count_arg];
            if !file.is_empty() {
                let (_, relative) = resolve_rel(&self.options.workdir, &file)?;
                args.push("--".into());
                args.push(relative.to_string_lossy().into_owned());
            }
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let outcome = run_git(&ctx, &self.options, &arg_refs).await?;
            Ok(git_result(outcome))
        })
    }
}

/// Tool annotating line authorship
pub struct GitBlame {
    options: ToolOptions,
}

impl GitBlame {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for GitBlame {
    fn name(&self) -> &str {
        "git_blame"
    }

    fn description(&self) -> &str {
        "Show line-by-line authorship for a file, optionally for a line range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file": {
                    "type": "string",
                    "description": "File to annotate (relative to workdir)"
                },
                "start_line": {
                    "type": "integer",
                    "description": "First line of the range (1-indexed)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Last line of the range (inclusive)"
                }
            },
            "required": ["file"]
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let file = required_str(&params, "file")?;
            let start = int_param(&params, "start_line", 0);
            let end = int_param(&params, "end_line", 0);

            let (_, relative) = resolve_rel(&self.options.workdir, file)?;
            let mut args: Vec<String> = vec!["blame".into()];
            if start > 0 {
                let end = if end >= start { end } else { start };
                args.push("-L".into());
                args.push(format!("{},{}", start, end));
            }
            args.push("--".into());
            args.push(relative.to_string_lossy().into_owned());
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let outcome = run_git(&ctx, &self.options, &arg_refs).await?;
            Ok(git_result(outcome))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn init_repo(dir: &TempDir) -> bool {
        if look_path("git").is_none() {
            return false;
        }
        let opts = ToolOptions::new(dir.path());
        let ctx = ExecContext::background();
        for args in [
            vec!["init", "-q"],
            vec!["config", "user.email", "t@example.com"],
            vec!["config", "user.name", "t"],
        ] {
            let outcome = run_git(&ctx, &opts, &args).await.unwrap();
            if !outcome.success() {
                return false;
            }
        }
        true
    }

    #[tokio::test]
    async fn test_status_reports_untracked() {
        let dir = TempDir::new().unwrap();
        if !init_repo(&dir).await {
            return;
        }
        std::fs::write(dir.path().join("new.txt"), "x").unwrap();

        let result = GitStatus::new(ToolOptions::new(dir.path()))
            .execute(json!({}))
            .await
            .unwrap();
        assert!(result.success, "{}", result.error);
        let files = result.data["files"].as_array().unwrap();
        assert!(files
            .iter()
            .any(|f| f["path"] == json!("new.txt") && f["status"] == json!("??")));
    }

    #[tokio::test]
    async fn test_diff_of_modified_file() {
        let dir = TempDir::new().unwrap();
        if !init_repo(&dir).await {
            return;
        }
        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        let opts = ToolOptions::new(dir.path());
        let ctx = ExecContext::background();
        run_git(&ctx, &opts, &["add", "."]).await.unwrap();
        run_git(&ctx, &opts, &["commit", "-qm", "init"]).await.unwrap();
        std::fs::write(dir.path().join("a.txt"), "two\n").unwrap();

        let result = GitDiff::new(ToolOptions::new(dir.path()))
            .execute(json!({"file": "a.txt"}))
            .await
            .unwrap();
        assert!(result.success);
        let output = result.data["output"].as_str().unwrap();
        assert!(output.contains("-one"));
        assert!(output.contains("+two"));
    }

    #[tokio::test]
    async fn test_log_outside_repo_fails() {
        let dir = TempDir::new().unwrap();
        if look_path("git").is_none() {
            return;
        }
        let result = GitLog::new(ToolOptions::new(dir.path()))
            .execute(json!({}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.data.contains_key("exit_code"));
    }
}
