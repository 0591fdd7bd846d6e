//! Patch application tool

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::exec::{look_path, run_program_with_input, ExecContext};
use crate::params::{int_param, required_str};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool, ToolOptions};

/// Tool piping a unified diff to `patch`
pub struct ApplyPatch {
    options: ToolOptions,
}

impl ApplyPatch {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for ApplyPatch {
    fn name(&self) -> &str {
        "apply_patch"
    }

    fn description(&self) -> &str {
        "Apply a unified diff to the workspace by piping it to the patch \
         program. Already-applied hunks are skipped."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "patch": {
                    "type": "string",
                    "description": "Unified diff text"
                },
                "strip": {
                    "type": "integer",
                    "description": "Path components stripped from diff headers (-p)",
                    "default": 1
                }
            },
            "required": ["patch"]
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let patch = required_str(&params, "patch")?;
            let strip = int_param(&params, "strip", 1).max(0);

            if look_path("patch").is_none() {
                return Err(ToolError::Unavailable("patch".into()));
            }

            let strip_arg = format!("-p{}", strip);
            let outcome = run_program_with_input(
                &ctx,
                &self.options.exec_options(),
                "patch",
                &[strip_arg.as_str(), "-N", "-s"],
                Some(patch.as_bytes()),
            )
            .await?;

            let mut result = if outcome.success() {
                ToolResult::ok()
            } else {
                ToolResult::failure(format!(
                    "patch exited with {}: {}",
                    outcome.exit_code,
                    outcome.stderr.trim()
                ))
            };
            result = result
                .with("exit_code", outcome.exit_code)
                .with("stdout", outcome.stdout)
                .with("stderr", outcome.stderr);
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_apply_simple_patch() {
        if look_path("patch").is_none() {
            return;
        }
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old line\n").unwrap();
        let patch = "--- a/a.txt\n+++ b/a.txt\n@@ -1,1 +1,1 @@\n-old line\n+new line\n";

        let result = ApplyPatch::new(ToolOptions::new(dir.path()))
            .execute(json!({"patch": patch}))
            .await
            .unwrap();
        assert!(result.success, "patch failed: {}", result.error);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "new line\n"
        );
    }

    #[tokio::test]
    async fn test_malformed_patch_fails() {
        if look_path("patch").is_none() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let result = ApplyPatch::new(ToolOptions::new(dir.path()))
            .execute(json!({"patch": "this is not a diff"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.data.contains_key("exit_code"));
    }

    #[tokio::test]
    async fn test_patch_required() {
        let dir = TempDir::new().unwrap();
        let err = ApplyPatch::new(ToolOptions::new(dir.path()))
            .execute(json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("patch is required"));
    }
}
