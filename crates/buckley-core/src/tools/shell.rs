//! Shell execution tool

use serde_json::{json, Value};
use std::time::Duration;

use crate::error::ToolError;
use crate::exec::{run_interactive, run_shell, ExecContext};
use crate::params::{bool_param, int_param, required_str};
use crate::result::{mark_truncated, ToolResult};
use crate::tools::{BoxFuture, Tool, ToolOptions};

/// Tool for executing shell commands under the bounded executor
pub struct RunShell {
    options: ToolOptions,
}

impl RunShell {
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }
}

impl Tool for RunShell {
    fn name(&self) -> &str {
        "run_shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Output is capped and \
         the command is killed at the deadline. Set interactive=true for \
         commands that need a user-attended terminal."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Wall-clock bound for this invocation"
                },
                "interactive": {
                    "type": "boolean",
                    "description": "Dispatch to a user-attended terminal (default false)",
                    "default": false
                }
            },
            "required": ["command"]
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let command = required_str(&params, "command")?;
            let timeout_seconds = int_param(&params, "timeout_seconds", 0);
            let interactive = bool_param(&params, "interactive", false);

            let mut exec_options = self.options.exec_options();
            if timeout_seconds > 0 {
                exec_options.max_exec_time = Some(Duration::from_secs(timeout_seconds as u64));
            }

            if interactive {
                let outcome = run_interactive(&ctx, &exec_options, command).await?;
                let mut result = ToolResult::ok()
                    .with("interactive", true)
                    .with("via", outcome.via);
                if let Some(code) = outcome.exit_code {
                    result = result.with("exit_code", code);
                }
                return Ok(result);
            }

            let outcome = run_shell(&ctx, &exec_options, command).await?;
            let mut result = if outcome.success() {
                ToolResult::ok()
            } else {
                let stderr = outcome.stderr.trim();
                ToolResult::failure(if stderr.is_empty() {
                    format!("command exited with {}", outcome.exit_code)
                } else {
                    format!("command exited with {}: {}", outcome.exit_code, stderr)
                })
            };
            result = result
                .with("stdout", outcome.stdout)
                .with("stderr", outcome.stderr)
                .with("exit_code", outcome.exit_code);
            mark_truncated(&mut result, "stdout", outcome.stdout_truncated);
            mark_truncated(&mut result, "stderr", outcome.stderr_truncated);
            Ok(result)
        })
    }
}
