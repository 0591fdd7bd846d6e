//! Peer-agent delegation tools
//!
//! These spawn other agent CLIs (codex, claude, buckley itself) or a
//! logged subagent. Every launch goes through the process-wide delegation
//! guard first and configures the child environment so nesting depth is
//! visible to the spawned agent.

use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::delegation::DelegationGuard;
use crate::error::ToolError;
use crate::exec::{look_path, run_program, ExecContext};
use crate::params::{int_param, required_str, string_list_param};
use crate::result::{mark_truncated, ToolResult};
use crate::tools::{BoxFuture, Tool, ToolOptions};

/// Pause between messages sent to one subagent.
const SUBAGENT_MESSAGE_GAP: Duration = Duration::from_millis(250);

/// Non-TTY marker passed to spawned subagents.
const PLAIN_MODE_ENV: &str = "BUCKLEY_PLAIN_MODE";

/// A delegation target: one peer CLI reachable on PATH.
struct PeerCli {
    tool_name: &'static str,
    binary: &'static str,
    /// Arguments placed before the prompt
    prompt_prefix: &'static [&'static str],
}

/// Tool invoking a peer agent CLI with one prompt
pub struct InvokePeer {
    peer: PeerCli,
    options: ToolOptions,
    guard: Arc<DelegationGuard>,
}

impl InvokePeer {
    pub fn codex(options: ToolOptions, guard: Arc<DelegationGuard>) -> Self {
        Self {
            peer: PeerCli {
                tool_name: "invoke_codex",
                binary: "codex",
                prompt_prefix: &["exec"],
            },
            options,
            guard,
        }
    }

    pub fn claude(options: ToolOptions, guard: Arc<DelegationGuard>) -> Self {
        Self {
            peer: PeerCli {
                tool_name: "invoke_claude",
                binary: "claude",
                prompt_prefix: &["-p"],
            },
            options,
            guard,
        }
    }

    pub fn buckley(options: ToolOptions, guard: Arc<DelegationGuard>) -> Self {
        Self {
            peer: PeerCli {
                tool_name: "invoke_buckley",
                binary: "buckley",
                prompt_prefix: &["-p"],
            },
            options,
            guard,
        }
    }

    fn admit(&self) -> Result<(), ToolError> {
        // Self-delegation hardens with depth: a nested buckley may not spawn
        // another one once two levels deep.
        if self.guard.is_self_delegation(self.peer.tool_name) && self.guard.current_depth() >= 2 {
            return Err(ToolError::DelegationLimit(format!(
                "self-delegation blocked for {} at depth {}",
                self.peer.tool_name,
                self.guard.current_depth()
            )));
        }
        self.guard.check_and_record(self.peer.tool_name)
    }
}

impl Tool for InvokePeer {
    fn name(&self) -> &str {
        self.peer.tool_name
    }

    fn description(&self) -> &str {
        "Delegate a prompt to a peer agent CLI and return its output. \
         Admission is limited by depth, rate, and per-tool cooldown."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The prompt to hand to the peer agent"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Wall-clock bound for the peer invocation"
                }
            },
            "required": ["prompt"]
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let prompt = required_str(&params, "prompt")?;
            let timeout_seconds = int_param(&params, "timeout_seconds", 0);

            self.admit()?;

            if look_path(self.peer.binary).is_none() {
                return Err(ToolError::Unavailable(self.peer.binary.into()));
            }

            let mut exec_options = self.options.exec_options();
            exec_options.env = self.guard.prepare_child_env();
            if timeout_seconds > 0 {
                exec_options.max_exec_time = Some(Duration::from_secs(timeout_seconds as u64));
            }

            let mut args: Vec<&str> = self.peer.prompt_prefix.to_vec();
            args.push(prompt);

            debug!(tool = self.peer.tool_name, "delegating to peer CLI");
            let outcome = run_program(&ctx, &exec_options, self.peer.binary, &args).await?;

            let mut result = if outcome.success() {
                ToolResult::ok()
            } else {
                ToolResult::failure(format!(
                    "{} exited with {}: {}",
                    self.peer.binary,
                    outcome.exit_code,
                    outcome.stderr.trim()
                ))
            };
            result = result
                .with("output", outcome.stdout.clone())
                .with("exit_code", outcome.exit_code)
                .with_display(
                    "summary",
                    format!(
                        "{} returned {} bytes",
                        self.peer.binary,
                        outcome.stdout.len()
                    ),
                )
                .abridged();
            mark_truncated(&mut result, "stdout", outcome.stdout_truncated);
            Ok(result)
        })
    }
}

/// Tool spawning a logged buckley subagent for a task plus follow-ups
pub struct SpawnSubagent {
    options: ToolOptions,
    guard: Arc<DelegationGuard>,
    /// Log directory override, defaulting to `$HOME/.buckley/subagents`
    log_dir: Option<PathBuf>,
}

impl SpawnSubagent {
    pub fn new(options: ToolOptions, guard: Arc<DelegationGuard>) -> Self {
        Self {
            options,
            guard,
            log_dir: None,
        }
    }

    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = Some(dir);
        self
    }

    fn log_path(&self) -> Result<PathBuf, ToolError> {
        let dir = match &self.log_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .ok_or_else(|| ToolError::ExecutionFailed("home directory unknown".into()))?
                .join(".buckley")
                .join("subagents"),
        };
        std::fs::create_dir_all(&dir).map_err(ToolError::Io)?;
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default();
        Ok(dir.join(format!("subagent-{}.log", nanos)))
    }
}

impl Tool for SpawnSubagent {
    fn name(&self) -> &str {
        "spawn_subagent"
    }

    fn description(&self) -> &str {
        "Spawn a subagent for an initial task and optional follow-up \
         messages. The conversation is appended to a log file under \
         ~/.buckley/subagents."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "initial_task": {
                    "type": "string",
                    "description": "The task handed to the subagent"
                },
                "follow_ups": {
                    "type": "array",
                    "description": "Follow-up messages sent in order",
                    "items": {"type": "string"}
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Wall-clock bound per message"
                }
            },
            "required": ["initial_task"]
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let initial_task = required_str(&params, "initial_task")?;
            let follow_ups = string_list_param(&params, "follow_ups");
            let timeout_seconds = int_param(&params, "timeout_seconds", 0);

            self.guard.check_and_record("spawn_subagent")?;

            if look_path("buckley").is_none() {
                return Err(ToolError::Unavailable("buckley".into()));
            }

            let mut exec_options = self.options.exec_options();
            let mut env = self.guard.prepare_child_env();
            env.push((PLAIN_MODE_ENV.to_string(), "1".to_string()));
            exec_options.env = env;
            if timeout_seconds > 0 {
                exec_options.max_exec_time = Some(Duration::from_secs(timeout_seconds as u64));
            }

            let log_path = self.log_path()?;
            let mut log = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .await
                .map_err(ToolError::Io)?;

            let mut responses: Vec<Value> = Vec::new();
            let mut messages = vec![initial_task.to_string()];
            messages.extend(follow_ups);

            for (index, message) in messages.iter().enumerate() {
                if index > 0 {
                    tokio::time::sleep(SUBAGENT_MESSAGE_GAP).await;
                }
                let outcome =
                    run_program(&ctx, &exec_options, "buckley", &["-p", message.as_str()]).await?;

                let entry = format!(
                    "### task\n{}\n### response (exit {})\n{}\n",
                    message, outcome.exit_code, outcome.stdout
                );
                log.write_all(entry.as_bytes()).await.map_err(ToolError::Io)?;

                if !outcome.success() {
                    return Ok(ToolResult::failure(format!(
                        "subagent exited with {} on message {}: {}",
                        outcome.exit_code,
                        index + 1,
                        outcome.stderr.trim()
                    ))
                    .with("log_path", log_path.display().to_string())
                    .with("responses", responses)
                    .abridged());
                }
                responses.push(json!(outcome.stdout));
            }

            let count = responses.len();
            Ok(ToolResult::ok()
                .with("log_path", log_path.display().to_string())
                .with("responses", responses)
                .with_display(
                    "summary",
                    format!("subagent completed {} message(s), log at {}", count, log_path.display()),
                )
                .abridged())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegation::DELEGATION_DEPTH_ENV;
    use serial_test::serial;
    use tempfile::TempDir;

    fn tool(dir: &TempDir) -> InvokePeer {
        InvokePeer::codex(ToolOptions::new(dir.path()), Arc::new(DelegationGuard::new()))
    }

    #[tokio::test]
    #[serial]
    async fn test_depth_limit_blocks_invocation() {
        let dir = TempDir::new().unwrap();
        unsafe { std::env::set_var(DELEGATION_DEPTH_ENV, "3") };
        let err = tool(&dir)
            .execute(json!({"prompt": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("depth limit exceeded"));
        unsafe { std::env::remove_var(DELEGATION_DEPTH_ENV) };
    }

    #[tokio::test]
    #[serial]
    async fn test_cooldown_on_second_call() {
        let dir = TempDir::new().unwrap();
        unsafe { std::env::remove_var(DELEGATION_DEPTH_ENV) };
        let guard = Arc::new(DelegationGuard::new());
        let tool = InvokePeer::codex(ToolOptions::new(dir.path()), guard);

        // First call is admitted (and may then fail on binary availability).
        let first = tool.execute(json!({"prompt": "x"})).await;
        match first {
            Ok(result) => assert!(result.success || !result.error.is_empty()),
            Err(err) => assert!(err.to_string().contains("not available")),
        }

        let second = tool.execute(json!({"prompt": "x"})).await.unwrap_err();
        assert!(second.to_string().contains("cooldown"));
    }

    #[tokio::test]
    #[serial]
    async fn test_self_delegation_hard_block() {
        let dir = TempDir::new().unwrap();
        unsafe { std::env::set_var(DELEGATION_DEPTH_ENV, "2") };
        let tool = InvokePeer::buckley(
            ToolOptions::new(dir.path()),
            Arc::new(DelegationGuard::new()),
        );
        let err = tool.execute(json!({"prompt": "x"})).await.unwrap_err();
        assert!(err.to_string().contains("self-delegation blocked"));
        unsafe { std::env::remove_var(DELEGATION_DEPTH_ENV) };
    }

    #[tokio::test]
    #[serial]
    async fn test_subagent_requires_task() {
        let dir = TempDir::new().unwrap();
        unsafe { std::env::remove_var(DELEGATION_DEPTH_ENV) };
        let tool = SpawnSubagent::new(
            ToolOptions::new(dir.path()),
            Arc::new(DelegationGuard::new()),
        )
        .with_log_dir(dir.path().join("logs"));
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(err.to_string().contains("initial_task is required"));
    }
}
