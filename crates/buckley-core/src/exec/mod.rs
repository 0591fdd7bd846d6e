//! Bounded subprocess execution
//!
//! All external processes a tool spawns flow through [`run_program`] or
//! [`run_shell`]: deadline from the context or the tool's `max_exec_time`,
//! workdir pinning, sanitized environment overlay, capped output capture,
//! optional container (compose) rewriting, and a sandbox pre-check for raw
//! shell commands. Children are spawned with `kill_on_drop` so dropping an
//! execute future reaps them.

mod interactive;
mod limited;

pub use interactive::{run_interactive, InteractiveOutcome};
pub use limited::LimitedBuffer;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use buckley_sandbox::{validate_command, SandboxPolicy};

use crate::error::ToolError;
use crate::workspace::shell_escape;

/// Deadline carrier for one tool execution.
///
/// `background()` is the no-deadline context; caller cancellation is
/// modeled by dropping the execute future.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecContext {
    deadline: Option<Instant>,
}

impl ExecContext {
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Derive a context that also honors `timeout`, keeping the tighter of
    /// the two deadlines.
    pub fn bounded_by(&self, timeout: Option<Duration>) -> Self {
        let candidate = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, candidate) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self { deadline }
    }
}

/// Container (compose) delegation settings.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Compose file handed to `docker compose -f`
    pub compose_file: PathBuf,
    /// Service name commands are exec'd in
    pub service: String,
    /// Working directory inside the container, if any
    pub workdir: Option<String>,
}

/// Per-invocation execution settings, derived from the owning tool's options.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub workdir: PathBuf,
    /// Environment overlay applied on top of the child's default environment
    pub env: Vec<(String, String)>,
    pub max_exec_time: Option<Duration>,
    /// Per-stream capture cap in bytes; zero means unlimited
    pub max_output_bytes: usize,
    pub container: Option<ContainerConfig>,
    pub sandbox: Option<SandboxPolicy>,
}

/// Captured outcome of a bounded subprocess run.
#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Locate a binary on PATH. Tools check this before relying on optional
/// external programs.
pub fn look_path(binary: &str) -> Option<PathBuf> {
    which::which(binary).ok()
}

/// Keep only overlay entries whose keys are valid environment identifiers.
pub fn sanitize_env(overlay: &[(String, String)]) -> Vec<(String, String)> {
    overlay
        .iter()
        .filter(|(key, _)| is_valid_env_key(key))
        .cloned()
        .collect()
}

fn is_valid_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Run a program with arguments under the shared execution discipline.
pub async fn run_program(
    ctx: &ExecContext,
    opts: &ExecOptions,
    program: &str,
    args: &[&str],
) -> Result<ExecOutcome, ToolError> {
    run_program_with_input(ctx, opts, program, args, None).await
}

/// Like [`run_program`], feeding `input` to the child's stdin.
pub async fn run_program_with_input(
    ctx: &ExecContext,
    opts: &ExecOptions,
    program: &str,
    args: &[&str],
    input: Option<&[u8]>,
) -> Result<ExecOutcome, ToolError> {
    if let Some(container) = &opts.container {
        // A program invocation in container mode becomes one shell line.
        let mut line = shell_escape(program);
        for arg in args {
            line.push(' ');
            line.push_str(&shell_escape(arg));
        }
        let (compose_program, compose_args) = container_command(container, opts, &line);
        let arg_refs: Vec<&str> = compose_args.iter().map(String::as_str).collect();
        return spawn_captured(ctx, opts, &compose_program, &arg_refs, input).await;
    }

    spawn_captured(ctx, opts, program, args, input).await
}

/// Run a raw shell command (`bash -lc`), with the sandbox pre-check.
pub async fn run_shell(
    ctx: &ExecContext,
    opts: &ExecOptions,
    command: &str,
) -> Result<ExecOutcome, ToolError> {
    if let Some(policy) = &opts.sandbox
        && opts.container.is_none()
    {
        let mut policy = policy.clone();
        policy.ensure_allowed_path(&opts.workdir);
        validate_command(command, &policy)
            .map_err(|v| ToolError::SandboxBlocked(v.to_string()))?;
    }

    if let Some(container) = &opts.container {
        let (program, args) = container_command(container, opts, command);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        return spawn_captured(ctx, opts, &program, &arg_refs, None).await;
    }

    spawn_captured(ctx, opts, "bash", &["-lc", command], None).await
}

/// Rewrite a command for compose delegation:
/// `docker compose -f <file> exec -T [-e K=V ...] [-w dir] <service> bash -lc <cmd>`.
fn container_command(
    container: &ContainerConfig,
    opts: &ExecOptions,
    command: &str,
) -> (String, Vec<String>) {
    let mut args = vec![
        "compose".to_string(),
        "-f".to_string(),
        container.compose_file.display().to_string(),
        "exec".to_string(),
        "-T".to_string(),
    ];
    for (key, value) in sanitize_env(&opts.env) {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }
    if let Some(dir) = &container.workdir {
        args.push("-w".to_string());
        args.push(dir.clone());
    }
    args.push(container.service.clone());
    args.push("bash".to_string());
    args.push("-lc".to_string());
    args.push(command.to_string());
    ("docker".to_string(), args)
}

async fn spawn_captured(
    ctx: &ExecContext,
    opts: &ExecOptions,
    program: &str,
    args: &[&str],
    input: Option<&[u8]>,
) -> Result<ExecOutcome, ToolError> {
    let effective = ctx.bounded_by(opts.max_exec_time);

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let workdir = trim_path(&opts.workdir);
    if !workdir.as_os_str().is_empty() {
        command.current_dir(&workdir);
    }
    for (key, value) in sanitize_env(&opts.env) {
        command.env(key, value);
    }

    debug!(program, ?workdir, "spawning subprocess");
    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolError::Unavailable(program.to_string())
        } else {
            ToolError::Io(e)
        }
    })?;

    let mut stdin_pipe = child.stdin.take();
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let cap = opts.max_output_bytes;

    let drain = async {
        let stdin_task = async {
            if let (Some(mut pipe), Some(bytes)) = (stdin_pipe.take(), input) {
                use tokio::io::AsyncWriteExt;
                let _ = pipe.write_all(bytes).await;
                let _ = pipe.shutdown().await;
            }
        };
        let stdout_task = async {
            let mut buf = LimitedBuffer::new(cap);
            if let Some(pipe) = stdout_pipe.as_mut() {
                drain_pipe(pipe, &mut buf).await;
            }
            buf
        };
        let stderr_task = async {
            let mut buf = LimitedBuffer::new(cap);
            if let Some(pipe) = stderr_pipe.as_mut() {
                drain_pipe(pipe, &mut buf).await;
            }
            buf
        };
        let (_, stdout_buf, stderr_buf, status) =
            tokio::join!(stdin_task, stdout_task, stderr_task, child.wait());
        (stdout_buf, stderr_buf, status)
    };

    let (stdout_buf, stderr_buf, status) = match effective.remaining() {
        Some(remaining) => {
            let outcome = tokio::time::timeout(remaining, drain).await;
            match outcome {
                Ok(outcome) => outcome,
                Err(_) => {
                    // kill_on_drop would reap it eventually; kill now so the
                    // child is gone before we report.
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Err(ToolError::Timeout(format!(
                        "command after {:.0?}",
                        remaining
                    )));
                }
            }
        }
        None => drain.await,
    };

    let status = status.map_err(ToolError::Io)?;
    let stdout_truncated = stdout_buf.truncated();
    let stderr_truncated = stderr_buf.truncated();
    Ok(ExecOutcome {
        stdout: stdout_buf.into_string(),
        stderr: stderr_buf.into_string(),
        exit_code: status.code().unwrap_or(-1),
        stdout_truncated,
        stderr_truncated,
    })
}

async fn drain_pipe<R: tokio::io::AsyncRead + Unpin>(pipe: &mut R, buf: &mut LimitedBuffer) {
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.write(&chunk[..n]);
            }
        }
    }
}

fn trim_path(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().trim())
}
