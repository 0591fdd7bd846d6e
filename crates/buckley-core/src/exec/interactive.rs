//! Interactive command dispatch
//!
//! Interactive commands need a user-attended terminal. Discovery order:
//! an existing tmux session (new detached window, blocking on a wait-for
//! token), a GUI terminal emulator (`BUCKLEY_INTERACTIVE_TERMINAL` override
//! first, then `DISPLAY`/`WAYLAND_DISPLAY` candidates on Unix, AppleScript
//! on macOS), and finally the current TTY. The user command is wrapped so
//! the window does not close the instant it finishes.

use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::ToolError;
use crate::workspace::shell_escape;

use super::{look_path, run_program, sanitize_env, ExecContext, ExecOptions};

/// Override variable: first token is the emulator binary, remaining tokens
/// are its arguments with `{{cmd}}` replaced by the command line.
pub const INTERACTIVE_TERMINAL_ENV: &str = "BUCKLEY_INTERACTIVE_TERMINAL";

/// How an interactive command was dispatched.
#[derive(Debug, Clone)]
pub struct InteractiveOutcome {
    /// `tmux`, the emulator binary, `osascript`, or `tty`
    pub via: String,
    /// Exit code, only observable on the TTY path
    pub exit_code: Option<i32>,
}

/// Dispatch `command` to a user-attended terminal.
pub async fn run_interactive(
    ctx: &ExecContext,
    opts: &ExecOptions,
    command: &str,
) -> Result<InteractiveOutcome, ToolError> {
    if opts.container.is_some() {
        return Err(ToolError::InvalidParams(
            "interactive commands are not supported in container mode".into(),
        ));
    }

    let wrapped = wrap_command(opts, command);

    if std::env::var("TMUX").is_ok() && look_path("tmux").is_some() {
        return run_in_tmux(ctx, opts, &wrapped).await;
    }

    if let Some(outcome) = try_gui_terminal(opts, &wrapped).await? {
        return Ok(outcome);
    }

    run_on_tty(opts, &wrapped).await
}

/// `cd <workdir> && <cmd>` plus a pause so the window survives completion.
fn wrap_command(opts: &ExecOptions, command: &str) -> String {
    let mut wrapped = String::new();
    let workdir = opts.workdir.to_string_lossy();
    if !workdir.trim().is_empty() {
        wrapped.push_str(&format!("cd {} && ", shell_escape(workdir.trim())));
    }
    wrapped.push_str(command);
    wrapped.push_str("; printf '\\n[command finished, press enter to close] '; read -r _");
    wrapped
}

async fn run_in_tmux(
    ctx: &ExecContext,
    opts: &ExecOptions,
    wrapped: &str,
) -> Result<InteractiveOutcome, ToolError> {
    let token = format!("buckley-{}", uuid::Uuid::new_v4());
    let windowed = format!("{}; tmux wait-for -S {}", wrapped, token);

    let open = run_program(
        ctx,
        opts,
        "tmux",
        &["new-window", "-d", "bash", "-lc", windowed.as_str()],
    )
    .await?;
    if !open.success() {
        return Err(ToolError::ExecutionFailed(format!(
            "tmux new-window failed: {}",
            open.stderr.trim()
        )));
    }

    debug!(%token, "waiting for tmux window to finish");
    run_program(ctx, opts, "tmux", &["wait-for", token.as_str()]).await?;
    Ok(InteractiveOutcome {
        via: "tmux".to_string(),
        exit_code: None,
    })
}

async fn try_gui_terminal(
    opts: &ExecOptions,
    wrapped: &str,
) -> Result<Option<InteractiveOutcome>, ToolError> {
    if let Ok(overridden) = std::env::var(INTERACTIVE_TERMINAL_ENV) {
        let tokens: Vec<&str> = overridden.split_whitespace().collect();
        if let Some((binary, rest)) = tokens.split_first() {
            let mut args: Vec<String> = Vec::new();
            let mut substituted = false;
            for token in rest {
                if token.contains("{{cmd}}") {
                    args.push(token.replace("{{cmd}}", wrapped));
                    substituted = true;
                } else {
                    args.push((*token).to_string());
                }
            }
            if !substituted {
                args.push(wrapped.to_string());
            }
            return spawn_terminal(opts, binary, &args).await.map(Some);
        }
    }

    #[cfg(target_os = "macos")]
    {
        let script = format!(
            "tell application \"Terminal\" to do script \"{}\"",
            wrapped.replace('\\', "\\\\").replace('"', "\\\"")
        );
        spawn_terminal(opts, "osascript", &["-e".to_string(), script])
            .await
            .map(Some)
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        if std::env::var("DISPLAY").is_err() && std::env::var("WAYLAND_DISPLAY").is_err() {
            return Ok(None);
        }
        const CANDIDATES: &[(&str, &[&str])] = &[
            ("x-terminal-emulator", &["-e"]),
            ("gnome-terminal", &["--"]),
            ("konsole", &["-e"]),
            ("xfce4-terminal", &["-e"]),
            ("alacritty", &["-e"]),
            ("kitty", &[]),
            ("xterm", &["-e"]),
        ];
        for (binary, prefix) in CANDIDATES {
            if look_path(binary).is_none() {
                continue;
            }
            let mut args: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
            args.push("bash".to_string());
            args.push("-lc".to_string());
            args.push(wrapped.to_string());
            return spawn_terminal(opts, binary, &args).await.map(Some);
        }
        Ok(None)
    }

    #[cfg(not(unix))]
    {
        Ok(None)
    }
}

async fn spawn_terminal(
    opts: &ExecOptions,
    binary: &str,
    args: &[String],
) -> Result<InteractiveOutcome, ToolError> {
    let mut command = Command::new(binary);
    command.args(args).stdin(Stdio::null());
    if !opts.workdir.as_os_str().is_empty() {
        command.current_dir(&opts.workdir);
    }
    for (key, value) in sanitize_env(&opts.env) {
        command.env(key, value);
    }

    debug!(binary, "dispatching interactive command to terminal");
    let status = command
        .status()
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("{} failed to launch: {}", binary, e)))?;
    if !status.success() {
        return Err(ToolError::ExecutionFailed(format!(
            "{} exited with {}",
            binary,
            status.code().unwrap_or(-1)
        )));
    }
    Ok(InteractiveOutcome {
        via: binary.to_string(),
        exit_code: None,
    })
}

/// Last resort: attach the command to the current TTY.
async fn run_on_tty(opts: &ExecOptions, wrapped: &str) -> Result<InteractiveOutcome, ToolError> {
    let mut command = Command::new("bash");
    command
        .arg("-lc")
        .arg(wrapped)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if !opts.workdir.as_os_str().is_empty() {
        command.current_dir(&opts.workdir);
    }
    for (key, value) in sanitize_env(&opts.env) {
        command.env(key, value);
    }

    let status = command.status().await.map_err(ToolError::Io)?;
    Ok(InteractiveOutcome {
        via: "tty".to_string(),
        exit_code: status.code(),
    })
}
