//! Core configuration
//!
//! Hosts load a `CoreConfig` from TOML (or start from defaults), apply the
//! environment overrides, and derive the [`ToolOptions`] handed to every
//! tool at construction.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::exec::ContainerConfig;
use crate::tools::ToolOptions;
use buckley_sandbox::SandboxPolicy;

/// Default shell timeout in seconds; overridable via environment.
pub const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 120;
/// Hard cap on the shell timeout override.
pub const MAX_SHELL_TIMEOUT_SECS: u64 = 600;

/// Override variable for the default shell timeout.
pub const SHELL_TIMEOUT_ENV: &str = "BUCKLEY_SHELL_TIMEOUT_SECONDS";
/// Editor override, consulted before VISUAL and EDITOR.
pub const TERMINAL_EDITOR_ENV: &str = "BUCKLEY_TERMINAL_EDITOR";

/// Top-level configuration for the execution core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CoreConfig {
    /// Confinement root for filesystem tools; empty disables confinement
    pub workdir: PathBuf,
    /// Largest file a read/edit tool will load, in bytes
    pub max_file_size: Option<usize>,
    /// Per-stream subprocess capture cap, in bytes
    pub max_output_bytes: Option<usize>,
    /// Default wall-clock bound per external invocation, in seconds
    pub max_exec_seconds: Option<u64>,
    /// Compose delegation settings
    pub container: Option<ContainerSection>,
    /// Sandbox validation policy
    pub sandbox: Option<SandboxPolicy>,
}

/// `[container]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSection {
    pub compose_file: PathBuf,
    pub service: String,
    pub workdir: Option<String>,
}

impl CoreConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Shell timeout, honoring the environment override and its cap.
    pub fn shell_timeout(&self) -> Duration {
        let secs = std::env::var(SHELL_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .or(self.max_exec_seconds)
            .unwrap_or(DEFAULT_SHELL_TIMEOUT_SECS)
            .min(MAX_SHELL_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Tool options derived from this configuration.
    pub fn tool_options(&self) -> ToolOptions {
        let defaults = ToolOptions::default();
        ToolOptions::new(self.workdir.clone())
            .with_max_file_size(self.max_file_size.unwrap_or(defaults.max_file_size))
            .with_max_output_bytes(self.max_output_bytes.unwrap_or(defaults.max_output_bytes))
            .with_max_exec_time(Some(self.shell_timeout()))
            .with_container(self.container.as_ref().map(|c| ContainerConfig {
                compose_file: c.compose_file.clone(),
                service: c.service.clone(),
                workdir: c.workdir.clone(),
            }))
            .with_sandbox(self.sandbox.clone())
    }
}

/// Preferred terminal editor: `BUCKLEY_TERMINAL_EDITOR`, then `VISUAL`, then
/// `EDITOR`; first non-empty wins, defaulting to `vim`.
pub fn terminal_editor() -> String {
    for var in [TERMINAL_EDITOR_ENV, "VISUAL", "EDITOR"] {
        if let Ok(value) = std::env::var(var) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    "vim".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_shell_timeout_default_and_cap() {
        unsafe { std::env::remove_var(SHELL_TIMEOUT_ENV) };
        let config = CoreConfig::default();
        assert_eq!(config.shell_timeout(), Duration::from_secs(120));

        unsafe { std::env::set_var(SHELL_TIMEOUT_ENV, "30") };
        assert_eq!(config.shell_timeout(), Duration::from_secs(30));

        unsafe { std::env::set_var(SHELL_TIMEOUT_ENV, "9999") };
        assert_eq!(config.shell_timeout(), Duration::from_secs(600));

        unsafe { std::env::set_var(SHELL_TIMEOUT_ENV, "junk") };
        assert_eq!(config.shell_timeout(), Duration::from_secs(120));

        unsafe { std::env::remove_var(SHELL_TIMEOUT_ENV) };
    }

    #[test]
    #[serial]
    fn test_terminal_editor_precedence() {
        unsafe {
            std::env::set_var(TERMINAL_EDITOR_ENV, "hx");
            std::env::set_var("VISUAL", "code");
            std::env::set_var("EDITOR", "nano");
        }
        assert_eq!(terminal_editor(), "hx");
        unsafe { std::env::set_var(TERMINAL_EDITOR_ENV, " ") };
        assert_eq!(terminal_editor(), "code");
        unsafe {
            std::env::remove_var(TERMINAL_EDITOR_ENV);
            std::env::remove_var("VISUAL");
            std::env::remove_var("EDITOR");
        }
        assert_eq!(terminal_editor(), "vim");
    }

    #[test]
    #[serial]
    fn test_parse_toml() {
        unsafe { std::env::remove_var(SHELL_TIMEOUT_ENV) };
        let raw = r#"
            workdir = "/work"
            max_output_bytes = 4096

            [container]
            compose_file = "deploy/compose.yml"
            service = "dev"
        "#;
        let config: CoreConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.workdir, PathBuf::from("/work"));
        let options = config.tool_options();
        assert_eq!(options.max_output_bytes, 4096);
        assert_eq!(options.container.as_ref().unwrap().service, "dev");
    }
}
