//! Buckley Sandbox - command validation for tool execution
//!
//! This crate decides whether a shell command may be handed to the bounded
//! executor at all. It does not enforce isolation at the OS level; it is the
//! pre-exec gate the executor consults before spawning anything.

pub mod command;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use command::{validate_command, Violation};

/// How much a sandboxed command is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SandboxLevel {
    /// Read-only commands, no writes anywhere
    ReadOnly,
    /// Writes allowed inside the allowed paths
    #[default]
    WorkspaceWrite,
    /// No command-shape restrictions beyond the blocklist
    Unrestricted,
}

/// Sandbox policy consulted before a command is spawned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxPolicy {
    /// Restriction level
    pub level: SandboxLevel,
    /// Paths the command may write under (the executor always adds the workdir)
    pub allowed_paths: Vec<PathBuf>,
    /// Allow commands that reach the network
    pub allow_network: bool,
    /// Substring patterns that are always refused
    pub blocked_patterns: HashSet<String>,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            level: SandboxLevel::WorkspaceWrite,
            allowed_paths: Vec::new(),
            allow_network: true,
            blocked_patterns: default_blocked_patterns(),
        }
    }
}

impl SandboxPolicy {
    pub fn read_only() -> Self {
        Self {
            level: SandboxLevel::ReadOnly,
            allow_network: false,
            ..Self::default()
        }
    }

    pub fn unrestricted() -> Self {
        Self {
            level: SandboxLevel::Unrestricted,
            ..Self::default()
        }
    }

    /// Add a path to the allowed set if not already covered.
    ///
    /// The executor calls this with the tool workdir before validating, so a
    /// policy can never lock a tool out of its own workspace.
    pub fn ensure_allowed_path(&mut self, path: &Path) {
        if path.as_os_str().is_empty() {
            return;
        }
        if !self.allowed_paths.iter().any(|p| path.starts_with(p)) {
            self.allowed_paths.push(path.to_path_buf());
        }
    }

    /// Whether `path` falls under one of the allowed roots.
    pub fn is_path_allowed(&self, path: &Path) -> bool {
        self.allowed_paths.iter().any(|root| path.starts_with(root))
    }
}

fn default_blocked_patterns() -> HashSet<String> {
    let mut blocked = HashSet::new();

    // Unix
    blocked.insert("rm -rf /".to_string());
    blocked.insert("mkfs".to_string());
    blocked.insert("dd if=/dev".to_string());
    blocked.insert(":(){:|:&};:".to_string()); // fork bomb

    // Windows
    blocked.insert("format c:".to_string());
    blocked.insert("del /f /s /q c:\\".to_string());
    blocked.insert("rd /s /q c:\\".to_string());
    blocked.insert("reg delete".to_string());
    blocked.insert("bcdedit".to_string());

    blocked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_allowed_path_dedupes() {
        let mut policy = SandboxPolicy::default();
        policy.ensure_allowed_path(Path::new("/work"));
        policy.ensure_allowed_path(Path::new("/work/sub"));
        assert_eq!(policy.allowed_paths, vec![PathBuf::from("/work")]);
        assert!(policy.is_path_allowed(Path::new("/work/sub/file.txt")));
        assert!(!policy.is_path_allowed(Path::new("/etc/passwd")));
    }

    #[test]
    fn test_empty_path_ignored() {
        let mut policy = SandboxPolicy::default();
        policy.ensure_allowed_path(Path::new(""));
        assert!(policy.allowed_paths.is_empty());
    }
}
