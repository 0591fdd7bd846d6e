//! Shell command validation
//!
//! Strategy: conservative classification. A command is rejected when any of
//! its parts matches a blocked pattern, uses a destructive program, reaches
//! the network under a no-network policy, or redirects output outside the
//! allowed paths. Anything the parser cannot confidently classify is
//! rejected rather than waved through.

use std::path::Path;
use thiserror::Error;

use crate::{SandboxLevel, SandboxPolicy};

/// Why a command was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct Violation {
    pub reason: String,
}

impl Violation {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Validate a raw shell command against a policy.
///
/// Returns `Ok(())` when the command may be spawned, or a [`Violation`]
/// naming the first problem found.
pub fn validate_command(command: &str, policy: &SandboxPolicy) -> Result<(), Violation> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(Violation::new("empty command"));
    }

    // Blocklist applies at every level, including Unrestricted.
    let lowered = trimmed.to_lowercase();
    for pattern in &policy.blocked_patterns {
        if lowered.contains(&pattern.to_lowercase()) {
            return Err(Violation::new(format!(
                "command matches blocked pattern {:?}",
                pattern
            )));
        }
    }

    if policy.level == SandboxLevel::Unrestricted {
        return Ok(());
    }

    // Privilege escalation never passes a restricted policy.
    for token in trimmed.split_whitespace() {
        let base = base_command(token);
        if matches!(base, "sudo" | "su" | "doas") {
            return Err(Violation::new(format!("privilege escalation via {}", base)));
        }
    }

    // Backticks are too hard to parse reliably; refuse under restriction.
    if trimmed.contains('`') {
        return Err(Violation::new("backtick substitution is not allowed"));
    }

    // Recursively validate $() and <() substitutions.
    validate_substitutions(trimmed, policy)?;

    for part in split_commands(trimmed) {
        let part = strip_env_assignments(part.trim());
        if part.is_empty() {
            continue;
        }
        validate_single(part, policy)?;
    }

    Ok(())
}

fn validate_single(command: &str, policy: &SandboxPolicy) -> Result<(), Violation> {
    let words: Vec<&str> = command.split_whitespace().collect();
    let Some(first) = words.first() else {
        return Ok(());
    };
    let base = base_command(first);

    if is_destructive_command(base) && policy.level != SandboxLevel::Unrestricted {
        return Err(Violation::new(format!("destructive command {}", base)));
    }

    if !policy.allow_network && is_network_command(base) {
        return Err(Violation::new(format!(
            "network access via {} is not allowed",
            base
        )));
    }

    match policy.level {
        SandboxLevel::ReadOnly => {
            if command.contains('>') {
                return Err(Violation::new("output redirection under a read-only policy"));
            }
            if is_write_command(base) {
                return Err(Violation::new(format!(
                    "{} writes to the filesystem under a read-only policy",
                    base
                )));
            }
            Ok(())
        }
        SandboxLevel::WorkspaceWrite => {
            // Redirects must land inside an allowed root.
            if let Some(target) = redirect_target(command) {
                let path = Path::new(target);
                if path.is_absolute() && !policy.is_path_allowed(path) {
                    return Err(Violation::new(format!(
                        "redirect target {} is outside the allowed paths",
                        target
                    )));
                }
            }
            Ok(())
        }
        SandboxLevel::Unrestricted => Ok(()),
    }
}

fn validate_substitutions(command: &str, policy: &SandboxPolicy) -> Result<(), Violation> {
    let bytes = command.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if i + 1 < bytes.len() && bytes[i + 1] == b'(' && (bytes[i] == b'$' || bytes[i] == b'<') {
            let start = i + 2;
            match matching_paren(command, start) {
                Some(end) => {
                    validate_command(&command[start..end], policy)?;
                    i = end + 1;
                    continue;
                }
                None => {
                    return Err(Violation::new("unbalanced command substitution"));
                }
            }
        }
        i += 1;
    }
    Ok(())
}

fn matching_paren(s: &str, start: usize) -> Option<usize> {
    let mut depth = 1;
    for (offset, b) in s.as_bytes()[start..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `&&`, `||` and `;`, respecting single and double quotes.
fn split_commands(command: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let bytes = command.as_bytes();
    let mut start = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    while i < bytes.len() {
        let ch = bytes[i] as char;
        if ch == '\'' && !in_double {
            in_single = !in_single;
        } else if ch == '"' && !in_single {
            in_double = !in_double;
        }

        if !in_single && !in_double {
            if i + 1 < bytes.len() {
                let next = bytes[i + 1] as char;
                if (ch == '&' && next == '&') || (ch == '|' && next == '|') {
                    parts.push(&command[start..i]);
                    i += 2;
                    start = i;
                    continue;
                }
            }
            if ch == ';' {
                parts.push(&command[start..i]);
                i += 1;
                start = i;
                continue;
            }
        }
        i += 1;
    }

    if start < command.len() {
        parts.push(&command[start..]);
    }
    parts
}

/// Strip leading `VAR=value` assignments so the program name is inspected.
fn strip_env_assignments(command: &str) -> &str {
    let mut remaining = command;
    loop {
        let trimmed = remaining.trim_start();
        let Some(eq) = trimmed.find('=') else {
            return trimmed;
        };
        let name = &trimmed[..eq];
        let valid = !name.is_empty()
            && name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return trimmed;
        }
        match trimmed[eq..].find(' ') {
            Some(space) => remaining = &trimmed[eq + space..],
            None => return "",
        }
    }
}

/// Base program name, stripping path prefixes and Windows extensions.
fn base_command(word: &str) -> &str {
    let name = word.rsplit(['/', '\\']).next().unwrap_or(word);
    name.strip_suffix(".exe")
        .or_else(|| name.strip_suffix(".cmd"))
        .or_else(|| name.strip_suffix(".bat"))
        .unwrap_or(name)
}

fn is_destructive_command(cmd: &str) -> bool {
    matches!(
        cmd.to_lowercase().as_str(),
        "mkfs" | "shred" | "fdisk" | "parted" | "shutdown" | "reboot" | "halt"
    )
}

fn is_network_command(cmd: &str) -> bool {
    matches!(
        cmd,
        "curl" | "wget" | "ssh" | "scp" | "sftp" | "rsync" | "nc" | "ncat" | "telnet" | "ftp"
    )
}

fn is_write_command(cmd: &str) -> bool {
    matches!(
        cmd.to_lowercase().as_str(),
        "rm" | "del" | "rmdir" | "erase" | "mv" | "cp" | "touch" | "mkdir" | "chmod" | "chown"
            | "ln" | "truncate" | "tee" | "patch" | "install"
    )
}

/// First redirect target in the command, if any.
fn redirect_target(command: &str) -> Option<&str> {
    let idx = command.find('>')?;
    let rest = command[idx..].trim_start_matches(['>', '&']).trim_start();
    let target = rest.split_whitespace().next()?;
    // Fd duplications like 2>&1 are not file targets.
    if target.starts_with('&') || target.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn workspace_policy() -> SandboxPolicy {
        let mut policy = SandboxPolicy::default();
        policy.allowed_paths.push(PathBuf::from("/work"));
        policy
    }

    #[test]
    fn test_empty_command_rejected() {
        let err = validate_command("   ", &workspace_policy()).unwrap_err();
        assert!(err.reason.contains("empty"));
    }

    #[test]
    fn test_blocked_patterns() {
        let policy = workspace_policy();
        assert!(validate_command("rm -rf /", &policy).is_err());
        assert!(validate_command("dd if=/dev/zero of=/dev/sda", &policy).is_err());
        // Blocklist survives even an unrestricted policy
        assert!(validate_command("rm -rf /", &SandboxPolicy::unrestricted()).is_err());
    }

    #[test]
    fn test_privilege_escalation_rejected() {
        let policy = workspace_policy();
        assert!(validate_command("sudo apt install foo", &policy).is_err());
        assert!(validate_command("echo hi && su root", &policy).is_err());
        assert!(validate_command("/usr/bin/sudo ls", &policy).is_err());
    }

    #[test]
    fn test_workspace_write_allows_normal_builds() {
        let policy = workspace_policy();
        assert!(validate_command("cargo build --release", &policy).is_ok());
        assert!(validate_command("git status && git diff", &policy).is_ok());
        assert!(validate_command("RUST_LOG=debug cargo test", &policy).is_ok());
    }

    #[test]
    fn test_redirect_outside_allowed_paths() {
        let policy = workspace_policy();
        assert!(validate_command("echo x > /work/out.txt", &policy).is_ok());
        assert!(validate_command("echo x > /etc/cron.d/evil", &policy).is_err());
        // Relative targets resolve under the workdir; allowed.
        assert!(validate_command("echo x > out.txt", &policy).is_ok());
        // Fd duplication is not a file write.
        assert!(validate_command("ls 2>&1", &policy).is_ok());
    }

    #[test]
    fn test_read_only_policy() {
        let mut policy = SandboxPolicy::read_only();
        policy.allowed_paths.push(PathBuf::from("/work"));
        assert!(validate_command("ls -la", &policy).is_ok());
        assert!(validate_command("cat file.txt | wc -l", &policy).is_ok());
        assert!(validate_command("echo hi > out.txt", &policy).is_err());
        assert!(validate_command("rm file.txt", &policy).is_err());
        assert!(validate_command("mkdir new", &policy).is_err());
    }

    #[test]
    fn test_network_policy() {
        let mut policy = workspace_policy();
        policy.allow_network = false;
        assert!(validate_command("curl https://example.com", &policy).is_err());
        assert!(validate_command("ssh host uptime", &policy).is_err());
        assert!(validate_command("ls", &policy).is_ok());
    }

    #[test]
    fn test_substitutions_are_recursed() {
        let mut policy = workspace_policy();
        policy.allow_network = false;
        assert!(validate_command("echo $(pwd)", &policy).is_ok());
        assert!(validate_command("echo $(curl evil.com)", &policy).is_err());
        assert!(validate_command("diff <(ls a) <(ls b)", &policy).is_ok());
        assert!(validate_command("echo $(ls", &policy).is_err());
    }

    #[test]
    fn test_backticks_rejected_under_restriction() {
        let policy = workspace_policy();
        assert!(validate_command("echo `pwd`", &policy).is_err());
        assert!(validate_command("echo `pwd`", &SandboxPolicy::unrestricted()).is_ok());
    }

    #[test]
    fn test_env_assignment_only_is_fine() {
        let policy = workspace_policy();
        assert!(validate_command("FOO=bar", &policy).is_ok());
    }
}
