//! Delegation guard
//!
//! Tools that spawn peer agents (codex, claude, buckley itself, subagents)
//! consult one process-wide guard before launching anything. The guard
//! bounds nesting depth via an environment variable propagated to children,
//! rate-limits admissions over a sliding window, and enforces a per-tool
//! cooldown so a confused agent cannot hammer the same delegation target.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::error::ToolError;

/// Depth is propagated to spawned children through this variable.
pub const DELEGATION_DEPTH_ENV: &str = "BUCKLEY_DELEGATION_DEPTH";

/// Tool name under which this process invokes itself.
pub const SELF_INVOCATION_TOOL: &str = "invoke_buckley";

const MAX_DEPTH: u64 = 3;
const WINDOW: Duration = Duration::from_secs(60);
const MAX_PER_WINDOW: usize = 10;
const COOLDOWN: Duration = Duration::from_secs(2);

#[derive(Default)]
struct GuardState {
    /// Timestamps of recent admissions, pruned to the trailing window.
    window: Vec<Instant>,
    /// Last admission per tool name, for the cooldown check.
    last_invocation: HashMap<String, Instant>,
}

/// Process-wide delegation limiter. All operations serialize on one lock.
#[derive(Default)]
pub struct DelegationGuard {
    state: Mutex<GuardState>,
}

/// Read-only snapshot for diagnostics.
#[derive(Debug, Clone)]
pub struct DelegationStats {
    pub depth: u64,
    pub recent_delegations: usize,
    pub tracked_tools: usize,
}

impl DelegationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared guard used by the standard tool catalog. One per process;
    /// every delegation tool serializes its admission through it.
    pub fn global() -> std::sync::Arc<DelegationGuard> {
        static GLOBAL: OnceLock<std::sync::Arc<DelegationGuard>> = OnceLock::new();
        GLOBAL.get_or_init(|| std::sync::Arc::new(DelegationGuard::new())).clone()
    }

    /// Current nesting depth from the environment; absent or unparsable
    /// values read as zero.
    pub fn current_depth(&self) -> u64 {
        std::env::var(DELEGATION_DEPTH_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0)
    }

    /// Check depth, window, and cooldown without recording an admission.
    pub fn can_delegate(&self, tool_name: &str) -> Result<(), ToolError> {
        let mut state = self.state.lock();
        self.check_locked(&mut state, tool_name, Instant::now())
    }

    /// Record a successful admission.
    pub fn record_delegation(&self, tool_name: &str) {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.window.push(now);
        state.last_invocation.insert(tool_name.to_string(), now);
    }

    /// Atomic check-then-record; refusals leave the state untouched.
    pub fn check_and_record(&self, tool_name: &str) -> Result<(), ToolError> {
        let mut state = self.state.lock();
        let now = Instant::now();
        self.check_locked(&mut state, tool_name, now)?;
        state.window.push(now);
        state.last_invocation.insert(tool_name.to_string(), now);
        Ok(())
    }

    /// Clone the process environment with the depth bumped for a child.
    pub fn prepare_child_env(&self) -> Vec<(String, String)> {
        let next = (self.current_depth() + 1).to_string();
        let mut env: Vec<(String, String)> = std::env::vars()
            .filter(|(key, _)| key != DELEGATION_DEPTH_ENV)
            .collect();
        env.push((DELEGATION_DEPTH_ENV.to_string(), next));
        env
    }

    /// True when a nested process would be invoking the host's own tool.
    pub fn is_self_delegation(&self, tool_name: &str) -> bool {
        tool_name == SELF_INVOCATION_TOOL && self.current_depth() > 0
    }

    /// Snapshot for diagnostics. Derived fields are computed under the same
    /// single lock acquisition.
    pub fn stats(&self) -> DelegationStats {
        let mut state = self.state.lock();
        let now = Instant::now();
        prune(&mut state.window, now);
        DelegationStats {
            depth: self.current_depth(),
            recent_delegations: state.window.len(),
            tracked_tools: state.last_invocation.len(),
        }
    }

    fn check_locked(
        &self,
        state: &mut GuardState,
        tool_name: &str,
        now: Instant,
    ) -> Result<(), ToolError> {
        let depth = self.current_depth();
        if depth >= MAX_DEPTH {
            return Err(ToolError::DelegationLimit(format!(
                "depth limit exceeded (depth {}, max {})",
                depth, MAX_DEPTH
            )));
        }

        prune(&mut state.window, now);
        if state.window.len() >= MAX_PER_WINDOW {
            return Err(ToolError::DelegationLimit(format!(
                "rate limit: {} delegations in the last {}s",
                state.window.len(),
                WINDOW.as_secs()
            )));
        }

        if let Some(last) = state.last_invocation.get(tool_name) {
            let age = now.saturating_duration_since(*last);
            if age < COOLDOWN {
                let remaining = COOLDOWN - age;
                return Err(ToolError::DelegationLimit(format!(
                    "cooldown: {:.1}s remaining for {}",
                    remaining.as_secs_f64(),
                    tool_name
                )));
            }
        }

        Ok(())
    }

    #[cfg(test)]
    fn seed(&self, window: Vec<Instant>, last: Vec<(&str, Instant)>) {
        let mut state = self.state.lock();
        state.window = window;
        state.last_invocation = last
            .into_iter()
            .map(|(name, at)| (name.to_string(), at))
            .collect();
    }
}

fn prune(window: &mut Vec<Instant>, now: Instant) {
    window.retain(|at| now.saturating_duration_since(*at) < WINDOW);
}
