//! Tool system
//!
//! A tool is a named unit of work with a JSON parameter schema and one
//! execute entry point producing a result envelope. Schemas are advisory;
//! actual validation happens through the tolerant helpers in
//! [`crate::params`]. Domain failures travel inside the envelope — the
//! registry converts any `Err(ToolError)` a tool surfaces into a
//! `success=false` result so hosts never see a transport error for them.

pub mod browse;
pub mod browser;
pub mod catalog;
pub mod compact;
pub mod delegate;
pub mod edit;
pub mod excel;
pub mod fluffy;
pub mod fs;
pub mod git;
pub mod index;
pub mod memory;
pub mod quality;
pub mod refactor;
pub mod scaffold;
pub mod search;
pub mod shell;
pub mod skill;
pub mod testing;
pub mod todo;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ToolError;
use crate::exec::{ContainerConfig, ExecContext, ExecOptions};
use crate::result::ToolResult;
use buckley_sandbox::SandboxPolicy;

/// Boxed future type for object-safe async trait methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Tool definition for LLM consumption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Core trait for all tools
pub trait Tool: Send + Sync {
    /// Stable identifier, lowercase snake_case
    fn name(&self) -> &str;

    /// Human-readable trigger string for the LLM
    fn description(&self) -> &str;

    /// JSON schema for parameters (advisory)
    fn parameters_schema(&self) -> Value;

    /// Canonical entry point: execute with a deadline-carrying context.
    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>>;

    /// Context-less entry; equivalent to a background context.
    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        self.execute_with_context(ExecContext::background(), params)
    }

    /// Convert to tool definition for LLM
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Per-instance tool settings, injected at construction.
#[derive(Debug, Clone)]
pub struct ToolOptions {
    /// Confinement root; empty disables confinement
    pub workdir: PathBuf,
    /// Environment overlay for spawned processes
    pub env: Vec<(String, String)>,
    /// Largest file a read/edit tool will load, in bytes
    pub max_file_size: usize,
    /// Wall-clock bound per external invocation
    pub max_exec_time: Option<Duration>,
    /// Per-stream output capture cap in bytes; zero means unlimited
    pub max_output_bytes: usize,
    /// Compose delegation; set when commands run inside a container
    pub container: Option<ContainerConfig>,
    /// Pre-exec command validation policy
    pub sandbox: Option<SandboxPolicy>,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            workdir: PathBuf::new(),
            env: Vec::new(),
            max_file_size: 10 * 1024 * 1024,
            max_exec_time: Some(Duration::from_secs(120)),
            max_output_bytes: 1024 * 1024,
            container: None,
            sandbox: None,
        }
    }
}

impl ToolOptions {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            ..Self::default()
        }
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_max_exec_time(mut self, max: Option<Duration>) -> Self {
        self.max_exec_time = max;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    pub fn with_max_file_size(mut self, max: usize) -> Self {
        self.max_file_size = max;
        self
    }

    pub fn with_container(mut self, container: Option<ContainerConfig>) -> Self {
        self.container = container;
        self
    }

    pub fn with_sandbox(mut self, sandbox: Option<SandboxPolicy>) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Execution settings for one subprocess run under these options.
    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            workdir: self.workdir.clone(),
            env: self.env.clone(),
            max_exec_time: self.max_exec_time,
            max_output_bytes: self.max_output_bytes,
            container: self.container.clone(),
            sandbox: self.sandbox.clone(),
        }
    }
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all available tools
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.to_definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Get all tools
    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    /// Execute a tool by name, normalizing every failure into the envelope.
    pub async fn dispatch(&self, ctx: ExecContext, name: &str, params: Value) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::failure(format!("unknown tool: {}", name));
        };
        match tool.execute_with_context(ctx, params).await {
            Ok(result) => result,
            Err(err) => ToolResult::from(err),
        }
    }
}
