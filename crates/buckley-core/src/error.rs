//! Error types for Buckley Core

use thiserror::Error;

/// Result type alias using Buckley Error
pub type Result<T> = std::result::Result<T, Error>;

/// Buckley error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Tool-level errors
///
/// Every variant maps to a `success=false` result envelope at the registry
/// boundary; tools use `?` internally and never surface these as transport
/// failures to the host.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0} escapes workdir")]
    WorkspaceEscape(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Required binary not available: {0}")]
    Unavailable(String),

    #[error("sandbox blocked command: {0}")]
    SandboxBlocked(String),

    #[error("Delegation refused: {0}")]
    DelegationLimit(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing dependency: {0}")]
    DependencyAbsent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
