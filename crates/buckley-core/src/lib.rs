//! Buckley Core - tool execution for autonomous coding agents
//!
//! This crate provides the execution core a host agent loop builds on:
//! - A uniform tool contract with a pooled, abridgeable result envelope
//! - Workspace confinement for every filesystem path a tool touches
//! - Bounded subprocess execution (deadlines, output caps, container mode)
//! - A process-wide delegation guard for agent-spawning tools
//! - The standard tool catalog (files, git, search, edit, tests, delegation,
//!   workbooks, browsing, todos, memory, skills, browser sessions)
//!
//! The conversational loop, LLM clients, and persistent stores stay outside;
//! they are injected through the narrow collaborator traits each tool module
//! defines.

pub mod config;
pub mod delegation;
pub mod diff;
pub mod error;
pub mod exec;
pub mod params;
pub mod result;
pub mod tools;
pub mod workspace;

pub use config::CoreConfig;
pub use delegation::{DelegationGuard, DelegationStats, DELEGATION_DEPTH_ENV};
pub use diff::{generate_diff, DiffPreview};
pub use error::{Error, Result, ToolError};
pub use exec::{
    run_interactive, run_program, run_program_with_input, run_shell, ContainerConfig, ExecContext,
    ExecOptions, ExecOutcome, LimitedBuffer,
};
pub use result::{
    abridge_list, abridge_text, acquire_result, acquire_result_slice, mark_truncated,
    release_result, release_result_slice, ToolResult,
};
pub use tools::catalog::{standard_tool_definitions, ToolRegistryBuilder};
pub use tools::{Tool, ToolDefinition, ToolOptions, ToolRegistry};
pub use workspace::{resolve, resolve_rel, within};
