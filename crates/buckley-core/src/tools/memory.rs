//! Session memory tool
//!
//! Query and append over the injected long-term memory store. Three tiers:
//! raw transcript chunks, distilled events, and the rolling summary.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{int_param, required_str, string_param};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool};

/// Memory tier addressed by the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryTier {
    Raw,
    Events,
    Summary,
}

impl FromStr for MemoryTier {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "events" => Ok(MemoryTier::Events),
            "raw" => Ok(MemoryTier::Raw),
            "summary" => Ok(MemoryTier::Summary),
            other => Err(ToolError::InvalidParams(format!(
                "invalid tier: {}. Must be raw, events, or summary",
                other
            ))),
        }
    }
}

impl MemoryTier {
    fn as_str(&self) -> &'static str {
        match self {
            MemoryTier::Raw => "raw",
            MemoryTier::Events => "events",
            MemoryTier::Summary => "summary",
        }
    }
}

/// Injected memory store collaborator.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn query(
        &self,
        tier: MemoryTier,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Value>>;
    async fn append(&self, tier: MemoryTier, entry: Value) -> anyhow::Result<()>;
    async fn summary(&self) -> anyhow::Result<String>;
}

/// Tool reading and writing session memory
pub struct SessionMemory {
    store: Option<Arc<dyn MemoryStore>>,
}

impl SessionMemory {
    pub fn new(store: Option<Arc<dyn MemoryStore>>) -> Self {
        Self { store }
    }
}

impl Tool for SessionMemory {
    fn name(&self) -> &str {
        "session_memory"
    }

    fn description(&self) -> &str {
        "Query or append session memory. Tiers: raw, events, summary. \
         Actions: query, append, summary."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "Memory action to perform",
                    "enum": ["query", "append", "summary"]
                },
                "tier": {
                    "type": "string",
                    "description": "Memory tier (default events)",
                    "enum": ["raw", "events", "summary"]
                },
                "query": {
                    "type": "string",
                    "description": "Search text for query"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum entries returned (default 20)",
                    "default": 20
                },
                "entry": {
                    "description": "Entry payload for append"
                }
            },
            "required": ["action"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let store = self
                .store
                .as_ref()
                .ok_or_else(|| ToolError::DependencyAbsent("memory store".into()))?;
            let action = required_str(&params, "action")?;
            let tier: MemoryTier = string_param(&params, "tier").parse()?;

            match action {
                "query" => {
                    let query = string_param(&params, "query");
                    let limit = int_param(&params, "limit", 20).clamp(1, 500) as usize;
                    let entries = store
                        .query(tier, &query, limit)
                        .await
                        .map_err(|e| ToolError::ExecutionFailed(format!("memory query: {}", e)))?;
                    Ok(ToolResult::ok()
                        .with("tier", tier.as_str())
                        .with("count", entries.len() as i64)
                        .with("entries", entries))
                }
                "append" => {
                    let entry = params
                        .get("entry")
                        .cloned()
                        .ok_or_else(|| ToolError::InvalidParams("entry is required".into()))?;
                    store
                        .append(tier, entry)
                        .await
                        .map_err(|e| ToolError::ExecutionFailed(format!("memory append: {}", e)))?;
                    Ok(ToolResult::ok()
                        .with("tier", tier.as_str())
                        .with("appended", true))
                }
                "summary" => {
                    let summary = store
                        .summary()
                        .await
                        .map_err(|e| ToolError::ExecutionFailed(format!("memory summary: {}", e)))?;
                    Ok(ToolResult::ok().with("summary", summary))
                }
                other => Err(ToolError::InvalidParams(format!(
                    "unknown action: {}",
                    other
                ))),
            }
        })
    }
}
