//! Context compaction tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool};

/// Injected compaction collaborator; the request is asynchronous and the
/// tool returns as soon as it is queued.
#[async_trait]
pub trait ContextCompactor: Send + Sync {
    async fn request_compaction(&self) -> anyhow::Result<()>;
}

/// Tool requesting conversation compaction
pub struct CompactContext {
    compactor: Option<Arc<dyn ContextCompactor>>,
}

impl CompactContext {
    pub fn new(compactor: Option<Arc<dyn ContextCompactor>>) -> Self {
        Self { compactor }
    }
}

impl Tool for CompactContext {
    fn name(&self) -> &str {
        "compact_context"
    }

    fn description(&self) -> &str {
        "Request asynchronous compaction of the conversation context."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        let _ = params;
        Box::pin(async move {
            let compactor = self
                .compactor
                .as_ref()
                .ok_or_else(|| ToolError::DependencyAbsent("context compactor".into()))?;
            compactor
                .request_compaction()
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("compaction request: {}", e)))?;
            Ok(ToolResult::ok().with("requested", true))
        })
    }
}
