//! Code index and embeddings tools
//!
//! Pure delegation to injected stores. `lookup_context` carries its own
//! five second deadline so a wedged index cannot stall the agent loop.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{int_param, required_str, string_param};
use crate::result::{abridge_list, ToolResult, SYMBOL_DISPLAY_MATCHES};
use crate::tools::{BoxFuture, Tool};

const LOOKUP_DEADLINE: Duration = Duration::from_secs(5);

/// One entry returned by the code index.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub path: String,
    pub line: u64,
    pub kind: String,
    pub snippet: String,
}

impl ContextEntry {
    fn to_json(&self) -> Value {
        json!({
            "path": self.path,
            "line": self.line,
            "kind": self.kind,
            "snippet": self.snippet,
        })
    }
}

/// Injected code index collaborator for context lookup.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn lookup(
        &self,
        query: &str,
        path: &str,
        symbol: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ContextEntry>>;
}

/// One semantic search hit.
#[derive(Debug, Clone)]
pub struct EmbeddingHit {
    pub path: String,
    pub score: f64,
    pub snippet: String,
}

/// Injected embeddings searcher collaborator.
#[async_trait]
pub trait EmbeddingsSearcher: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<EmbeddingHit>>;
    async fn status(&self) -> anyhow::Result<Value>;
    async fn rebuild(&self, path: &str) -> anyhow::Result<()>;
    async fn clear(&self) -> anyhow::Result<()>;
}

/// Tool querying the code index
pub struct LookupContext {
    store: Option<Arc<dyn ContextStore>>,
}

impl LookupContext {
    pub fn new(store: Option<Arc<dyn ContextStore>>) -> Self {
        Self { store }
    }
}

impl Tool for LookupContext {
    fn name(&self) -> &str {
        "lookup_context"
    }

    fn description(&self) -> &str {
        "Query the code index for context entries by free-text query, path, \
         or symbol."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-text query"
                },
                "path": {
                    "type": "string",
                    "description": "Restrict to a path prefix"
                },
                "symbol": {
                    "type": "string",
                    "description": "Restrict to a symbol name"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum entries returned (default 20)",
                    "default": 20
                }
            },
            "required": []
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
                .ok_or_else(|| ToolError::DependencyAbsent("code index".into()))?;

            let query = string_param(&params, "query");
            let path = string_param(&params, "path");
            let symbol = string_param(&params, "symbol");
            let limit = int_param(&params, "limit", 20).clamp(1, 500) as usize;

            if query.is_empty() && path.is_empty() && symbol.is_empty() {
                return Err(ToolError::InvalidParams(
                    "one of query, path, or symbol is required".into(),
                ));
            }

            let entries = tokio::time::timeout(
                LOOKUP_DEADLINE,
                store.lookup(&query, &path, &symbol, limit),
            )
            .await
            .map_err(|_| ToolError::Timeout("code index lookup".into()))?
            .map_err(|e| ToolError::ExecutionFailed(format!("index lookup failed: {}", e)))?;

            let values: Vec<Value> = entries.iter().map(ContextEntry::to_json).collect();
            Ok(ToolResult::ok()
                .with("count", values.len() as i64)
                .with("entries", values))
        })
    }
}

/// Tool searching the embeddings index
pub struct SemanticSearch {
    searcher: Option<Arc<dyn EmbeddingsSearcher>>,
}

impl SemanticSearch {
    pub fn new(searcher: Option<Arc<dyn EmbeddingsSearcher>>) -> Self {
        Self { searcher }
    }
}

impl Tool for SemanticSearch {
    fn name(&self) -> &str {
        "semantic_search"
    }

    fn description(&self) -> &str {
        "Search the embeddings index for semantically similar code."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural-language query"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum hits returned (default 10)",
                    "default": 10
                }
            },
            "required": ["query"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let searcher = self
                .searcher
                .as_ref()
                .ok_or_else(|| ToolError::DependencyAbsent("embeddings searcher".into()))?;
            let query = required_str(&params, "query")?;
            let limit = int_param(&params, "limit", 10).clamp(1, 100) as usize;

            let hits = searcher
                .search(query, limit)
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("semantic search failed: {}", e)))?;

            let values: Vec<Value> = hits
                .iter()
                .map(|h| {
                    json!({
                        "path": h.path,
                        "score": h.score,
                        "snippet": h.snippet,
                    })
                })
                .collect();
            let mut result = ToolResult::ok()
                .with("query", query)
                .with("count", values.len() as i64)
                .with("hits", values.clone());
            abridge_list(&mut result, "hits", &values, SYMBOL_DISPLAY_MATCHES, "hits");
            Ok(result)
        })
    }
}

/// Tool administering the embeddings index
pub struct ManageEmbeddingsIndex {
    searcher: Option<Arc<dyn EmbeddingsSearcher>>,
}

impl ManageEmbeddingsIndex {
    pub fn new(searcher: Option<Arc<dyn EmbeddingsSearcher>>) -> Self {
        Self { searcher }
    }
}

impl Tool for ManageEmbeddingsIndex {
    fn name(&self) -> &str {
        "manage_embeddings_index"
    }

    fn description(&self) -> &str {
        "Administer the embeddings index. Actions: status, rebuild, clear."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "Index action to perform",
                    "enum": ["status", "rebuild", "clear"]
                },
                "path": {
                    "type": "string",
                    "description": "Subtree to rebuild (rebuild only)"
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
            let searcher = self
                .searcher
                .as_ref()
                .ok_or_else(|| ToolError::DependencyAbsent("embeddings searcher".into()))?;
            let action = required_str(&params, "action")?;

            match action {
                "status" => {
                    let status = searcher
                        .status()
                        .await
                        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
                    Ok(ToolResult::ok().with("status", status))
                }
                "rebuild" => {
                    let path = string_param(&params, "path");
                    searcher
                        .rebuild(&path)
                        .await
                        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
                    Ok(ToolResult::ok().with("action", "rebuild").with("path", path))
                }
                "clear" => {
                    searcher
                        .clear()
                        .await
                        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
                    Ok(ToolResult::ok().with("action", "clear"))
                }
                other => Err(ToolError::InvalidParams(format!(
                    "unknown action: {}",
                    other
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowStore;

    #[async_trait]
    impl ContextStore for SlowStore {
        async fn lookup(
            &self,
            _query: &str,
            _path: &str,
            _symbol: &str,
            _limit: usize,
        ) -> anyhow::Result<Vec<ContextEntry>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    struct FastStore;

    #[async_trait]
    impl ContextStore for FastStore {
        async fn lookup(
            &self,
            query: &str,
            _path: &str,
            _symbol: &str,
            _limit: usize,
        ) -> anyhow::Result<Vec<ContextEntry>> {
            Ok(vec![ContextEntry {
                path: "src/lib.rs".into(),
                line: 3,
                kind: "function".into(),
                snippet: format!("fn {}()", query),
            }])
        }
    }

    #[tokio::test]
    async fn test_lookup_returns_entries() {
        let tool = LookupContext::new(Some(Arc::new(FastStore)));
        let result = tool.execute(json!({"query": "parse"})).await.unwrap();
        assert_eq!(result.data["count"], json!(1));
        assert_eq!(result.data["entries"][0]["path"], json!("src/lib.rs"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_deadline() {
        let tool = LookupContext::new(Some(Arc::new(SlowStore)));
        let err = tool.execute(json!({"query": "parse"})).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_lookup_requires_some_filter() {
        let tool = LookupContext::new(Some(Arc::new(FastStore)));
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(err.to_string().contains("query, path, or symbol"));
    }

    #[tokio::test]
    async fn test_missing_collaborators() {
        let err = LookupContext::new(None)
            .execute(json!({"query": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("code index"));

        let err = SemanticSearch::new(None)
            .execute(json!({"query": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("embeddings searcher"));
    }
}
