//! Symbol search tools
//!
//! Index-first: when a code index collaborator is injected its answer wins;
//! otherwise these fall back to ripgrep with language-aware definition
//! regexes. The regexes are best effort, not semantic analysis.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ToolError;
use crate::exec::{look_path, run_program, ExecContext};
use crate::params::required_str;
use crate::result::{
    abridge_list, ToolResult, SEARCH_DISPLAY_MATCHES, SYMBOL_DISPLAY_MATCHES,
};
use crate::tools::{BoxFuture, Tool, ToolOptions};

use super::text::parse_match_line;

/// One symbol location.
#[derive(Debug, Clone)]
pub struct SymbolHit {
    pub path: String,
    pub line: u64,
    pub snippet: String,
}

impl SymbolHit {
    fn to_json(&self) -> Value {
        json!({
            "path": self.path,
            "line": self.line,
            "snippet": self.snippet,
        })
    }
}

/// Injected code index collaborator.
#[async_trait]
pub trait CodeIndex: Send + Sync {
    async fn find_symbol(&self, name: &str) -> anyhow::Result<Vec<SymbolHit>>;
    async fn find_references(&self, name: &str) -> anyhow::Result<Vec<SymbolHit>>;
    async fn function_signature(&self, name: &str) -> anyhow::Result<Option<SymbolHit>>;
}

/// Definition-site pattern for `name` across the supported languages.
fn definition_pattern(name: &str) -> String {
    let escaped = regex::escape(name);
    format!(
        r"(?:fn|func|def|function|class|struct|enum|trait|interface|type|impl|const|var|let)\s+{}\b",
        escaped
    )
}

/// Word-bounded reference pattern for `name`.
fn reference_pattern(name: &str) -> String {
    format!(r"\b{}\b", regex::escape(name))
}

async fn ripgrep_hits(
    ctx: &ExecContext,
    options: &ToolOptions,
    pattern: &str,
) -> Result<Vec<SymbolHit>, ToolError> {
    if look_path("rg").is_none() {
        return Err(ToolError::Unavailable("rg".into()));
    }
    let target = if options.workdir.as_os_str().is_empty() {
        ".".to_string()
    } else {
        options.workdir.display().to_string()
    };
    let outcome = run_program(
        ctx,
        &options.exec_options(),
        "rg",
        &[
            "--line-number",
            "--column",
            "--no-heading",
            "--color",
            "never",
            "--",
            pattern,
            target.as_str(),
        ],
    )
    .await?;
    if outcome.exit_code > 1 {
        return Err(ToolError::ExecutionFailed(format!(
            "rg exited with {}: {}",
            outcome.exit_code,
            outcome.stderr.trim()
        )));
    }
    Ok(outcome
        .stdout
        .lines()
        .filter_map(|line| parse_match_line(line, true))
        .map(|m| SymbolHit {
            path: m.path,
            line: m.line,
            snippet: m.content.trim().to_string(),
        })
        .collect())
}

fn hits_result(key: &str, name: &str, hits: Vec<SymbolHit>, display_cap: usize) -> ToolResult {
    let values: Vec<Value> = hits.iter().map(SymbolHit::to_json).collect();
    let mut result = ToolResult::ok()
        .with("symbol", name)
        .with("count", values.len() as i64)
        .with(key, values.clone());
    abridge_list(&mut result, key, &values, display_cap, key);
    result
}

/// Tool locating symbol definitions
pub struct FindSymbol {
    options: ToolOptions,
    index: Option<Arc<dyn CodeIndex>>,
}

impl FindSymbol {
    pub fn new(options: ToolOptions, index: Option<Arc<dyn CodeIndex>>) -> Self {
        Self { options, index }
    }
}

impl Tool for FindSymbol {
    fn name(&self) -> &str {
        "find_symbol"
    }

    fn description(&self) -> &str {
        "Find where a symbol is defined. Uses the code index when available, \
         falling back to a ripgrep definition-pattern search."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Symbol name to locate"
                }
            },
            "required": ["symbol"]
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let symbol = required_str(&params, "symbol")?;

            if let Some(index) = &self.index
                && let Ok(hits) = index.find_symbol(symbol).await
                && !hits.is_empty()
            {
                return Ok(hits_result("definitions", symbol, hits, SYMBOL_DISPLAY_MATCHES));
            }

            let hits = ripgrep_hits(&ctx, &self.options, &definition_pattern(symbol)).await?;
            Ok(hits_result("definitions", symbol, hits, SYMBOL_DISPLAY_MATCHES))
        })
    }
}

/// Tool locating symbol references
pub struct FindReferences {
    options: ToolOptions,
    index: Option<Arc<dyn CodeIndex>>,
}

impl FindReferences {
    pub fn new(options: ToolOptions, index: Option<Arc<dyn CodeIndex>>) -> Self {
        Self { options, index }
    }
}

impl Tool for FindReferences {
    fn name(&self) -> &str {
        "find_references"
    }

    fn description(&self) -> &str {
        "Find every reference to a symbol (word-bounded), index-first with a \
         ripgrep fallback."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Symbol name to look up"
                }
            },
            "required": ["symbol"]
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let symbol = required_str(&params, "symbol")?;

            if let Some(index) = &self.index
                && let Ok(hits) = index.find_references(symbol).await
                && !hits.is_empty()
            {
                return Ok(hits_result("references", symbol, hits, SEARCH_DISPLAY_MATCHES));
            }

            let hits = ripgrep_hits(&ctx, &self.options, &reference_pattern(symbol)).await?;
            Ok(hits_result("references", symbol, hits, SEARCH_DISPLAY_MATCHES))
        })
    }
}

/// Tool extracting a function's signature
pub struct GetFunctionSignature {
    options: ToolOptions,
    index: Option<Arc<dyn CodeIndex>>,
}

impl GetFunctionSignature {
    pub fn new(options: ToolOptions, index: Option<Arc<dyn CodeIndex>>) -> Self {
        Self { options, index }
    }
}

impl Tool for GetFunctionSignature {
    fn name(&self) -> &str {
        "get_function_signature"
    }

    fn description(&self) -> &str {
        "Get the signature line of a function definition."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "function": {
                    "type": "string",
                    "description": "Function name"
                }
            },
            "required": ["function"]
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let function = required_str(&params, "function")?;

            if let Some(index) = &self.index
                && let Ok(Some(hit)) = index.function_signature(function).await
            {
                return Ok(ToolResult::ok()
                    .with("function", function)
                    .with("path", hit.path)
                    .with("line", hit.line)
                    .with("signature", hit.snippet));
            }

            let escaped = regex::escape(function);
            let pattern = format!(r"(?:fn|func|def|function)\s+{}\s*\(", escaped);
            let hits = ripgrep_hits(&ctx, &self.options, &pattern).await?;
            let Some(hit) = hits.first() else {
                return Err(ToolError::NotFound(format!(
                    "function not found: {}",
                    function
                )));
            };
            Ok(ToolResult::ok()
                .with("function", function)
                .with("path", hit.path.clone())
                .with("line", hit.line)
                .with("signature", hit.snippet.clone()))
        })
    }
}
