//! Browser session tools
//!
//! Thin adapters over an injected [`BrowserManager`]. The manager itself is
//! environment-configured (BROWSERD_* variables) and constructed lazily by
//! the host on first use; [`runtime_config`] reads those defaults exactly
//! once per process. `browser_stream` bounds event collection by both count
//! and duration.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{int_param, required_str, string_param};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool};

const DEFAULT_STREAM_DURATION_MS: i64 = 2000;
const DEFAULT_STREAM_MAX_EVENTS: i64 = 100;

/// Environment-derived defaults for the browser runtime.
#[derive(Debug, Clone)]
pub struct BrowserRuntimeConfig {
    pub browserd_path: String,
    pub socket_dir: String,
    pub frame_rate: u32,
    pub connect_timeout: Duration,
}

/// Read the BROWSERD_* environment once; later changes are not observed.
pub fn runtime_config() -> &'static BrowserRuntimeConfig {
    static CONFIG: OnceLock<BrowserRuntimeConfig> = OnceLock::new();
    CONFIG.get_or_init(|| BrowserRuntimeConfig {
        browserd_path: std::env::var("BROWSERD_PATH").unwrap_or_else(|_| "browserd".into()),
        socket_dir: std::env::var("BROWSERD_SOCKET_DIR")
            .unwrap_or_else(|_| std::env::temp_dir().join("browserd").display().to_string()),
        frame_rate: std::env::var("BROWSERD_FRAME_RATE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5),
        connect_timeout: std::env::var("BROWSERD_CONNECT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10)),
    })
}

/// Injected browser session surface.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> anyhow::Result<()>;
    /// Page snapshot: url, title, and whatever the runtime exposes.
    async fn observe(&self) -> anyhow::Result<Value>;
    /// Perform one action (click, type, scroll, ...) described as JSON.
    async fn act(&self, action: &Value) -> anyhow::Result<Value>;
    /// Next queued event, or None when the queue is empty right now.
    async fn next_event(&self) -> anyhow::Result<Option<Value>>;
    async fn clipboard(&self, op: &str, text: Option<&str>) -> anyhow::Result<Value>;
}

/// Injected browser manager surface.
#[async_trait]
pub trait BrowserManager: Send + Sync {
    async fn start_session(
        &self,
        session_id: &str,
        url: Option<&str>,
    ) -> anyhow::Result<Arc<dyn BrowserSession>>;
    async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<Arc<dyn BrowserSession>>>;
    async fn close_session(&self, session_id: &str) -> anyhow::Result<()>;
}

fn manager_of(
    manager: &Option<Arc<dyn BrowserManager>>,
) -> Result<&Arc<dyn BrowserManager>, ToolError> {
    manager
        .as_ref()
        .ok_or_else(|| ToolError::DependencyAbsent("browser manager".into()))
}

async fn session_of(
    manager: &Arc<dyn BrowserManager>,
    session_id: &str,
) -> Result<Arc<dyn BrowserSession>, ToolError> {
    manager
        .get_session(session_id)
        .await
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
        .ok_or_else(|| ToolError::NotFound(format!("browser session not found: {}", session_id)))
}

macro_rules! browser_tool {
    ($name:ident) => {
        pub struct $name {
            manager: Option<Arc<dyn BrowserManager>>,
        }

        impl $name {
            pub fn new(manager: Option<Arc<dyn BrowserManager>>) -> Self {
                Self { manager }
            }
        }
    };
}

browser_tool!(BrowserStart);
browser_tool!(BrowserNavigate);
browser_tool!(BrowserObserve);
browser_tool!(BrowserStream);
browser_tool!(BrowserAct);
browser_tool!(BrowserClose);
browser_tool!(BrowserClipboard);

impl Tool for BrowserStart {
    fn name(&self) -> &str {
        "browser_start"
    }

    fn description(&self) -> &str {
        "Start a browser session, optionally opening a URL."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Identifier for the new session"
                },
                "url": {
                    "type": "string",
                    "description": "Initial URL to open"
                }
            },
            "required": ["session_id"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let manager = manager_of(&self.manager)?;
            let session_id = required_str(&params, "session_id")?;
            let url = string_param(&params, "url");
            let url_opt = if url.is_empty() { None } else { Some(url.as_str()) };

            manager
                .start_session(session_id, url_opt)
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("session start: {}", e)))?;
            Ok(ToolResult::ok()
                .with("session_id", session_id)
                .with("started", true))
        })
    }
}

impl Tool for BrowserNavigate {
    fn name(&self) -> &str {
        "browser_navigate"
    }

    fn description(&self) -> &str {
        "Navigate an existing browser session to a URL."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Session to drive"
                },
                "url": {
                    "type": "string",
                    "description": "URL to open"
                }
            },
            "required": ["session_id", "url"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let manager = manager_of(&self.manager)?;
            let session_id = required_str(&params, "session_id")?;
            let url = required_str(&params, "url")?;

            let session = session_of(manager, session_id).await?;
            session
                .navigate(url)
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("navigate: {}", e)))?;
            Ok(ToolResult::ok().with("session_id", session_id).with("url", url))
        })
    }
}

impl Tool for BrowserObserve {
    fn name(&self) -> &str {
        "browser_observe"
    }

    fn description(&self) -> &str {
        "Snapshot the current page state of a browser session."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Session to observe"
                }
            },
            "required": ["session_id"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let manager = manager_of(&self.manager)?;
            let session_id = required_str(&params, "session_id")?;
            let session = session_of(manager, session_id).await?;
            let snapshot = session
                .observe()
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("observe: {}", e)))?;
            Ok(ToolResult::ok()
                .with("session_id", session_id)
                .with("snapshot", snapshot))
        })
    }
}

impl Tool for BrowserStream {
    fn name(&self) -> &str {
        "browser_stream"
    }

    fn description(&self) -> &str {
        "Collect page events from a session, bounded by duration_ms and \
         max_events."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Session to stream from"
                },
                "duration_ms": {
                    "type": "integer",
                    "description": "Collection window in milliseconds (default 2000)",
                    "default": 2000
                },
                "max_events": {
                    "type": "integer",
                    "description": "Stop after this many events (default 100)",
                    "default": 100
                }
            },
            "required": ["session_id"]
        })
    }

    fn execute_with_context(
        &self,
        ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let manager = manager_of(&self.manager)?;
            let session_id = required_str(&params, "session_id")?;
            let duration_ms =
                int_param(&params, "duration_ms", DEFAULT_STREAM_DURATION_MS).clamp(1, 600_000);
            let max_events =
                int_param(&params, "max_events", DEFAULT_STREAM_MAX_EVENTS).clamp(1, 10_000) as usize;

            let session = session_of(manager, session_id).await?;
            let window = Duration::from_millis(duration_ms as u64);
            let deadline = match ctx.deadline() {
                Some(at) => at.min(Instant::now() + window),
                None => Instant::now() + window,
            };

            let mut events: Vec<Value> = Vec::new();
            while events.len() < max_events {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match tokio::time::timeout(remaining, session.next_event()).await {
                    Err(_) => break,
                    Ok(Err(e)) => {
                        return Err(ToolError::ExecutionFailed(format!("event stream: {}", e)))
                    }
                    Ok(Ok(None)) => {
                        // Queue is dry; poll again shortly within the window.
                        tokio::time::sleep(Duration::from_millis(20).min(remaining)).await;
                    }
                    Ok(Ok(Some(event))) => events.push(event),
                }
            }

            Ok(ToolResult::ok()
                .with("session_id", session_id)
                .with("count", events.len() as i64)
                .with("events", events))
        })
    }
}

impl Tool for BrowserAct {
    fn name(&self) -> &str {
        "browser_act"
    }

    fn description(&self) -> &str {
        "Perform one action (click, type, scroll, ...) in a browser session."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Session to drive"
                },
                "action": {
                    "type": "object",
                    "description": "Action payload understood by the browser runtime"
                }
            },
            "required": ["session_id", "action"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let manager = manager_of(&self.manager)?;
            let session_id = required_str(&params, "session_id")?;
            let action = params
                .get("action")
                .filter(|v| v.is_object())
                .cloned()
                .ok_or_else(|| ToolError::InvalidParams("action is required".into()))?;

            let session = session_of(manager, session_id).await?;
            let outcome = session
                .act(&action)
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("act: {}", e)))?;
            Ok(ToolResult::ok()
                .with("session_id", session_id)
                .with("outcome", outcome))
        })
    }
}

impl Tool for BrowserClose {
    fn name(&self) -> &str {
        "browser_close"
    }

    fn description(&self) -> &str {
        "Close a browser session and release its resources."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Session to close"
                }
            },
            "required": ["session_id"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let manager = manager_of(&self.manager)?;
            let session_id = required_str(&params, "session_id")?;
            manager
                .close_session(session_id)
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("close: {}", e)))?;
            Ok(ToolResult::ok()
                .with("session_id", session_id)
                .with("closed", true))
        })
    }
}

impl Tool for BrowserClipboard {
    fn name(&self) -> &str {
        "browser_clipboard"
    }

    fn description(&self) -> &str {
        "Read or write the clipboard within a browser session."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Session to address"
                },
                "op": {
                    "type": "string",
                    "description": "Clipboard operation",
                    "enum": ["read", "write"]
                },
                "text": {
                    "type": "string",
                    "description": "Text to write (write op)"
                }
            },
            "required": ["session_id", "op"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let manager = manager_of(&self.manager)?;
            let session_id = required_str(&params, "session_id")?;
            let op = required_str(&params, "op")?;
            if op != "read" && op != "write" {
                return Err(ToolError::InvalidParams(format!("unknown op: {}", op)));
            }
            let text = string_param(&params, "text");
            if op == "write" && text.is_empty() {
                return Err(ToolError::InvalidParams("text is required".into()));
            }

            let session = session_of(manager, session_id).await?;
            let outcome = session
                .clipboard(op, if text.is_empty() { None } else { Some(&text) })
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("clipboard: {}", e)))?;
            Ok(ToolResult::ok()
                .with("session_id", session_id)
                .with("outcome", outcome))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct FakeSession {
        events: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn navigate(&self, _url: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn observe(&self) -> anyhow::Result<Value> {
            Ok(json!({"url": "https://example.com", "title": "Example"}))
        }

        async fn act(&self, action: &Value) -> anyhow::Result<Value> {
            Ok(json!({"performed": action["kind"]}))
        }

        async fn next_event(&self) -> anyhow::Result<Option<Value>> {
            Ok(self.events.lock().pop())
        }

        async fn clipboard(&self, op: &str, text: Option<&str>) -> anyhow::Result<Value> {
            Ok(json!({"op": op, "text": text}))
        }
    }

    #[derive(Default)]
    struct FakeManager {
        sessions: Mutex<HashMap<String, Arc<FakeSession>>>,
    }

    #[async_trait]
    impl BrowserManager for FakeManager {
        async fn start_session(
            &self,
            session_id: &str,
            _url: Option<&str>,
        ) -> anyhow::Result<Arc<dyn BrowserSession>> {
            let session = Arc::new(FakeSession {
                events: Mutex::new(vec![json!({"n": 3}), json!({"n": 2}), json!({"n": 1})]),
            });
            self.sessions
                .lock()
                .insert(session_id.to_string(), session.clone());
            Ok(session)
        }

        async fn get_session(
            &self,
            session_id: &str,
        ) -> anyhow::Result<Option<Arc<dyn BrowserSession>>> {
            Ok(self
                .sessions
                .lock()
                .get(session_id)
                .cloned()
                .map(|s| s as Arc<dyn BrowserSession>))
        }

        async fn close_session(&self, session_id: &str) -> anyhow::Result<()> {
            self.sessions.lock().remove(session_id);
            Ok(())
        }
    }

    fn manager() -> Arc<dyn BrowserManager> {
        Arc::new(FakeManager::default())
    }

    #[tokio::test]
    async fn test_start_observe_close() {
        let manager = manager();
        BrowserStart::new(Some(manager.clone()))
            .execute(json!({"session_id": "s1"}))
            .await
            .unwrap();

        let observed = BrowserObserve::new(Some(manager.clone()))
            .execute(json!({"session_id": "s1"}))
            .await
            .unwrap();
        assert_eq!(observed.data["snapshot"]["title"], json!("Example"));

        BrowserClose::new(Some(manager.clone()))
            .execute(json!({"session_id": "s1"}))
            .await
            .unwrap();
        let err = BrowserObserve::new(Some(manager))
            .execute(json!({"session_id": "s1"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("session not found"));
    }

    #[tokio::test]
    async fn test_stream_bounded_by_max_events() {
        let manager = manager();
        BrowserStart::new(Some(manager.clone()))
            .execute(json!({"session_id": "s1"}))
            .await
            .unwrap();

        let result = BrowserStream::new(Some(manager))
            .execute(json!({"session_id": "s1", "max_events": 2, "duration_ms": 5000}))
            .await
            .unwrap();
        assert_eq!(result.data["count"], json!(2));
    }

    #[tokio::test]
    async fn test_stream_bounded_by_duration() {
        let manager = manager();
        BrowserStart::new(Some(manager.clone()))
            .execute(json!({"session_id": "s1"}))
            .await
            .unwrap();

        // Drain all three events, then the window closes on an empty queue.
        let result = BrowserStream::new(Some(manager))
            .execute(json!({"session_id": "s1", "duration_ms": 100}))
            .await
            .unwrap();
        assert_eq!(result.data["count"], json!(3));
    }

    #[tokio::test]
    async fn test_act_requires_object() {
        let manager = manager();
        BrowserStart::new(Some(manager.clone()))
            .execute(json!({"session_id": "s1"}))
            .await
            .unwrap();
        let err = BrowserAct::new(Some(manager))
            .execute(json!({"session_id": "s1", "action": "click"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("action is required"));
    }

    #[tokio::test]
    async fn test_missing_manager() {
        let err = BrowserStart::new(None)
            .execute(json!({"session_id": "s1"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("browser manager"));
    }
}
