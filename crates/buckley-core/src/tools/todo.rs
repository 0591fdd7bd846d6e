//! Todo tool
//!
//! Multi-action task tracking over an injected [`TodoStore`]. The planning
//! actions (brainstorm, refine) additionally need an injected
//! [`PlanningClient`]; their LLM output is expected as JSON, possibly
//! wrapped in a triple-backtick fence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{required_str, string_param};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool};

const BRAINSTORM_TEMPERATURE: f32 = 0.7;
const REFINE_TEMPERATURE: f32 = 0.3;

/// Status of a todo item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// A todo item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(rename = "activeForm", default)]
    pub active_form: String,
}

/// Injected persistence for per-session todo lists.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn list(&self, session_id: &str) -> anyhow::Result<Vec<TodoItem>>;
    async fn replace(&self, session_id: &str, todos: Vec<TodoItem>) -> anyhow::Result<()>;
    async fn clear(&self, session_id: &str) -> anyhow::Result<()>;
}

/// Injected LLM used by the planning actions.
#[async_trait]
pub trait PlanningClient: Send + Sync {
    async fn chat_completion(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> anyhow::Result<String>;
}

/// Strip exactly one wrapping triple-backtick fence (with or without a
/// `json` tag) and trim whitespace.
pub fn extract_json(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    else {
        return trimmed.to_string();
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed.to_string();
    };
    inner.trim().to_string()
}

/// Present-participle form of an imperative phrase: "Run tests" becomes
/// "Running tests". Rules of thumb only.
pub fn conjugate_active_form(content: &str) -> String {
    let mut words = content.split_whitespace();
    let Some(verb) = words.next() else {
        return content.to_string();
    };
    let rest: Vec<&str> = words.collect();

    let lower = verb.to_lowercase();
    let participle = if let Some(stem) = lower.strip_suffix("ie") {
        format!("{}ying", stem)
    } else if lower.ends_with('e') && !lower.ends_with("ee") && lower.len() > 1 {
        format!("{}ing", &lower[..lower.len() - 1])
    } else if should_double_final(&lower) {
        format!("{}{}ing", lower, lower.chars().last().unwrap())
    } else {
        format!("{}ing", lower)
    };

    let participle = if verb.chars().next().is_some_and(|c| c.is_uppercase()) {
        let mut chars = participle.chars();
        chars
            .next()
            .map(|c| c.to_uppercase().collect::<String>() + chars.as_str())
            .unwrap_or(participle)
    } else {
        participle
    };

    if rest.is_empty() {
        participle
    } else {
        format!("{} {}", participle, rest.join(" "))
    }
}

/// Single-syllable CVC check for consonant doubling (run -> running).
fn should_double_final(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    if chars.len() < 3 {
        return false;
    }
    let is_vowel = |c: char| "aeiou".contains(c);
    let n = chars.len();
    let last = chars[n - 1];
    !is_vowel(last)
        && !"wxy".contains(last)
        && is_vowel(chars[n - 2])
        && !is_vowel(chars[n - 3])
}

fn parse_status(raw: &str) -> Result<TodoStatus, ToolError> {
    match raw {
        "" | "pending" => Ok(TodoStatus::Pending),
        "in_progress" => Ok(TodoStatus::InProgress),
        "completed" => Ok(TodoStatus::Completed),
        other => Err(ToolError::InvalidParams(format!(
            "invalid status: {}. Must be pending, in_progress, or completed",
            other
        ))),
    }
}

fn todos_to_json(todos: &[TodoItem]) -> Value {
    serde_json::to_value(todos).unwrap_or(Value::Array(Vec::new()))
}

/// Tool managing per-session todo lists with LLM planning actions
pub struct TodoTool {
    store: Option<Arc<dyn TodoStore>>,
    planner: Option<Arc<dyn PlanningClient>>,
}

impl TodoTool {
    pub fn new(store: Option<Arc<dyn TodoStore>>, planner: Option<Arc<dyn PlanningClient>>) -> Self {
        Self { store, planner }
    }

    fn store(&self) -> Result<&Arc<dyn TodoStore>, ToolError> {
        self.store
            .as_ref()
            .ok_or_else(|| ToolError::DependencyAbsent("todo store".into()))
    }

    fn planner(&self) -> Result<&Arc<dyn PlanningClient>, ToolError> {
        self.planner
            .as_ref()
            .ok_or_else(|| ToolError::DependencyAbsent("planning client".into()))
    }

    fn parse_items(raw: &Value) -> Result<Vec<TodoItem>, ToolError> {
        let entries = raw
            .as_array()
            .ok_or_else(|| ToolError::InvalidParams("todos array is required".into()))?;
        let mut todos = Vec::with_capacity(entries.len());
        for entry in entries {
            let content = entry["content"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidParams("todo.content is required".into()))?
                .to_string();
            if content.is_empty() {
                return Err(ToolError::InvalidParams("todo.content is required".into()));
            }
            let status = parse_status(entry["status"].as_str().unwrap_or(""))?;
            let active_form = entry["activeForm"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| conjugate_active_form(&content));
            todos.push(TodoItem {
                content,
                status,
                active_form,
            });
        }
        let in_progress = todos
            .iter()
            .filter(|t| t.status == TodoStatus::InProgress)
            .count();
        if in_progress > 1 {
            return Err(ToolError::InvalidParams(
                "only one todo may be in_progress at a time".into(),
            ));
        }
        Ok(todos)
    }

    async fn create(&self, session_id: &str, params: &Value) -> Result<ToolResult, ToolError> {
        let todos = Self::parse_items(&params["todos"])?;
        self.store()?
            .replace(session_id, todos.clone())
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("create failed at save: {}", e)))?;
        Ok(ToolResult::ok()
            .with("todos", todos_to_json(&todos))
            .with("count", todos.len() as i64)
            .with_display("summary", format!("{} todo(s) recorded", todos.len()))
            .abridged())
    }

    async fn list(&self, session_id: &str) -> Result<ToolResult, ToolError> {
        let todos = self
            .store()?
            .list(session_id)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("list failed at load: {}", e)))?;
        let completed = todos
            .iter()
            .filter(|t| t.status == TodoStatus::Completed)
            .count();
        Ok(ToolResult::ok()
            .with("todos", todos_to_json(&todos))
            .with("count", todos.len() as i64)
            .with("completed", completed as i64)
            .with_display(
                "summary",
                format!("{} todo(s), {} completed", todos.len(), completed),
            )
            .abridged())
    }

    async fn update(&self, session_id: &str, params: &Value) -> Result<ToolResult, ToolError> {
        let index = crate::params::int_param(params, "index", -1);
        let status = parse_status(&string_param(params, "status"))?;

        let mut todos = self
            .store()?
            .list(session_id)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("update failed at load: {}", e)))?;
        if index < 0 || index as usize >= todos.len() {
            return Err(ToolError::InvalidParams(format!(
                "index {} is out of range ({} todos)",
                index,
                todos.len()
            )));
        }
        if status == TodoStatus::InProgress {
            for todo in todos.iter_mut() {
                if todo.status == TodoStatus::InProgress {
                    todo.status = TodoStatus::Pending;
                }
            }
        }
        todos[index as usize].status = status;
        self.store()?
            .replace(session_id, todos.clone())
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("update failed at save: {}", e)))?;
        Ok(ToolResult::ok()
            .with("todos", todos_to_json(&todos))
            .with_display("summary", format!("todo {} updated", index))
            .abridged())
    }

    /// Replace the whole list with a new batch. The existing todos are
    /// cleared before the batch is parse-validated, so a malformed batch
    /// leaves the session empty.
    async fn commit(&self, session_id: &str, params: &Value) -> Result<ToolResult, ToolError> {
        self.store()?
            .clear(session_id)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("commit failed at clear: {}", e)))?;

        let raw = &params["todos"];
        let parsed: Value = if let Some(text) = raw.as_str() {
            serde_json::from_str(&extract_json(text)).map_err(|e| {
                ToolError::ParseError(format!("commit failed at parse: {}", e))
            })?
        } else {
            raw.clone()
        };
        let todos = Self::parse_items(&parsed)
            .map_err(|e| ToolError::InvalidParams(format!("commit failed at validate: {}", e)))?;

        self.store()?
            .replace(session_id, todos.clone())
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("commit failed at save: {}", e)))?;
        Ok(ToolResult::ok()
            .with("todos", todos_to_json(&todos))
            .with("count", todos.len() as i64)
            .with_display("summary", format!("committed {} todo(s)", todos.len()))
            .abridged())
    }

    async fn brainstorm(&self, params: &Value) -> Result<ToolResult, ToolError> {
        let task = required_str(params, "task")?;
        let system = "You are a planning assistant. Respond with JSON only: \
                      {\"approaches\": [{\"title\": string, \"description\": string}], \
                      \"recommended\": integer index}";
        let raw = self
            .planner()?
            .chat_completion(system, task, BRAINSTORM_TEMPERATURE)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("brainstorm failed: {}", e)))?;

        let parsed: Value = serde_json::from_str(&extract_json(&raw))
            .map_err(|e| ToolError::ParseError(format!("brainstorm response: {}", e)))?;
        let approaches = parsed["approaches"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        if approaches.len() < 2 {
            return Err(ToolError::ParseError(format!(
                "brainstorm produced {} approach(es); at least 2 required",
                approaches.len()
            )));
        }
        let recommended = parsed["recommended"]
            .as_i64()
            .unwrap_or(0)
            .clamp(0, approaches.len() as i64 - 1);

        Ok(ToolResult::ok()
            .with("approaches", approaches.clone())
            .with("recommended", recommended)
            .with_display(
                "summary",
                format!("{} approaches, #{} recommended", approaches.len(), recommended),
            )
            .abridged())
    }

    async fn refine(&self, session_id: &str, params: &Value) -> Result<ToolResult, ToolError> {
        let task = required_str(params, "task")?;
        let system = "You are a planning assistant. Break the task into todos. \
                      Respond with JSON only: [{\"content\": string, \
                      \"status\": \"pending\", \"activeForm\": string}]";
        let raw = self
            .planner()?
            .chat_completion(system, task, REFINE_TEMPERATURE)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("refine failed: {}", e)))?;

        let parsed: Value = serde_json::from_str(&extract_json(&raw))
            .map_err(|e| ToolError::ParseError(format!("refine response: {}", e)))?;
        let todos = Self::parse_items(&parsed)?;
        if todos.is_empty() {
            return Err(ToolError::ParseError(
                "refine produced no todos; at least 1 required".into(),
            ));
        }

        self.store()?
            .replace(session_id, todos.clone())
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("refine failed at save: {}", e)))?;
        Ok(ToolResult::ok()
            .with("todos", todos_to_json(&todos))
            .with("count", todos.len() as i64)
            .with_display("summary", format!("refined into {} todo(s)", todos.len()))
            .abridged())
    }
}

impl Tool for TodoTool {
    fn name(&self) -> &str {
        "todo"
    }

    fn description(&self) -> &str {
        "Manage the session's todo list. Actions: create, list, update, \
         commit, brainstorm, refine. Planning actions use the configured \
         LLM."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "Todo action to perform",
                    "enum": ["create", "list", "update", "commit", "brainstorm", "refine"]
                },
                "session_id": {
                    "type": "string",
                    "description": "Session the todo list belongs to"
                },
                "todos": {
                    "type": "array",
                    "description": "Todo items for create/commit",
                    "items": {
                        "type": "object",
                        "properties": {
                            "content": {"type": "string", "description": "Imperative description"},
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"],
                                "description": "Current status"
                            },
                            "activeForm": {
                                "type": "string",
                                "description": "Present continuous form shown while running"
                            }
                        }
                    }
                },
                "index": {
                    "type": "integer",
                    "description": "Todo index for update"
                },
                "status": {
                    "type": "string",
                    "description": "New status for update"
                },
                "task": {
                    "type": "string",
                    "description": "Task description for brainstorm/refine"
                }
            },
            "required": ["action", "session_id"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let action = required_str(&params, "action")?;
            let session_id = required_str(&params, "session_id")?;

            match action {
                "create" => self.create(session_id, &params).await,
                "list" => self.list(session_id).await,
                "update" => self.update(session_id, &params).await,
                "commit" => self.commit(session_id, &params).await,
                "brainstorm" => self.brainstorm(&params).await,
                "refine" => self.refine(session_id, &params).await,
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
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        sessions: Mutex<HashMap<String, Vec<TodoItem>>>,
    }

    #[async_trait]
    impl TodoStore for MemoryStore {
        async fn list(&self, session_id: &str) -> anyhow::Result<Vec<TodoItem>> {
            Ok(self
                .sessions
                .lock()
                .get(session_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn replace(&self, session_id: &str, todos: Vec<TodoItem>) -> anyhow::Result<()> {
            self.sessions.lock().insert(session_id.to_string(), todos);
            Ok(())
        }

        async fn clear(&self, session_id: &str) -> anyhow::Result<()> {
            self.sessions.lock().remove(session_id);
            Ok(())
        }
    }

    struct CannedPlanner {
        response: String,
    }

    #[async_trait]
    impl PlanningClient for CannedPlanner {
        async fn chat_completion(
            &self,
            _system: &str,
            _user: &str,
            _temperature: f32,
        ) -> anyhow::Result<String> {
            Ok(self.response.clone())
        }
    }

    #[test]
    fn test_extract_json_fences() {
        assert_eq!(extract_json("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("```\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(extract_json("  {\"a\": 1}  "), "{\"a\": 1}");
        // Unterminated fence is left as-is.
        assert_eq!(extract_json("```json\n{\"a\": 1}"), "```json\n{\"a\": 1}");
    }

    #[test]
    fn test_conjugate_active_form() {
        assert_eq!(conjugate_active_form("Run tests"), "Running tests");
        assert_eq!(conjugate_active_form("Write docs"), "Writing docs");
        assert_eq!(conjugate_active_form("Fix the bug"), "Fixing the bug");
        assert_eq!(conjugate_active_form("deploy service"), "deploying service");
        assert_eq!(conjugate_active_form("tie loose ends"), "tying loose ends");
        assert_eq!(conjugate_active_form("see results"), "seeing results");
    }

    fn tool_with(store: Arc<MemoryStore>, planner: Option<Arc<dyn PlanningClient>>) -> TodoTool {
        TodoTool::new(Some(store), planner)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let store = Arc::new(MemoryStore::default());
        let tool = tool_with(store.clone(), None);

        let result = tool
            .execute(json!({
                "action": "create",
                "session_id": "s1",
                "todos": [
                    {"content": "Run tests", "status": "in_progress"},
                    {"content": "Write docs"}
                ]
            }))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data["count"], json!(2));
        // Missing activeForm gets conjugated.
        assert_eq!(result.data["todos"][1]["activeForm"], json!("Writing docs"));

        let listed = tool
            .execute(json!({"action": "list", "session_id": "s1"}))
            .await
            .unwrap();
        assert_eq!(listed.data["count"], json!(2));
    }

    #[tokio::test]
    async fn test_single_in_progress_rule() {
        let store = Arc::new(MemoryStore::default());
        let tool = tool_with(store, None);
        let err = tool
            .execute(json!({
                "action": "create",
                "session_id": "s1",
                "todos": [
                    {"content": "A", "status": "in_progress"},
                    {"content": "B", "status": "in_progress"}
                ]
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("one todo"));
    }

    #[tokio::test]
    async fn test_commit_clears_before_parse() {
        let store = Arc::new(MemoryStore::default());
        let tool = tool_with(store.clone(), None);
        tool.execute(json!({
            "action": "create",
            "session_id": "s1",
            "todos": [{"content": "Keep me"}]
        }))
        .await
        .unwrap();

        // A malformed batch fails after the clear, leaving the session empty.
        let err = tool
            .execute(json!({
                "action": "commit",
                "session_id": "s1",
                "todos": "not json at all"
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("commit failed at parse"));
        assert!(store.list("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_accepts_fenced_json() {
        let store = Arc::new(MemoryStore::default());
        let tool = tool_with(store.clone(), None);
        let result = tool
            .execute(json!({
                "action": "commit",
                "session_id": "s1",
                "todos": "```json\n[{\"content\": \"Ship it\"}]\n```"
            }))
            .await
            .unwrap();
        assert_eq!(result.data["count"], json!(1));
        assert_eq!(store.list("s1").await.unwrap()[0].content, "Ship it");
    }

    #[tokio::test]
    async fn test_brainstorm_requires_two_approaches_and_clamps() {
        let store = Arc::new(MemoryStore::default());
        let planner: Arc<dyn PlanningClient> = Arc::new(CannedPlanner {
            response: "```json\n{\"approaches\": [{\"title\": \"A\"}, {\"title\": \"B\"}], \"recommended\": 9}\n```".into(),
        });
        let tool = tool_with(store, Some(planner));
        let result = tool
            .execute(json!({"action": "brainstorm", "session_id": "s1", "task": "do a thing"}))
            .await
            .unwrap();
        assert_eq!(result.data["recommended"], json!(1));

        let sparse: Arc<dyn PlanningClient> = Arc::new(CannedPlanner {
            response: "{\"approaches\": [{\"title\": \"only\"}], \"recommended\": 0}".into(),
        });
        let tool = tool_with(Arc::new(MemoryStore::default()), Some(sparse));
        let err = tool
            .execute(json!({"action": "brainstorm", "session_id": "s1", "task": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }

    #[tokio::test]
    async fn test_refine_fills_defaults() {
        let store = Arc::new(MemoryStore::default());
        let planner: Arc<dyn PlanningClient> = Arc::new(CannedPlanner {
            response: "[{\"content\": \"Check logs\"}]".into(),
        });
        let tool = tool_with(store.clone(), Some(planner));
        let result = tool
            .execute(json!({"action": "refine", "session_id": "s1", "task": "investigate"}))
            .await
            .unwrap();
        assert_eq!(result.data["todos"][0]["status"], json!("pending"));
        assert_eq!(result.data["todos"][0]["activeForm"], json!("Checking logs"));
    }

    #[tokio::test]
    async fn test_planning_requires_client() {
        let tool = tool_with(Arc::new(MemoryStore::default()), None);
        let err = tool
            .execute(json!({"action": "brainstorm", "session_id": "s1", "task": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("planning client"));
    }

    #[tokio::test]
    async fn test_store_required() {
        let tool = TodoTool::new(None, None);
        let err = tool
            .execute(json!({"action": "list", "session_id": "s1"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("todo store"));
    }
}
