//! Tool result envelope, pooling, and abridging
//!
//! Every tool invocation yields exactly one [`ToolResult`]. `data` always
//! carries the full-fidelity payload; when output is large the tool sets
//! `should_abridge` and mirrors a compact summary into `display_data` for
//! the host UI. Envelopes are recycled through a freelist to cut allocation
//! churn on busy dispatch loops.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::diff::DiffPreview;
use crate::error::ToolError;
use crate::tools::BoxFuture;

/// Display cap for file reads.
pub const READ_DISPLAY_LINES: usize = 100;
/// Display cap for text-search matches.
pub const SEARCH_DISPLAY_MATCHES: usize = 50;
/// Display cap for symbol/rename hits.
pub const SYMBOL_DISPLAY_MATCHES: usize = 20;
/// Display cap for duplicate blocks.
pub const DUPLICATE_DISPLAY_BLOCKS: usize = 10;

/// Callback handed to the host alongside `needs_approval` results; invoked
/// with the user's decision to apply (or discard) the pending mutation.
pub type ApprovalFunc =
    Box<dyn FnOnce(bool) -> BoxFuture<'static, Result<ToolResult, ToolError>> + Send>;

/// The envelope returned by every tool execution.
#[derive(Default, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub data: HashMap<String, Value>,
    pub error: String,
    pub should_abridge: bool,
    pub display_data: HashMap<String, Value>,
    pub needs_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_preview: Option<DiffPreview>,
    #[serde(skip)]
    pub approval_func: Option<ApprovalFunc>,
}

impl std::fmt::Debug for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolResult")
            .field("success", &self.success)
            .field("data", &self.data)
            .field("error", &self.error)
            .field("should_abridge", &self.should_abridge)
            .field("display_data", &self.display_data)
            .field("needs_approval", &self.needs_approval)
            .field("diff_preview", &self.diff_preview)
            .field("approval_func", &self.approval_func.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl ToolResult {
    /// A fresh success envelope (from the pool).
    pub fn ok() -> Self {
        let mut result = acquire_result();
        result.success = true;
        result
    }

    /// A fresh failure envelope carrying `message`.
    pub fn failure(message: impl Into<String>) -> Self {
        let mut result = acquire_result();
        result.success = false;
        result.error = message.into();
        result
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_display(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.display_data.insert(key.into(), value.into());
        self
    }

    /// Mark the result as display-abridged.
    pub fn abridged(mut self) -> Self {
        self.should_abridge = true;
        self
    }

    /// Attach a pending mutation: diff preview plus the approval callback.
    /// The caller must not have written anything yet.
    pub fn pending_approval(mut self, preview: DiffPreview, apply: ApprovalFunc) -> Self {
        self.needs_approval = true;
        self.diff_preview = Some(preview);
        self.approval_func = Some(apply);
        self
    }

    /// Zero every field, keeping map capacity for reuse.
    fn reset(&mut self) {
        self.success = false;
        self.data.clear();
        self.error.clear();
        self.should_abridge = false;
        self.display_data.clear();
        self.needs_approval = false;
        self.diff_preview = None;
        self.approval_func = None;
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::failure(err.to_string())
    }
}

// Pool sizes are bounded; anything beyond the cap is dropped rather than
// retained, and oversized slices are never pooled.
const RESULT_POOL_CAP: usize = 64;
const SLICE_POOL_CAP: usize = 16;
const MAX_POOLED_SLICE_CAPACITY: usize = 1024;

static RESULT_POOL: Mutex<Vec<ToolResult>> = Mutex::new(Vec::new());
static SLICE_POOL: Mutex<Vec<Vec<ToolResult>>> = Mutex::new(Vec::new());

/// Take a zeroed envelope from the pool, or allocate one.
pub fn acquire_result() -> ToolResult {
    RESULT_POOL.lock().pop().unwrap_or_default()
}

/// Return an envelope to the pool after clearing it.
pub fn release_result(mut result: ToolResult) {
    result.reset();
    let mut pool = RESULT_POOL.lock();
    if pool.len() < RESULT_POOL_CAP {
        pool.push(result);
    }
}

/// Take an empty result slice from the slice pool.
pub fn acquire_result_slice() -> Vec<ToolResult> {
    SLICE_POOL.lock().pop().unwrap_or_default()
}

/// Return a slice to the pool; its elements go back to the result pool.
/// Slices with capacity above 1024 are dropped to avoid memory bloat.
pub fn release_result_slice(mut slice: Vec<ToolResult>) {
    for result in slice.drain(..) {
        release_result(result);
    }
    if slice.capacity() > MAX_POOLED_SLICE_CAPACITY {
        return;
    }
    let mut pool = SLICE_POOL.lock();
    if pool.len() < SLICE_POOL_CAP {
        pool.push(slice);
    }
}

// ============================================================================
// ABRIDGING
// ============================================================================

/// Abridge a large text payload: `data[key]` keeps the full content, while
/// `display_data[key]` holds the first `limit` lines plus an elision marker.
/// No-op when the content fits.
pub fn abridge_text(result: &mut ToolResult, key: &str, content: &str, limit: usize) {
    let total = content.lines().count();
    if total <= limit {
        return;
    }
    let shown: Vec<&str> = content.lines().take(limit).collect();
    let display = format!(
        "{}\n... ({} more lines, {} total)",
        shown.join("\n"),
        total - limit,
        total
    );
    result.should_abridge = true;
    result.display_data.insert(key.to_string(), display.into());
}

/// Abridge a large match list: `display_data[key]` holds the first `limit`
/// entries and `display_data.summary` states the true total.
pub fn abridge_list(result: &mut ToolResult, key: &str, items: &[Value], limit: usize, noun: &str) {
    if items.len() <= limit {
        return;
    }
    result.should_abridge = true;
    result
        .display_data
        .insert(key.to_string(), Value::Array(items[..limit].to_vec()));
    result.display_data.insert(
        "summary".to_string(),
        format!("showing first {} of {} {}", limit, items.len(), noun).into(),
    );
}

/// Mirror truncation flags from a captured output stream into the envelope.
pub fn mark_truncated(result: &mut ToolResult, stream: &str, truncated: bool) {
    let key = format!("{}_truncated", stream);
    result.data.insert(key.clone(), truncated.into());
    if truncated {
        result.should_abridge = true;
        result.display_data.insert(key, true.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_implies_empty_error() {
        let result = ToolResult::ok().with("x", 1);
        assert!(result.success);
        assert!(result.error.is_empty());
    }

    #[test]
    fn test_release_then_acquire_is_zeroed() {
        let mut result = ToolResult::ok().with("content", "abc").abridged();
        result.error = "not really".into();
        release_result(result);

        let reused = acquire_result();
        assert!(!reused.success);
        assert!(reused.error.is_empty());
        assert!(reused.data.is_empty());
        assert!(reused.display_data.is_empty());
        assert!(!reused.should_abridge);
        assert!(!reused.needs_approval);
        assert!(reused.diff_preview.is_none());
        assert!(reused.approval_func.is_none());
    }

    #[test]
    fn test_slice_pool_drops_oversized() {
        let slice = Vec::with_capacity(2048);
        release_result_slice(slice);
        // The pooled slice, if any, must not carry the oversized capacity.
        let reused = acquire_result_slice();
        assert!(reused.capacity() <= 1024);
    }

    #[test]
    fn test_abridge_text_marks_and_truncates() {
        let mut result = ToolResult::ok();
        let content = "abc\n".repeat(150);
        abridge_text(&mut result, "content", &content, 100);
        assert!(result.should_abridge);
        let display = result.display_data["content"].as_str().unwrap();
        assert!(display.ends_with("... (50 more lines, 150 total)"));
        assert_eq!(display.lines().count(), 101);
    }

    #[test]
    fn test_abridge_text_noop_when_small() {
        let mut result = ToolResult::ok();
        abridge_text(&mut result, "content", "one\ntwo", 100);
        assert!(!result.should_abridge);
        assert!(result.display_data.is_empty());
    }

    #[test]
    fn test_abridge_list() {
        let mut result = ToolResult::ok();
        let items: Vec<Value> = (0..75).map(|i| json!({"n": i})).collect();
        abridge_list(&mut result, "matches", &items, 50, "matches");
        assert!(result.should_abridge);
        assert_eq!(result.display_data["matches"].as_array().unwrap().len(), 50);
        assert_eq!(
            result.display_data["summary"].as_str().unwrap(),
            "showing first 50 of 75 matches"
        );
    }

    #[test]
    fn test_mark_truncated() {
        let mut result = ToolResult::ok();
        mark_truncated(&mut result, "stdout", true);
        mark_truncated(&mut result, "stderr", false);
        assert!(result.should_abridge);
        assert_eq!(result.data["stdout_truncated"], json!(true));
        assert_eq!(result.data["stderr_truncated"], json!(false));
        assert!(result.display_data.contains_key("stdout_truncated"));
        assert!(!result.display_data.contains_key("stderr_truncated"));
    }

    #[test]
    fn test_serialization_omits_approval_func() {
        let result = ToolResult::ok()
            .with("k", "v")
            .pending_approval(Default::default(), Box::new(|_| Box::pin(async { Ok(ToolResult::ok()) })));
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("approval_func").is_none());
        assert_eq!(json["needs_approval"], json!(true));
    }
}
