use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

use crate::hooks::traits::{
    CompactionOutcome, CompactionStart, HookContext, HookHandler, HookResult,
};
use crate::session::{extract_messages, Role};
use crate::util::{display_value, truncate_with_ellipsis};

const PREVIEW_CHARS: usize = 80;

/// Diagnostic view of an outbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSummary {
    /// First characters of `message` / `prompt`, if present.
    pub preview: Option<String>,
    /// Length of `message` / `prompt` in characters.
    pub length: usize,
    pub tools: Option<usize>,
    pub model: Option<String>,
    pub transcript_len: Option<usize>,
    /// Assistant messages that declare tool calls.
    pub tool_call_messages: usize,
    pub tool_results: usize,
}

impl RequestSummary {
    pub fn of(request: &Value) -> Self {
        let mut summary = Self::default();

        if let Some(text) = request
            .get("message")
            .or_else(|| request.get("prompt"))
            .map(display_value)
        {
            summary.length = text.chars().count();
            summary.preview = Some(truncate_with_ellipsis(&text, PREVIEW_CHARS));
        }
        summary.tools = request.get("tools").and_then(Value::as_array).map(Vec::len);
        summary.model = request.get("model").map(display_value);

        if let Ok(Some(messages)) = extract_messages(request) {
            summary.transcript_len = Some(messages.len());
            summary.tool_call_messages = messages
                .iter()
                .filter(|m| !m.declared_calls().is_empty())
                .count();
            summary.tool_results = messages.iter().filter(|m| m.role == Role::Tool).count();
        }
        summary
    }
}

/// Diagnostic view of an inbound response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSummary {
    pub error: Option<String>,
    pub content_preview: Option<String>,
    pub content_length: usize,
    pub response_type: Option<String>,
    /// Names of tool calls in the response, `"unknown"` when a call has none.
    pub tool_calls: Vec<String>,
}

impl ResponseSummary {
    pub fn of(response: &Value) -> Self {
        let mut summary = Self::default();
        summary.error = response
            .get("error")
            .filter(|e| crate::util::is_truthy(e))
            .map(display_value);
        if let Some(content) = response.get("content").and_then(Value::as_str) {
            summary.content_length = content.chars().count();
            summary.content_preview = Some(truncate_with_ellipsis(content, PREVIEW_CHARS));
        }
        summary.response_type = response.get("type").map(display_value);
        if let Some(calls) = response.get("tool_calls").and_then(Value::as_array) {
            summary.tool_calls = calls
                .iter()
                .map(|tc| {
                    tc.get("function")
                        .and_then(|f| f.get("name"))
                        .or_else(|| tc.get("name"))
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string()
                })
                .collect();
        }
        summary
    }
}

/// Logs what flows through every hook at `debug` level. Never modifies payloads.
pub struct DebugLoggerHook {
    loaded_at: Mutex<Instant>,
}

impl DebugLoggerHook {
    pub fn new() -> Self {
        Self {
            loaded_at: Mutex::new(Instant::now()),
        }
    }

    fn elapsed_secs(&self) -> String {
        format!("{:.2}", self.loaded_at.lock().elapsed().as_secs_f64())
    }
}

#[async_trait]
impl HookHandler for DebugLoggerHook {
    fn name(&self) -> &str {
        "debug-logger"
    }

    fn priority(&self) -> i32 {
        -100
    }

    async fn on_load(&self) {
        *self.loaded_at.lock() = Instant::now();
        debug!(hook = "debug-logger", "debug logging enabled");
    }

    async fn on_unload(&self) {
        debug!(hook = "debug-logger", elapsed_secs = %self.elapsed_secs(), "debug logger unloaded");
    }

    async fn on_session_created(&self, ctx: &HookContext) {
        debug!(
            hook = "debug-logger",
            at = %Utc::now().to_rfc3339(),
            session_id = ctx.session_id.as_deref().unwrap_or("N/A"),
            context_data = ctx.data.is_some(),
            "session created"
        );
    }

    async fn before_send(&self, _ctx: &HookContext, request: Value) -> HookResult<Value> {
        let summary = RequestSummary::of(&request);
        debug!(
            hook = "debug-logger",
            elapsed_secs = %self.elapsed_secs(),
            preview = ?summary.preview,
            length = summary.length,
            tools = ?summary.tools,
            model = ?summary.model,
            transcript_len = ?summary.transcript_len,
            tool_call_messages = summary.tool_call_messages,
            tool_results = summary.tool_results,
            "before send"
        );
        HookResult::Continue(request)
    }

    async fn after_receive(&self, _ctx: &HookContext, response: Value) -> HookResult<Value> {
        if response.is_null() {
            debug!(hook = "debug-logger", "after receive: response is null");
            return HookResult::Continue(response);
        }
        let summary = ResponseSummary::of(&response);
        debug!(
            hook = "debug-logger",
            elapsed_secs = %self.elapsed_secs(),
            error = ?summary.error,
            content_preview = ?summary.content_preview,
            content_length = summary.content_length,
            response_type = ?summary.response_type,
            tool_calls = ?summary.tool_calls,
            "after receive"
        );
        HookResult::Continue(response)
    }

    async fn on_compaction_start(&self, _ctx: &HookContext, start: &CompactionStart) {
        debug!(
            hook = "debug-logger",
            pre_compaction_tokens = ?start.pre_compaction_tokens,
            messages = ?start.pre_compaction_messages,
            "compaction start"
        );
    }

    async fn on_compaction_complete(&self, _ctx: &HookContext, outcome: &CompactionOutcome) {
        match outcome {
            CompactionOutcome::Succeeded {
                tokens_removed,
                messages_removed,
            } => debug!(
                hook = "debug-logger",
                tokens_removed = ?tokens_removed,
                messages_removed = ?messages_removed,
                "compaction complete"
            ),
            CompactionOutcome::Failed { error } => {
                debug!(hook = "debug-logger", error = %error, "compaction failed");
            }
        }
    }

    async fn on_session_end(&self, _ctx: &HookContext) {
        debug!(hook = "debug-logger", elapsed_secs = %self.elapsed_secs(), "session end");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_summary_counts_tool_activity() {
        let request = json!({
            "message": "x".repeat(100),
            "model": "gpt-4o",
            "tools": [{}, {}],
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "tool_calls": [{"id": "a", "name": "ls"}]},
                {"role": "tool", "tool_call_id": "a", "content": "."}
            ]
        });
        let summary = RequestSummary::of(&request);
        assert_eq!(summary.length, 100);
        assert_eq!(summary.preview.as_deref().map(str::len), Some(83));
        assert_eq!(summary.tools, Some(2));
        assert_eq!(summary.model.as_deref(), Some("gpt-4o"));
        assert_eq!(summary.transcript_len, Some(3));
        assert_eq!(summary.tool_call_messages, 1);
        assert_eq!(summary.tool_results, 1);
    }

    #[test]
    fn request_summary_of_bare_prompt() {
        let summary = RequestSummary::of(&json!({"prompt": "short"}));
        assert_eq!(summary.preview.as_deref(), Some("short"));
        assert_eq!(summary.length, 5);
        assert!(summary.transcript_len.is_none());
    }

    #[test]
    fn response_summary_names_tool_calls() {
        let response = json!({
            "content": "done",
            "tool_calls": [
                {"function": {"name": "search"}},
                {"name": "shell"},
                {"id": "anonymous"}
            ]
        });
        let summary = ResponseSummary::of(&response);
        assert_eq!(summary.content_preview.as_deref(), Some("done"));
        assert_eq!(summary.tool_calls, vec!["search", "shell", "unknown"]);
        assert!(summary.error.is_none());
    }

    #[test]
    fn response_summary_reports_error() {
        let summary = ResponseSummary::of(&json!({"error": "rate limited", "type": "error"}));
        assert_eq!(summary.error.as_deref(), Some("rate limited"));
        assert_eq!(summary.response_type.as_deref(), Some("error"));
    }

    #[tokio::test]
    async fn logger_never_modifies_payloads() {
        let hook = DebugLoggerHook::new();
        let ctx = HookContext::new();
        hook.on_load().await;

        let request = json!({"message": "hello", "messages": []});
        assert_eq!(
            hook.before_send(&ctx, request.clone()).await,
            HookResult::Continue(request)
        );
        for response in [json!(null), json!({"content": "hi"})] {
            assert_eq!(
                hook.after_receive(&ctx, response.clone()).await,
                HookResult::Continue(response)
            );
        }
        hook.on_compaction_start(&ctx, &CompactionStart::default()).await;
        hook.on_compaction_complete(
            &ctx,
            &CompactionOutcome::Failed {
                error: "too small".into(),
            },
        )
        .await;
    }
}
