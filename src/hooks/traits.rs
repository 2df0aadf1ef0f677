use async_trait::async_trait;
use serde_json::Value;

/// Per-call context handed to every hook by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookContext {
    pub session_id: Option<String>,
    /// Opaque host data.
    pub data: Option<Value>,
}

impl HookContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            data: None,
        }
    }
}

/// Reported by the host before it compacts a long transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionStart {
    pub pre_compaction_tokens: Option<u64>,
    pub pre_compaction_messages: Option<usize>,
}

/// Reported by the host once compaction finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    Succeeded {
        tokens_removed: Option<u64>,
        messages_removed: Option<usize>,
    },
    Failed {
        error: String,
    },
}

/// Result of a modifying hook: continue with (possibly modified) data, or cancel.
#[derive(Debug, Clone, PartialEq)]
pub enum HookResult<T> {
    Continue(T),
    Cancel(String),
}

impl<T> HookResult<T> {
    pub fn is_cancel(&self) -> bool {
        matches!(self, HookResult::Cancel(_))
    }

    /// The carried value, if the hook did not cancel.
    pub fn into_continue(self) -> Option<T> {
        match self {
            HookResult::Continue(value) => Some(value),
            HookResult::Cancel(_) => None,
        }
    }
}

/// Trait for hook handlers. All methods have default no-op implementations.
/// Implement only the events you care about.
///
/// The host invokes hooks one at a time and awaits each before the next, so
/// handlers never observe two calls in flight.
#[async_trait]
pub trait HookHandler: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> i32 {
        0
    }

    // --- Void hooks ---
    async fn on_load(&self) {}
    async fn on_unload(&self) {}
    async fn on_session_created(&self, _ctx: &HookContext) {}
    async fn on_session_end(&self, _ctx: &HookContext) {}
    async fn on_compaction_start(&self, _ctx: &HookContext, _start: &CompactionStart) {}
    async fn on_compaction_complete(&self, _ctx: &HookContext, _outcome: &CompactionOutcome) {}

    // --- Modifying hooks (sequential by priority, can cancel) ---

    /// Outbound request payload. The returned value replaces the payload seen
    /// by later hooks and, ultimately, the transport.
    async fn before_send(&self, _ctx: &HookContext, request: Value) -> HookResult<Value> {
        HookResult::Continue(request)
    }

    /// Inbound response payload.
    async fn after_receive(&self, _ctx: &HookContext, response: Value) -> HookResult<Value> {
        HookResult::Continue(response)
    }
}
