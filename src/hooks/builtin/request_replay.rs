use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::hooks::traits::{HookContext, HookHandler, HookResult};
use crate::observability::{Observer, ObserverEvent};
use crate::util::{display_value, is_truthy};

/// Message text that asks for the last request to be resent.
pub const DEFAULT_REPLAY_TRIGGER: &str = "/retry";

/// Written into `message` and `prompt` when a replay is asked for with nothing cached.
pub const NOTHING_TO_RETRY: &str = "❌ No previous request to retry";

#[derive(Default)]
struct ReplayState {
    snapshot: Option<Value>,
    last_error: Option<Value>,
}

/// Keeps a private copy of the last outbound request so it can be resent
/// verbatim on demand, and watches responses for failures.
///
/// Holds at most one snapshot (last write wins). Replays hand out clones, so
/// later stages mutating a replayed request never touch the cached one.
pub struct RequestReplayHook {
    trigger: String,
    observer: Arc<dyn Observer>,
    state: Mutex<ReplayState>,
}

impl RequestReplayHook {
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Self::with_trigger(observer, DEFAULT_REPLAY_TRIGGER)
    }

    pub fn with_trigger(observer: Arc<dyn Observer>, trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            observer,
            state: Mutex::new(ReplayState::default()),
        }
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// Whether `request` carries the replay trigger in `message` or `prompt`.
    pub fn is_replay_trigger(&self, request: &Value) -> bool {
        ["message", "prompt"].iter().any(|field| {
            request.get(field).and_then(Value::as_str) == Some(self.trigger.as_str())
        })
    }

    /// A copy of the cached request, if any.
    pub fn replay(&self) -> Option<Value> {
        self.state.lock().snapshot.clone()
    }

    pub fn has_snapshot(&self) -> bool {
        self.state.lock().snapshot.is_some()
    }

    /// The last response that signalled a failure, cleared by the next success.
    pub fn last_error(&self) -> Option<Value> {
        self.state.lock().last_error.clone()
    }

    fn nothing_to_retry(request: Value) -> Value {
        match request {
            Value::Object(mut map) => {
                map.insert("message".into(), Value::String(NOTHING_TO_RETRY.into()));
                map.insert("prompt".into(), Value::String(NOTHING_TO_RETRY.into()));
                Value::Object(map)
            }
            other => other,
        }
    }
}

/// Whether a response signals failure: a truthy `error` field or `type == "error"`.
pub fn response_failed(response: &Value) -> bool {
    response.get("error").is_some_and(is_truthy)
        || response.get("type").and_then(Value::as_str) == Some("error")
}

fn failure_message(response: &Value) -> String {
    match response.get("error") {
        Some(error) if is_truthy(error) => display_value(error),
        _ => "response type is \"error\"".into(),
    }
}

#[async_trait]
impl HookHandler for RequestReplayHook {
    fn name(&self) -> &str {
        "request-replay"
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn on_load(&self) {
        info!(hook = "request-replay", trigger = %self.trigger, "send the trigger to retry the last request");
    }

    async fn before_send(&self, _ctx: &HookContext, request: Value) -> HookResult<Value> {
        if self.is_replay_trigger(&request) {
            return match self.replay() {
                Some(snapshot) => {
                    info!(hook = "request-replay", "retrying last request");
                    self.observer.record_event(&ObserverEvent::ReplayServed);
                    HookResult::Continue(snapshot)
                }
                None => {
                    info!(hook = "request-replay", "no previous request to retry");
                    self.observer.record_event(&ObserverEvent::ReplayUnavailable);
                    HookResult::Continue(Self::nothing_to_retry(request))
                }
            };
        }

        self.state.lock().snapshot = Some(request.clone());
        HookResult::Continue(request)
    }

    async fn after_receive(&self, _ctx: &HookContext, response: Value) -> HookResult<Value> {
        if response_failed(&response) {
            let message = failure_message(&response);
            warn!(hook = "request-replay", error = %message, "request failed");
            info!(
                hook = "request-replay",
                "TIP: send {} to retry the last request", self.trigger
            );
            self.observer
                .record_event(&ObserverEvent::UpstreamFailure { message });
            self.state.lock().last_error = Some(response.clone());
        } else {
            self.state.lock().last_error = None;
        }
        HookResult::Continue(response)
    }

    async fn on_session_end(&self, _ctx: &HookContext) {
        info!(hook = "request-replay", cached = self.has_snapshot(), "session ended");
    }
}
