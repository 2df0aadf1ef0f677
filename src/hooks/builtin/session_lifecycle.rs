use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::hooks::traits::{HookContext, HookHandler, HookResult};
use crate::observability::{Observer, ObserverEvent, ObserverMetric};

/// Monotonic time source for session durations.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Whether a true session is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
}

/// Handed to [`SessionCallbacks::on_true_session_end`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub duration: Duration,
    pub message_count: u64,
    /// Final contents of the session-scoped store.
    pub data: HashMap<String, Value>,
}

/// User logic that should run once per true session rather than once per turn.
#[async_trait]
pub trait SessionCallbacks: Send + Sync {
    async fn on_true_session_start(&self, _ctx: &HookContext) {}
    async fn on_true_session_end(&self, _ctx: &HookContext, _summary: &SessionSummary) {}
}

pub struct NoopCallbacks;

impl SessionCallbacks for NoopCallbacks {}

#[derive(Default)]
struct SessionRecord {
    started_at: Option<Instant>,
    message_count: u64,
    data: HashMap<String, Value>,
}

/// Collapses the host's per-turn session notifications into one true start
/// and one true end per session.
///
/// `Idle` → `Active` on the first session notification; further notifications
/// while `Active` are absorbed. `Active` → `Idle` on session end, which reports
/// the duration and number of requests sent. The scoped store is cleared on
/// both transitions.
pub struct SessionLifecycleHook {
    callbacks: Arc<dyn SessionCallbacks>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn Observer>,
    record: Mutex<SessionRecord>,
}

impl SessionLifecycleHook {
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Self::with_callbacks(observer, Arc::new(NoopCallbacks))
    }

    pub fn with_callbacks(observer: Arc<dyn Observer>, callbacks: Arc<dyn SessionCallbacks>) -> Self {
        Self {
            callbacks,
            clock: Arc::new(SystemClock),
            observer,
            record: Mutex::new(SessionRecord::default()),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> SessionState {
        if self.record.lock().started_at.is_some() {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    /// Requests sent in the current session.
    pub fn message_count(&self) -> u64 {
        self.record.lock().message_count
    }

    pub fn set_data(&self, key: impl Into<String>, value: Value) {
        self.record.lock().data.insert(key.into(), value);
    }

    pub fn get_data(&self, key: &str) -> Option<Value> {
        self.record.lock().data.get(key).cloned()
    }

    pub fn remove_data(&self, key: &str) -> Option<Value> {
        self.record.lock().data.remove(key)
    }

    /// Open a session if none is open. Returns whether this call opened it.
    fn begin(&self) -> bool {
        let mut record = self.record.lock();
        if record.started_at.is_some() {
            return false;
        }
        record.started_at = Some(self.clock.now());
        record.message_count = 0;
        record.data.clear();
        true
    }

    /// Close the open session, if any, and return its summary.
    fn finish(&self) -> Option<SessionSummary> {
        let mut record = self.record.lock();
        let started_at = record.started_at.take()?;
        let summary = SessionSummary {
            duration: self.clock.now().saturating_duration_since(started_at),
            message_count: record.message_count,
            data: std::mem::take(&mut record.data),
        };
        record.message_count = 0;
        Some(summary)
    }
}

#[async_trait]
impl HookHandler for SessionLifecycleHook {
    fn name(&self) -> &str {
        "session-lifecycle"
    }

    fn priority(&self) -> i32 {
        0
    }

    async fn on_session_created(&self, ctx: &HookContext) {
        if !self.begin() {
            return;
        }
        let started: DateTime<Utc> = Utc::now();
        info!(
            hook = "session-lifecycle",
            session_id = ctx.session_id.as_deref().unwrap_or("unknown"),
            started = %started.to_rfc3339(),
            "actual session start"
        );
        self.observer.record_event(&ObserverEvent::SessionStart {
            session_id: ctx.session_id.clone(),
        });
        self.observer.record_metric(&ObserverMetric::ActiveSessions(1));
        self.callbacks.on_true_session_start(ctx).await;
    }

    async fn before_send(&self, _ctx: &HookContext, request: Value) -> HookResult<Value> {
        let mut record = self.record.lock();
        if record.started_at.is_some() {
            record.message_count += 1;
        }
        drop(record);
        HookResult::Continue(request)
    }

    async fn on_session_end(&self, ctx: &HookContext) {
        let Some(summary) = self.finish() else {
            return;
        };
        info!(
            hook = "session-lifecycle",
            duration_secs = format!("{:.2}", summary.duration.as_secs_f64()),
            messages = summary.message_count,
            ended = %Utc::now().to_rfc3339(),
            "actual session end"
        );
        self.observer.record_event(&ObserverEvent::SessionEnd {
            duration: summary.duration,
            message_count: summary.message_count,
        });
        self.observer.record_metric(&ObserverMetric::ActiveSessions(0));
        self.callbacks.on_true_session_end(ctx, &summary).await;
    }
}
