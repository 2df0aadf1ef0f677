use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;
use tracing::info;

use crate::observability::{NoopObserver, Observer, ObserverEvent};

use super::traits::{CompactionOutcome, CompactionStart, HookContext, HookHandler, HookResult};

/// Dispatcher that manages registered hook handlers.
///
/// Handlers run in descending priority order. Void hooks are awaited one
/// after another; modifying hooks pipe their output into the next handler
/// and short-circuit on `Cancel`. A panicking handler is logged and skipped.
///
/// The runner assumes the host's single-flight contract: one hook call at a
/// time, each awaited before the next.
pub struct HookRunner {
    handlers: Vec<Box<dyn HookHandler>>,
    observer: Arc<dyn Observer>,
}

impl HookRunner {
    /// Create an empty runner with no handlers.
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NoopObserver))
    }

    /// Create an empty runner that reports hook load/unload and panics to `observer`.
    pub fn with_observer(observer: Arc<dyn Observer>) -> Self {
        Self {
            handlers: Vec::new(),
            observer,
        }
    }

    /// Register a handler and re-sort by descending priority.
    ///
    /// The sort is stable, so handlers sharing a priority keep registration order.
    pub fn register(&mut self, handler: Box<dyn HookHandler>) {
        self.handlers.push(handler);
        self.handlers
            .sort_by_key(|h| std::cmp::Reverse(h.priority()));
    }

    /// Handler names in dispatch order.
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn report_panic(&self, hook_name: &str, event: &str) {
        tracing::error!(hook = hook_name, event, "hook panicked; continuing");
        self.observer.record_event(&ObserverEvent::Error {
            component: hook_name.to_string(),
            message: format!("{event} hook panicked"),
        });
    }

    // ---------------------------------------------------------------
    // Void dispatchers (sequential by priority)
    // ---------------------------------------------------------------

    pub async fn fire_load(&self) {
        for h in &self.handlers {
            if AssertUnwindSafe(h.on_load()).catch_unwind().await.is_err() {
                self.report_panic(h.name(), "on_load");
                continue;
            }
            self.observer.record_event(&ObserverEvent::HookLoaded {
                hook: h.name().to_string(),
            });
        }
    }

    pub async fn fire_unload(&self) {
        for h in &self.handlers {
            if AssertUnwindSafe(h.on_unload()).catch_unwind().await.is_err() {
                self.report_panic(h.name(), "on_unload");
                continue;
            }
            self.observer.record_event(&ObserverEvent::HookUnloaded {
                hook: h.name().to_string(),
            });
        }
        self.observer.flush();
    }

    pub async fn fire_session_created(&self, ctx: &HookContext) {
        for h in &self.handlers {
            if AssertUnwindSafe(h.on_session_created(ctx))
                .catch_unwind()
                .await
                .is_err()
            {
                self.report_panic(h.name(), "on_session_created");
            }
        }
    }

    pub async fn fire_session_end(&self, ctx: &HookContext) {
        for h in &self.handlers {
            if AssertUnwindSafe(h.on_session_end(ctx))
                .catch_unwind()
                .await
                .is_err()
            {
                self.report_panic(h.name(), "on_session_end");
            }
        }
    }

    pub async fn fire_compaction_start(&self, ctx: &HookContext, start: &CompactionStart) {
        for h in &self.handlers {
            if AssertUnwindSafe(h.on_compaction_start(ctx, start))
                .catch_unwind()
                .await
                .is_err()
            {
                self.report_panic(h.name(), "on_compaction_start");
            }
        }
    }

    pub async fn fire_compaction_complete(&self, ctx: &HookContext, outcome: &CompactionOutcome) {
        for h in &self.handlers {
            if AssertUnwindSafe(h.on_compaction_complete(ctx, outcome))
                .catch_unwind()
                .await
                .is_err()
            {
                self.report_panic(h.name(), "on_compaction_complete");
            }
        }
    }

    // ---------------------------------------------------------------
    // Modifying dispatchers (sequential by priority, short-circuit on Cancel)
    // ---------------------------------------------------------------

    pub async fn run_before_send(&self, ctx: &HookContext, mut request: Value) -> HookResult<Value> {
        for h in &self.handlers {
            let hook_name = h.name();
            match AssertUnwindSafe(h.before_send(ctx, request.clone()))
                .catch_unwind()
                .await
            {
                Ok(HookResult::Continue(r)) => request = r,
                Ok(HookResult::Cancel(reason)) => {
                    info!(hook = hook_name, reason, "before_send cancelled by hook");
                    return HookResult::Cancel(reason);
                }
                Err(_) => self.report_panic(hook_name, "before_send"),
            }
        }
        HookResult::Continue(request)
    }

    pub async fn run_after_receive(
        &self,
        ctx: &HookContext,
        mut response: Value,
    ) -> HookResult<Value> {
        for h in &self.handlers {
            let hook_name = h.name();
            match AssertUnwindSafe(h.after_receive(ctx, response.clone()))
                .catch_unwind()
                .await
            {
                Ok(HookResult::Continue(r)) => response = r,
                Ok(HookResult::Cancel(reason)) => {
                    info!(hook = hook_name, reason, "after_receive cancelled by hook");
                    return HookResult::Cancel(reason);
                }
                Err(_) => self.report_panic(hook_name, "after_receive"),
            }
        }
        HookResult::Continue(response)
    }
}
