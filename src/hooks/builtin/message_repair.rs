use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::hooks::traits::{HookContext, HookHandler, HookResult};
use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::session::{
    raw_messages, reconcile_payload, DuplicateResultPolicy, ToolRepairReport, TranscriptError,
};

/// Running totals across every repaired request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// Requests that needed at least one fix.
    pub repairs: u64,
    pub orphaned_results_removed: u64,
    pub orphaned_calls_fixed: u64,
    pub duplicates_removed: u64,
}

/// Repairs tool-call linkage in every outbound transcript before it reaches
/// the transport.
///
/// Payloads without a transcript pass through untouched, as do transcripts
/// that already satisfy the linkage invariant.
pub struct MessageRepairHook {
    policy: DuplicateResultPolicy,
    observer: Arc<dyn Observer>,
    stats: Mutex<RepairStats>,
}

impl MessageRepairHook {
    pub fn new(observer: Arc<dyn Observer>) -> Self {
        Self::with_policy(observer, DuplicateResultPolicy::default())
    }

    pub fn with_policy(observer: Arc<dyn Observer>, policy: DuplicateResultPolicy) -> Self {
        Self {
            policy,
            observer,
            stats: Mutex::new(RepairStats::default()),
        }
    }

    pub fn stats(&self) -> RepairStats {
        *self.stats.lock()
    }

    /// Reconcile the transcript inside `payload`, mirroring its shape.
    pub fn repair_payload(&self, payload: Value) -> Result<Value, TranscriptError> {
        match raw_messages(&payload).map(Vec::len) {
            None | Some(0) => return Ok(payload),
            Some(len) => self
                .observer
                .record_metric(&ObserverMetric::TranscriptSize(len as u64)),
        }

        let (out, report) = reconcile_payload(payload, self.policy)?;
        if report.is_clean() {
            return Ok(out);
        }

        for id in &report.orphaned_results {
            warn!(tool_call_id = %id, "removing orphaned tool result");
        }
        for id in &report.deduplicated_results {
            warn!(tool_call_id = %id, "removing duplicate tool result");
        }
        if !report.missing_results.is_empty() {
            warn!(
                count = report.missing_results.len(),
                "adding placeholder results for orphaned tool calls"
            );
        }

        self.record(&report);
        Ok(out)
    }

    fn record(&self, report: &ToolRepairReport) {
        {
            let mut stats = self.stats.lock();
            stats.repairs += 1;
            stats.orphaned_results_removed += report.orphaned_results.len() as u64;
            stats.orphaned_calls_fixed += report.missing_results.len() as u64;
            stats.duplicates_removed += report.deduplicated_results.len() as u64;
        }
        self.observer.record_event(&ObserverEvent::TranscriptRepaired {
            orphaned_results_removed: report.orphaned_results.len(),
            orphaned_calls_fixed: report.missing_results.len(),
            duplicates_removed: report.deduplicated_results.len(),
        });
    }
}

#[async_trait]
impl HookHandler for MessageRepairHook {
    fn name(&self) -> &str {
        "message-repair"
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn on_load(&self) {
        info!(hook = "message-repair", policy = ?self.policy, "fixing orphaned tool calls and tool results");
    }

    async fn before_send(&self, _ctx: &HookContext, request: Value) -> HookResult<Value> {
        match self.repair_payload(request) {
            Ok(repaired) => HookResult::Continue(repaired),
            Err(e) => {
                warn!(hook = "message-repair", error = %e, "rejecting malformed transcript");
                self.observer.record_event(&ObserverEvent::Error {
                    component: "message-repair".into(),
                    message: e.to_string(),
                });
                HookResult::Cancel(e.to_string())
            }
        }
    }

    async fn on_session_end(&self, _ctx: &HookContext) {
        let stats = self.stats();
        if stats.repairs == 0 {
            return;
        }
        info!(
            hook = "message-repair",
            repairs = stats.repairs,
            orphaned_results_removed = stats.orphaned_results_removed,
            orphaned_calls_fixed = stats.orphaned_calls_fixed,
            duplicates_removed = stats.duplicates_removed,
            "session summary: prevented {} potential API errors",
            stats.repairs
        );
        self.observer.record_event(&ObserverEvent::RepairSummary {
            repairs: stats.repairs,
            orphaned_results_removed: stats.orphaned_results_removed,
            orphaned_calls_fixed: stats.orphaned_calls_fixed,
        });
    }
}
