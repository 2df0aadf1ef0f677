use super::traits::{Observer, ObserverEvent, ObserverMetric};
use std::any::Any;
use tracing::{info, warn};

/// Log-based observer backed by `tracing`
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::HookLoaded { hook } => {
                info!(hook = %hook, "hook.loaded");
            }
            ObserverEvent::HookUnloaded { hook } => {
                info!(hook = %hook, "hook.unloaded");
            }
            ObserverEvent::SessionStart { session_id } => {
                info!(session_id = ?session_id, "session.start");
            }
            ObserverEvent::SessionEnd {
                duration,
                message_count,
            } => {
                let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                info!(duration_ms = ms, messages = message_count, "session.end");
            }
            ObserverEvent::TranscriptRepaired {
                orphaned_results_removed,
                orphaned_calls_fixed,
                duplicates_removed,
            } => {
                info!(
                    orphaned_results_removed = orphaned_results_removed,
                    orphaned_calls_fixed = orphaned_calls_fixed,
                    duplicates_removed = duplicates_removed,
                    "transcript.repaired"
                );
            }
            ObserverEvent::RepairSummary {
                repairs,
                orphaned_results_removed,
                orphaned_calls_fixed,
            } => {
                info!(
                    repairs = repairs,
                    orphaned_results_removed = orphaned_results_removed,
                    orphaned_calls_fixed = orphaned_calls_fixed,
                    "repair.summary"
                );
            }
            ObserverEvent::ReplayServed => {
                info!("replay.served");
            }
            ObserverEvent::ReplayUnavailable => {
                info!("replay.unavailable");
            }
            ObserverEvent::UpstreamFailure { message } => {
                warn!(error = %message, "upstream.failure");
            }
            ObserverEvent::Error { component, message } => {
                info!(component = %component, error = %message, "error");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::TranscriptSize(n) => {
                info!(messages = n, "metric.transcript_size");
            }
            ObserverMetric::ActiveSessions(s) => {
                info!(sessions = s, "metric.active_sessions");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
