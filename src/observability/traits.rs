use std::time::Duration;

/// Discrete events emitted by the interceptors for observability.
///
/// Events carry counts and identifiers only, never transcript content.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    /// A hook was loaded into the runner.
    HookLoaded { hook: String },
    /// A hook was unloaded.
    HookUnloaded { hook: String },
    /// The first session notification of a burst opened a true session.
    SessionStart { session_id: Option<String> },
    /// A true session closed.
    SessionEnd {
        duration: Duration,
        message_count: u64,
    },
    /// An outbound transcript had its tool linkage repaired.
    TranscriptRepaired {
        orphaned_results_removed: usize,
        orphaned_calls_fixed: usize,
        duplicates_removed: usize,
    },
    /// Cumulative repair totals, emitted at session end.
    RepairSummary {
        repairs: u64,
        orphaned_results_removed: u64,
        orphaned_calls_fixed: u64,
    },
    /// A replay trigger was answered with the cached request.
    ReplayServed,
    /// A replay trigger arrived with nothing cached.
    ReplayUnavailable,
    /// The upstream response signalled a failure.
    UpstreamFailure { message: String },
    /// An error occurred in a named component.
    Error {
        /// Subsystem where the error originated (e.g., `"runner"`, `"message-repair"`).
        component: String,
        /// Human-readable error description.
        message: String,
    },
}

impl ObserverEvent {
    /// Stable snake_case label for the event variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HookLoaded { .. } => "hook_loaded",
            Self::HookUnloaded { .. } => "hook_unloaded",
            Self::SessionStart { .. } => "session_start",
            Self::SessionEnd { .. } => "session_end",
            Self::TranscriptRepaired { .. } => "transcript_repaired",
            Self::RepairSummary { .. } => "repair_summary",
            Self::ReplayServed => "replay_served",
            Self::ReplayUnavailable => "replay_unavailable",
            Self::UpstreamFailure { .. } => "upstream_failure",
            Self::Error { .. } => "error",
        }
    }
}

/// Numeric metrics emitted by the interceptors.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverMetric {
    /// Number of messages in an outbound transcript, before repair.
    TranscriptSize(u64),
    /// Number of true sessions currently open (0 or 1 per tracker).
    ActiveSessions(u64),
}

/// Core observability trait for recording interceptor telemetry.
///
/// Implementations must be `Send + Sync + 'static` because the observer is
/// shared between hooks via `Arc`.
pub trait Observer: Send + Sync + 'static {
    /// Record a discrete lifecycle event.
    ///
    /// Called synchronously on the hot path; implementations should avoid
    /// blocking I/O.
    fn record_event(&self, event: &ObserverEvent);

    /// Record a numeric metric sample.
    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush any buffered telemetry data to the backend.
    fn flush(&self) {}

    /// Return the human-readable name of this observer backend.
    fn name(&self) -> &str;

    /// Downcast to `Any` for backend-specific operations.
    fn as_any(&self) -> &dyn std::any::Any;
}
