use super::traits::{Observer, ObserverEvent, ObserverMetric};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;

/// In-memory observer that keeps every event and metric it receives.
///
/// Hosts use it to build end-of-session reports; tests use it to assert on
/// what the interceptors reported.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
    metrics: Mutex<Vec<ObserverMetric>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().clone()
    }

    pub fn metrics(&self) -> Vec<ObserverMetric> {
        self.metrics.lock().clone()
    }

    /// Number of recorded events matching `pred`.
    pub fn count(&self, pred: impl Fn(&ObserverEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    /// Recorded events tallied by [`ObserverEvent::kind`].
    pub fn event_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for event in self.events.lock().iter() {
            *counts.entry(event.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn clear(&self) {
        self.events.lock().clear();
        self.metrics.lock().clear();
    }
}

impl Observer for RecordingObserver {
    fn record_event(&self, event: &ObserverEvent) {
        self.events.lock().push(event.clone());
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        self.metrics.lock().push(metric.clone());
    }

    fn name(&self) -> &str {
        "memory"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
