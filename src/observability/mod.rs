pub mod log;
pub mod memory;
pub mod multi;
pub mod noop;
pub mod traits;

pub use self::log::LogObserver;
pub use memory::RecordingObserver;
pub use multi::MultiObserver;
pub use noop::NoopObserver;
pub use traits::{Observer, ObserverEvent, ObserverMetric};

use crate::config::ObservabilityConfig;
use std::sync::Arc;

/// Factory: create the right observer from config.
///
/// A comma-separated backend list (`"log,memory"`) fans out to each entry.
pub fn create_observer(config: &ObservabilityConfig) -> Arc<dyn Observer> {
    let backends: Vec<&str> = config
        .backend
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect();
    match backends.as_slice() {
        [] => Arc::new(NoopObserver),
        [single] => backend_observer(single),
        many => Arc::new(MultiObserver::new(
            many.iter().map(|b| backend_observer(b)).collect(),
        )),
    }
}

fn backend_observer(backend: &str) -> Arc<dyn Observer> {
    match backend {
        "log" => Arc::new(LogObserver::new()),
        "memory" => Arc::new(RecordingObserver::new()),
        "none" | "noop" => Arc::new(NoopObserver),
        _ => {
            tracing::warn!(
                "Unknown observability backend '{}', falling back to noop",
                backend
            );
            Arc::new(NoopObserver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_none_returns_noop() {
        let cfg = ObservabilityConfig {
            backend: "none".into(),
        };
        assert_eq!(create_observer(&cfg).name(), "noop");
    }

    #[test]
    fn factory_noop_returns_noop() {
        let cfg = ObservabilityConfig {
            backend: "noop".into(),
        };
        assert_eq!(create_observer(&cfg).name(), "noop");
    }

    #[test]
    fn factory_log_returns_log() {
        let cfg = ObservabilityConfig {
            backend: "log".into(),
        };
        assert_eq!(create_observer(&cfg).name(), "log");
    }

    #[test]
    fn factory_memory_returns_recorder() {
        let cfg = ObservabilityConfig {
            backend: "memory".into(),
        };
        let observer = create_observer(&cfg);
        assert_eq!(observer.name(), "memory");
        assert!(observer
            .as_any()
            .downcast_ref::<RecordingObserver>()
            .is_some());
    }

    #[test]
    fn factory_unknown_falls_back_to_noop() {
        let cfg = ObservabilityConfig {
            backend: "xyzzy_unknown".into(),
        };
        assert_eq!(create_observer(&cfg).name(), "noop");
    }

    #[test]
    fn factory_backend_list_returns_multi() {
        let cfg = ObservabilityConfig {
            backend: "log, memory".into(),
        };
        let observer = create_observer(&cfg);
        assert_eq!(observer.name(), "multi");
        let multi = observer.as_any().downcast_ref::<MultiObserver>();
        assert_eq!(multi.map(MultiObserver::len), Some(2));
    }

    #[test]
    fn factory_empty_string_falls_back_to_noop() {
        let cfg = ObservabilityConfig {
            backend: String::new(),
        };
        assert_eq!(create_observer(&cfg).name(), "noop");
    }
}
