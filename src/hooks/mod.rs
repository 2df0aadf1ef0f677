pub mod builtin;
mod runner;
mod traits;

use std::sync::Arc;

use crate::config::Config;
use crate::observability::Observer;

use builtin::{
    DebugLoggerHook, MessageRepairHook, NoopCallbacks, RequestReplayHook, SessionCallbacks,
    SessionLifecycleHook,
};

pub use runner::HookRunner;
pub use traits::{CompactionOutcome, CompactionStart, HookContext, HookHandler, HookResult};

/// Build a runner holding every builtin interceptor enabled in `config`.
pub fn create_runner(config: &Config, observer: Arc<dyn Observer>) -> HookRunner {
    create_runner_with_callbacks(config, observer, Arc::new(NoopCallbacks))
}

/// Like [`create_runner`], with user logic attached to true session boundaries.
pub fn create_runner_with_callbacks(
    config: &Config,
    observer: Arc<dyn Observer>,
    callbacks: Arc<dyn SessionCallbacks>,
) -> HookRunner {
    let mut runner = HookRunner::with_observer(observer.clone());

    if config.repair.enabled {
        runner.register(Box::new(MessageRepairHook::with_policy(
            observer.clone(),
            config.repair.duplicate_results,
        )));
    }
    if config.replay.enabled {
        runner.register(Box::new(RequestReplayHook::with_trigger(
            observer.clone(),
            config.replay.trigger.clone(),
        )));
    }
    if config.lifecycle.enabled {
        runner.register(Box::new(SessionLifecycleHook::with_callbacks(
            observer, callbacks,
        )));
    }
    if config.debug.enabled {
        runner.register(Box::new(DebugLoggerHook::new()));
    }

    tracing::debug!(hooks = ?runner.handler_names(), "hook runner assembled");
    runner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::NoopObserver;

    #[test]
    fn default_config_registers_core_hooks_in_priority_order() {
        let runner = create_runner(&Config::default(), Arc::new(NoopObserver));
        assert_eq!(
            runner.handler_names(),
            vec!["message-repair", "request-replay", "session-lifecycle"]
        );
    }

    #[test]
    fn debug_logger_runs_last() {
        let mut config = Config::default();
        config.debug.enabled = true;
        let runner = create_runner(&config, Arc::new(NoopObserver));
        assert_eq!(runner.handler_names().last(), Some(&"debug-logger"));
    }

    #[test]
    fn disabled_hooks_are_not_registered() {
        let mut config = Config::default();
        config.repair.enabled = false;
        config.replay.enabled = false;
        config.lifecycle.enabled = false;
        let runner = create_runner(&config, Arc::new(NoopObserver));
        assert!(runner.is_empty());
    }
}
