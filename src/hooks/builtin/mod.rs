pub mod debug_logger;
pub mod message_repair;
pub mod request_replay;
pub mod session_lifecycle;

pub use debug_logger::DebugLoggerHook;
pub use message_repair::{MessageRepairHook, RepairStats};
pub use request_replay::RequestReplayHook;
pub use session_lifecycle::{
    Clock, NoopCallbacks, SessionCallbacks, SessionLifecycleHook, SessionState, SessionSummary,
    SystemClock,
};
