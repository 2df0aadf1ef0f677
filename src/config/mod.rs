pub mod schema;

pub use schema::{
    Config, DebugConfig, LifecycleConfig, ObservabilityConfig, RepairConfig, ReplayConfig,
};
