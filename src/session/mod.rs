//! Session transcripts: message types, payload shapes, and tool-linkage repair.

pub mod repair;
pub mod types;

pub use repair::{
    declared_tool_call_ids, plan_repair, reconcile, reconcile_payload, reconcile_with,
    satisfies_linkage, DuplicateResultPolicy, RepairPlan, ToolRepairReport,
    INTERRUPTED_TOOL_RESULT,
};
pub use types::{
    edit_messages, extract_messages, raw_messages, Message, RequestShape, Role, ToolCall,
    TranscriptError,
};
