//! Transcript repair: restore tool-call ↔ tool-result linkage before a
//! transcript is sent to the model API.
//!
//! The API expects every tool call declared by an assistant message to be
//! answered by exactly one tool-role message carrying its id, and every
//! tool-role message to answer a call that exists. Both directions are
//! repaired together:
//!
//! 1. **Orphaned results**: tool messages whose `tool_call_id` was never
//!    declared are dropped.
//! 2. **Orphaned calls**: declared ids with no surviving result get a
//!    placeholder result appended at the end of the transcript.
//!
//! Existing messages are never reordered.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{edit_messages, extract_messages, Message, TranscriptError};

/// Content of the placeholder result appended for a call that never got one.
/// Callers pattern-match on this exact text.
pub const INTERRUPTED_TOOL_RESULT: &str = "The execution of this tool was interrupted.";

/// What to do when more than one tool message answers the same call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateResultPolicy {
    /// Leave every duplicate in place.
    #[default]
    Keep,
    /// Keep the first result for an id and drop later ones.
    KeepFirst,
}

/// Summary of what `reconcile` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolRepairReport {
    /// Result ids with no matching declared call. Dropped.
    pub orphaned_results: Vec<String>,
    /// Declared call ids with no result. A placeholder is appended for each, in declaration order.
    pub missing_results: Vec<String>,
    /// Result ids dropped as duplicates (only under `KeepFirst`).
    pub deduplicated_results: Vec<String>,
}

impl ToolRepairReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned_results.is_empty()
            && self.missing_results.is_empty()
            && self.deduplicated_results.is_empty()
    }

    /// Messages removed from the input.
    pub fn removed(&self) -> usize {
        self.orphaned_results.len() + self.deduplicated_results.len()
    }

    /// Messages appended to the output.
    pub fn appended(&self) -> usize {
        self.missing_results.len()
    }
}

/// What a repair does, expressed against input positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    /// Indices of input messages to drop, ascending.
    pub dropped: Vec<usize>,
    pub report: ToolRepairReport,
}

impl RepairPlan {
    fn keeps(&self, index: usize) -> bool {
        self.dropped.binary_search(&index).is_err()
    }

    /// Placeholder results to append, in declaration order.
    pub fn placeholders(&self) -> Vec<Message> {
        self.report
            .missing_results
            .iter()
            .map(|id| Message::tool_result(id.as_str(), INTERRUPTED_TOOL_RESULT))
            .collect()
    }
}

/// Work out which messages to drop and which placeholders to append.
pub fn plan_repair(messages: &[Message], policy: DuplicateResultPolicy) -> RepairPlan {
    let mut plan = RepairPlan::default();

    // Pass 1: declared ids in first-seen order.
    let mut declared: Vec<&str> = Vec::new();
    let mut declared_set: HashSet<&str> = HashSet::new();
    for id in messages.iter().flat_map(Message::declared_ids) {
        if declared_set.insert(id) {
            declared.push(id);
        }
    }

    // Pass 2: orphaned (and, if asked, duplicate) results.
    let mut satisfied: HashSet<&str> = HashSet::new();
    for (index, msg) in messages.iter().enumerate() {
        let Some(id) = msg.result_for() else {
            continue;
        };
        if !declared_set.contains(id) {
            plan.report.orphaned_results.push(id.to_string());
            plan.dropped.push(index);
        } else if !satisfied.insert(id) && policy == DuplicateResultPolicy::KeepFirst {
            plan.report.deduplicated_results.push(id.to_string());
            plan.dropped.push(index);
        }
    }

    // Pass 3: calls left without a result.
    plan.report.missing_results = declared
        .into_iter()
        .filter(|id| !satisfied.contains(id))
        .map(str::to_string)
        .collect();

    plan
}

/// Repair a transcript, leaving duplicate results in place.
pub fn reconcile(messages: &[Message]) -> (Vec<Message>, ToolRepairReport) {
    reconcile_with(messages, DuplicateResultPolicy::Keep)
}

/// Repair a transcript with an explicit duplicate-result policy.
///
/// Pure and total: the same input always yields the same output, and a
/// transcript that already satisfies the linkage invariant comes back
/// element-for-element equal.
pub fn reconcile_with(
    messages: &[Message],
    policy: DuplicateResultPolicy,
) -> (Vec<Message>, ToolRepairReport) {
    let plan = plan_repair(messages, policy);
    if plan.report.is_clean() {
        return (messages.to_vec(), plan.report);
    }
    let mut repaired: Vec<Message> = messages
        .iter()
        .enumerate()
        .filter(|(index, _)| plan.keeps(*index))
        .map(|(_, msg)| msg.clone())
        .collect();
    repaired.extend(plan.placeholders());
    (repaired, plan.report)
}

/// Reconcile the transcript inside a request payload.
///
/// Kept entries stay the exact JSON they arrived as; only placeholders are
/// encoded. Payloads without a transcript, and transcripts needing no repair,
/// come back unchanged with a clean report.
pub fn reconcile_payload(
    payload: Value,
    policy: DuplicateResultPolicy,
) -> Result<(Value, ToolRepairReport), TranscriptError> {
    let Some(messages) = extract_messages(&payload)? else {
        return Ok((payload, ToolRepairReport::default()));
    };
    let plan = plan_repair(&messages, policy);
    if plan.report.is_clean() {
        return Ok((payload, plan.report));
    }

    let placeholders = plan
        .placeholders()
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    let out = edit_messages(payload, |raw| {
        raw.into_iter()
            .enumerate()
            .filter(|(index, _)| plan.keeps(*index))
            .map(|(_, entry)| entry)
            .chain(placeholders)
            .collect()
    });
    Ok((out, plan.report))
}

/// Declared tool-call ids in first-seen order, without duplicates.
pub fn declared_tool_call_ids(messages: &[Message]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ids = Vec::new();
    for id in messages.iter().flat_map(Message::declared_ids) {
        if seen.insert(id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Whether every declared call has exactly one result and every result
/// answers a declared call.
pub fn satisfies_linkage(messages: &[Message]) -> bool {
    let declared: HashSet<String> = declared_tool_call_ids(messages).into_iter().collect();
    let mut answered: HashSet<&str> = HashSet::new();
    for id in messages.iter().filter_map(Message::result_for) {
        if !declared.contains(id) || !answered.insert(id) {
            return false;
        }
    }
    answered.len() == declared.len()
}
