//! Invariants of the transcript reconciler over many generated transcripts.

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use serde_json::{json, Value};
use std::collections::HashSet;

use turnguard::session::{
    declared_tool_call_ids, reconcile, reconcile_payload, reconcile_with, satisfies_linkage,
    DuplicateResultPolicy, Message, Role, ToolCall, INTERRUPTED_TOOL_RESULT,
};

const IDS: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn random_transcript(rng: &mut StdRng) -> Vec<Message> {
    let len = rng.random_range(0..10);
    (0..len)
        .map(|i| match rng.random_range(0..5) {
            0 => Message::user(&format!("user {i}")),
            1 => Message::assistant(&format!("assistant {i}")),
            2 => {
                let calls = (0..=rng.random_range(0..3))
                    .map(|_| {
                        let id = IDS[rng.random_range(0..IDS.len())];
                        ToolCall::function(id, "search", json!({"q": i}))
                    })
                    .collect();
                Message::assistant_with_tool_calls(None, calls)
            }
            _ => {
                let id = IDS[rng.random_range(0..IDS.len())];
                Message::tool_result(id, &format!("result {i}"))
            }
        })
        .collect()
}

/// Seeded so a failing case reproduces from the seed in the assertion message.
fn transcripts() -> impl Iterator<Item = (u64, Vec<Message>)> {
    (1..=500u64).map(|seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        (seed, random_transcript(&mut rng))
    })
}

fn result_ids(messages: &[Message]) -> Vec<&str> {
    messages.iter().filter_map(Message::result_for).collect()
}

#[test]
fn every_result_answers_a_declared_call() {
    for (seed, input) in transcripts() {
        let (out, _) = reconcile(&input);
        let declared: HashSet<String> = declared_tool_call_ids(&out).into_iter().collect();
        for id in result_ids(&out) {
            assert!(declared.contains(id), "seed {seed}: orphan {id} survived");
        }
    }
}

#[test]
fn every_declared_call_has_a_result() {
    for (seed, input) in transcripts() {
        let (out, _) = reconcile(&input);
        let answered: HashSet<&str> = result_ids(&out).into_iter().collect();
        for id in declared_tool_call_ids(&out) {
            assert!(answered.contains(id.as_str()), "seed {seed}: {id} unanswered");
        }
    }
}

#[test]
fn keep_first_restores_full_linkage() {
    for (seed, input) in transcripts() {
        let (out, _) = reconcile_with(&input, DuplicateResultPolicy::KeepFirst);
        assert!(satisfies_linkage(&out), "seed {seed}");
    }
}

#[test]
fn reconciling_twice_changes_nothing() {
    for (seed, input) in transcripts() {
        let (once, _) = reconcile(&input);
        let (twice, report) = reconcile(&once);
        assert_eq!(once, twice, "seed {seed}");
        assert!(report.is_clean(), "seed {seed}: {report:?}");
    }
}

#[test]
fn valid_transcripts_come_back_unchanged() {
    for (seed, input) in transcripts() {
        if !satisfies_linkage(&input) {
            continue;
        }
        let (out, report) = reconcile(&input);
        assert_eq!(out, input, "seed {seed}");
        assert!(report.is_clean());
    }
}

#[test]
fn output_length_matches_report() {
    for (seed, input) in transcripts() {
        for policy in [DuplicateResultPolicy::Keep, DuplicateResultPolicy::KeepFirst] {
            let (out, report) = reconcile_with(&input, policy);
            assert_eq!(
                out.len(),
                input.len() - report.removed() + report.appended(),
                "seed {seed}, {policy:?}"
            );
        }
    }
}

#[test]
fn surviving_messages_keep_relative_order() {
    for (seed, input) in transcripts() {
        let (out, report) = reconcile(&input);
        let kept = &out[..out.len() - report.appended()];
        let mut cursor = input.iter();
        for msg in kept {
            assert!(
                cursor.any(|candidate| candidate == msg),
                "seed {seed}: order changed"
            );
        }
    }
}

#[test]
fn placeholders_follow_first_declaration_order() {
    for (seed, input) in transcripts() {
        let (out, report) = reconcile(&input);
        let appended = &out[out.len() - report.appended()..];
        let appended_ids: Vec<&str> = appended.iter().filter_map(Message::result_for).collect();
        let expected: Vec<&str> = report.missing_results.iter().map(String::as_str).collect();
        assert_eq!(appended_ids, expected, "seed {seed}");

        let declared = declared_tool_call_ids(&input);
        let positions: Vec<usize> = expected
            .iter()
            .map(|id| declared.iter().position(|d| d == id).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "seed {seed}");

        for msg in appended {
            assert_eq!(msg.role, Role::Tool);
            assert_eq!(msg.text(), Some(INTERRUPTED_TOOL_RESULT));
        }
    }
}

#[test]
fn payload_repair_keeps_raw_entries_and_agrees_with_reconcile() {
    for (seed, input) in transcripts() {
        // Explicit nulls and vendor fields that typed decoding would not reproduce.
        let raw: Vec<Value> = input
            .iter()
            .map(|msg| {
                let mut entry = serde_json::to_value(msg).unwrap();
                entry["content"] = Value::Null;
                entry["x_trace"] = json!({"seed": seed});
                entry
            })
            .collect();

        let (out, report) =
            reconcile_payload(json!({"messages": raw.clone()}), DuplicateResultPolicy::Keep)
                .unwrap();
        let (typed, typed_report) = reconcile(&input);
        assert_eq!(report, typed_report, "seed {seed}");

        let entries = out["messages"].as_array().unwrap();
        assert_eq!(entries.len(), typed.len(), "seed {seed}");
        let kept = &entries[..entries.len() - report.appended()];
        let mut cursor = raw.iter();
        for entry in kept {
            assert!(cursor.any(|candidate| candidate == entry), "seed {seed}");
        }
    }
}
