#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::items_after_statements,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::needless_pass_by_value,
    clippy::redundant_closure_for_method_calls,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_literal_bound,
    clippy::unused_self,
    clippy::cast_precision_loss
)]

//! Interceptors that keep an assistant's outbound LLM requests well formed.
//!
//! The host calls into a [`hooks::HookRunner`] around every request. The
//! builtin handlers repair tool-call linkage in the transcript, cache the last
//! request for `/retry`, and collapse per-turn session notifications into true
//! session boundaries.

pub mod config;
pub mod hooks;
pub mod observability;
pub mod session;
pub mod util;

pub use config::Config;
pub use hooks::{create_runner, HookContext, HookHandler, HookResult, HookRunner};
