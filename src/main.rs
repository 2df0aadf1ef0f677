#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use turnguard::config::Config;
use turnguard::hooks::builtin::debug_logger::{RequestSummary, ResponseSummary};
use turnguard::hooks::{create_runner, HookContext, HookResult};
use turnguard::observability::{create_observer, MultiObserver, Observer, RecordingObserver};
use turnguard::session::{
    declared_tool_call_ids, extract_messages, reconcile_payload, satisfies_linkage, RequestShape,
};

/// `turnguard` - keep tool-call transcripts valid before they reach the model.
#[derive(Parser, Debug)]
#[command(name = "turnguard")]
#[command(version)]
#[command(about = "Request interceptors for tool-augmented chat transcripts.", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.turnguard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the transcript in a request payload and print the result
    Repair {
        /// JSON payload file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Describe a request or response payload
    Inspect {
        /// JSON payload file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Drive the full hook pipeline with a JSONL script of host events
    Run {
        /// JSONL script file (reads stdin when omitted)
        file: Option<PathBuf>,
    },
}

/// One line of a `run` script.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ScriptEvent {
    SessionCreated {
        #[serde(default)]
        session_id: Option<String>,
    },
    BeforeSend {
        payload: Value,
    },
    AfterReceive {
        payload: Value,
    },
    SessionEnd,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging - respects RUST_LOG env var, defaults to INFO.
    // Logs go to stderr so stdout stays machine-readable.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load_or_default(&config_path)?;

    match cli.command {
        Commands::Repair { file } => repair(&config, &read_input(file.as_deref()).await?),
        Commands::Inspect { file } => inspect(&read_input(file.as_deref()).await?),
        Commands::Run { file } => run_script(&config, &read_input(file.as_deref()).await?).await,
    }
}

async fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn parse_payload(input: &str) -> Result<Value> {
    serde_json::from_str(input).context("Input is not valid JSON")
}

fn repair(config: &Config, input: &str) -> Result<()> {
    let payload = parse_payload(input)?;
    if RequestShape::of(&payload) == RequestShape::Opaque {
        warn!("payload carries no transcript; printing it unchanged");
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let (out, report) = reconcile_payload(payload, config.repair.duplicate_results)?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    eprintln!(
        "orphaned results removed: {}, placeholder results added: {}, duplicates removed: {}",
        report.orphaned_results.len(),
        report.missing_results.len(),
        report.deduplicated_results.len()
    );
    Ok(())
}

fn inspect(input: &str) -> Result<()> {
    let payload = parse_payload(input)?;
    println!("Shape:          {:?}", RequestShape::of(&payload));

    let request = RequestSummary::of(&payload);
    if let Some(preview) = &request.preview {
        println!("Message:        {preview} ({} chars)", request.length);
    }
    if let Some(model) = &request.model {
        println!("Model:          {model}");
    }
    if let Some(tools) = request.tools {
        println!("Tools:          {tools}");
    }

    if let Some(messages) = extract_messages(&payload)? {
        println!("Transcript:     {} messages", messages.len());
        println!("Tool calls:     {}", declared_tool_call_ids(&messages).len());
        println!("Tool results:   {}", request.tool_results);
        println!(
            "Linkage:        {}",
            if satisfies_linkage(&messages) {
                "ok"
            } else {
                "broken (run `turnguard repair`)"
            }
        );
    }

    let response = ResponseSummary::of(&payload);
    if let Some(error) = &response.error {
        println!("Error:          {error}");
    }
    if let Some(kind) = &response.response_type {
        println!("Type:           {kind}");
    }
    if let Some(content) = &response.content_preview {
        println!("Content:        {content} ({} chars)", response.content_length);
    }
    if !response.tool_calls.is_empty() {
        println!("Response tools: {}", response.tool_calls.join(", "));
    }
    Ok(())
}

fn parse_script(input: &str) -> Result<Vec<ScriptEvent>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid event on line {}", n + 1))
        })
        .collect()
}

fn print_outcome(event: &str, outcome: HookResult<Value>) -> Result<()> {
    let line = match outcome {
        HookResult::Continue(payload) => json!({"event": event, "payload": payload}),
        HookResult::Cancel(reason) => json!({"event": event, "cancelled": reason}),
    };
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

async fn run_script(config: &Config, input: &str) -> Result<()> {
    let events = parse_script(input)?;
    let observer = create_observer(&config.observability);
    let runner = create_runner(config, observer.clone());
    info!(hooks = ?runner.handler_names(), events = events.len(), "running script");

    runner.fire_load().await;
    let mut ctx = HookContext::new();
    for event in events {
        match event {
            ScriptEvent::SessionCreated { session_id } => {
                ctx.session_id = session_id;
                runner.fire_session_created(&ctx).await;
            }
            ScriptEvent::BeforeSend { payload } => {
                print_outcome("before_send", runner.run_before_send(&ctx, payload).await)?;
            }
            ScriptEvent::AfterReceive { payload } => {
                print_outcome("after_receive", runner.run_after_receive(&ctx, payload).await)?;
            }
            ScriptEvent::SessionEnd => runner.fire_session_end(&ctx).await,
        }
    }
    runner.fire_unload().await;

    if let Some(counts) = recorded_counts(observer.as_ref()) {
        println!("{}", serde_json::to_string(&json!({"event": "summary", "observed": counts}))?);
    }
    Ok(())
}

/// Event counts held by a recording backend, if one is configured.
fn recorded_counts(observer: &dyn Observer) -> Option<Value> {
    if let Some(recorder) = observer.as_any().downcast_ref::<RecordingObserver>() {
        return serde_json::to_value(recorder.event_counts()).ok();
    }
    observer
        .as_any()
        .downcast_ref::<MultiObserver>()?
        .observers()
        .iter()
        .find_map(|child| recorded_counts(child.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["turnguard", "repair", "payload.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Repair { file: Some(ref p) } if p == Path::new("payload.json")
        ));

        let cli = Cli::try_parse_from(["turnguard", "run", "--config", "/tmp/c.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { file: None }));
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/c.toml")));
    }

    #[test]
    fn script_parsing_skips_blanks_and_comments() {
        let script = r#"
# a short session
{"event": "session_created", "session_id": "s-1"}
{"event": "before_send", "payload": {"message": "hi"}}

{"event": "after_receive", "payload": {"content": "hello"}}
{"event": "session_end"}
"#;
        let events = parse_script(script).unwrap();
        assert_eq!(
            events,
            vec![
                ScriptEvent::SessionCreated {
                    session_id: Some("s-1".into())
                },
                ScriptEvent::BeforeSend {
                    payload: json!({"message": "hi"})
                },
                ScriptEvent::AfterReceive {
                    payload: json!({"content": "hello"})
                },
                ScriptEvent::SessionEnd,
            ]
        );
    }

    #[test]
    fn script_parsing_reports_line_numbers() {
        let err = parse_script("{\"event\": \"session_end\"}\n{\"event\": \"explode\"}")
            .unwrap_err()
            .to_string();
        assert!(err.contains("line 2"), "{err}");
    }

    #[tokio::test]
    async fn recorder_counts_are_reported() {
        let recorder = RecordingObserver::new();
        recorder.record_event(&turnguard::observability::ObserverEvent::ReplayUnavailable);
        recorder.record_event(&turnguard::observability::ObserverEvent::ReplayUnavailable);
        assert_eq!(
            recorded_counts(&recorder),
            Some(json!({"replay_unavailable": 2}))
        );

        let config = turnguard::config::ObservabilityConfig {
            backend: "log,memory".into(),
        };
        let multi = create_observer(&config);
        let runner = create_runner(&Config::default(), multi.clone());
        runner.fire_load().await;
        let counts = recorded_counts(multi.as_ref()).unwrap();
        assert_eq!(counts["hook_loaded"], 3);

        assert!(recorded_counts(&turnguard::observability::NoopObserver).is_none());
    }

    #[test]
    fn session_created_without_id() {
        let events = parse_script(r#"{"event": "session_created"}"#).unwrap();
        assert_eq!(events, vec![ScriptEvent::SessionCreated { session_id: None }]);
    }
}
