//! Follow an agent workflow run from the command line.
//!
//! Run with:
//!   cargo run -p follow-run -- --base-url https://agents.example.com/api \
//!       --token "$TOKEN" <workflow-id> <run-id>
//!
//! Messages are printed to stdout as JSON lines. With `--websocket`, each
//! stdin line of the form `<signal-name> [json]` is sent to the workflow as
//! a signal.

use std::sync::Arc;

use agent_stream_core::{AgentMessage, MessageType, RunHandle, StaticCredentials, StreamConfig};
use agent_stream_session::{
    Cleanup, CompletionHandle, ExitSignal, OnMessage, SignalChannel, StreamClient, StreamOutcome,
    on_message,
};
use anyhow::{Context, bail};
use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(about = "Stream the messages of an agent workflow run")]
struct Args {
    /// API base URL.
    #[arg(long, env = "AGENT_STREAM_BASE_URL")]
    base_url: String,

    /// Access token sent as the stream credential.
    #[arg(long, env = "AGENT_STREAM_TOKEN", hide_env_values = true)]
    token: String,

    workflow_id: String,

    run_id: String,

    /// Resume after this timestamp (Unix epoch milliseconds).
    #[arg(long)]
    since: Option<u64>,

    /// Stream over a WebSocket and read signals from stdin.
    #[arg(long)]
    websocket: bool,

    /// Stop once a message of this type arrives.
    #[arg(long, value_name = "TYPE")]
    exit_on: Option<String>,

    /// Reconnect attempts before giving up.
    #[arg(long)]
    max_reconnect_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = StreamConfig::new(&args.base_url).context("invalid --base-url")?;
    if let Some(attempts) = args.max_reconnect_attempts {
        config = config.with_max_reconnect_attempts(attempts);
    }
    if args.token.trim().is_empty() {
        bail!("--token must not be empty");
    }

    let client = StreamClient::new(config, Arc::new(StaticCredentials::new(args.token)));
    let run = RunHandle::new(args.workflow_id, args.run_id);
    let callback = printer(args.exit_on.as_deref().map(MessageType::from_wire));

    let (completion, cleanup) = if args.websocket {
        let handle = client
            .stream_messages_ws(run, callback, args.since)
            .await
            .context("failed to open the stream")?;
        tokio::spawn(forward_signals(handle.signals));
        (handle.completion, handle.cleanup)
    } else {
        let handle = client.stream_messages(run, callback, args.since);
        (handle.completion, handle.cleanup)
    };

    match wait(completion, &cleanup).await? {
        StreamOutcome::Completed(Some(payload)) => println!("{payload}"),
        StreamOutcome::Completed(None) => tracing::info!("Run finished"),
        StreamOutcome::Cancelled => tracing::info!("Interrupted"),
    }
    Ok(())
}

/// Print each message as a JSON line, exiting early on `exit_on`.
fn printer(exit_on: Option<MessageType>) -> Option<OnMessage> {
    on_message(move |message: AgentMessage, exit: &mut ExitSignal| {
        match serde_json::to_string(&message) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!("Failed to encode message: {e}"),
        }
        if exit_on == Some(message.kind) {
            exit.exit_with(serde_json::to_value(&message).unwrap_or(Value::Null));
        }
    })
}

/// Await the stream, cancelling it on Ctrl-C.
async fn wait(
    mut completion: CompletionHandle,
    cleanup: &Cleanup,
) -> anyhow::Result<StreamOutcome> {
    tokio::select! {
        result = &mut completion => return Ok(result?),
        signal = tokio::signal::ctrl_c() => signal.context("failed to listen for Ctrl-C")?,
    }
    cleanup.cleanup();
    Ok(completion.await?)
}

/// Send `<name> [json]` lines from stdin as signals.
async fn forward_signals(signals: SignalChannel) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read stdin: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, data) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let data = match data.trim() {
            "" => Value::Null,
            raw => match serde_json::from_str(raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(signal = name, "Ignoring signal with invalid JSON: {e}");
                    continue;
                }
            },
        };

        signals.send_signal(name, data);
    }
}
