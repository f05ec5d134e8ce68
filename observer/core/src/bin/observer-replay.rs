//! Observer Replay - Headless Event Log Replay
//!
//! Feeds a recorded event log through the reconciliation core and prints the
//! final state as JSON. Every render instruction is logged at debug level.
//!
//! # Usage
//!
//! ```bash
//! # Replay a recorded session
//! observer-replay session.jsonl
//!
//! # Read frames from stdin
//! cat session.jsonl | observer-replay -
//!
//! # Watch render instructions
//! RUST_LOG=observer_core=debug observer-replay session.jsonl
//! ```
//!
//! Each line of the log is one frame: `{"event": "<name>", "data": {...}}`.
//! A `connect` is dispatched before the first frame.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use observer_core::{
    load_config, load_config_from_path, ConfigOverrides, Dispatch, EventRouter, LogSurface,
    Observer, OutboundEvent,
};

/// Replay a recorded observer event log headlessly
#[derive(Parser, Debug)]
#[command(name = "observer-replay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Event log (one JSON frame per line); `-` or absent reads stdin
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "OBSERVER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Never request an autostart on connect
    #[arg(long)]
    no_auto_start: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

/// Tally of dispatch outcomes
#[derive(Debug, Default)]
struct ReplayStats {
    applied: usize,
    ignored: usize,
    dropped: usize,
}

impl ReplayStats {
    fn record(&mut self, outcome: Dispatch) {
        match outcome {
            Dispatch::Applied => self.applied += 1,
            Dispatch::Ignored => self.ignored += 1,
            Dispatch::Dropped => self.dropped += 1,
        }
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "observer_replay={level},observer_core={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

async fn open_input(input: Option<&PathBuf>) -> Result<Box<dyn AsyncBufRead + Unpin>> {
    match input {
        Some(path) if path.as_os_str() != "-" => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open event log: {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

fn drain_outbound(rx: &mut mpsc::UnboundedReceiver<OutboundEvent>) {
    while let Ok(event) = rx.try_recv() {
        match serde_json::to_string(&event) {
            Ok(frame) => info!(frame = %frame, "Outbound event"),
            Err(e) => warn!(event = event.name(), error = %e, "Outbound event not encodable"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = match &args.config {
        Some(path) => load_config_from_path(Some(path.clone())),
        None => load_config(),
    }
    .context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if args.no_auto_start {
        overrides = overrides.with_auto_start(false);
    }
    overrides.apply(&mut config);
    info!(source = %config.source(), auto_start = config.auto_start, "Configuration loaded");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut router = EventRouter::new(Observer::new(LogSurface::new(), config, tx));
    let mut stats = ReplayStats::default();

    stats.record(router.dispatch("connect", Value::Null));
    drain_outbound(&mut rx);

    let mut lines = open_input(args.input.as_ref()).await?.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read event log")? {
        if let Some(outcome) = router.handle_line(&line) {
            stats.record(outcome);
        }
        drain_outbound(&mut rx);
    }

    let surface = router.observer().binder().surface();
    info!(
        applied = stats.applied,
        ignored = stats.ignored,
        dropped = stats.dropped,
        drawn = surface.drawn(),
        frames = surface.frames(),
        "Replay finished"
    );

    let snapshot = router.observer().snapshot();
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("Failed to encode snapshot")?
    );

    Ok(())
}
