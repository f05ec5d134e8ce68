//! Observer TUI Entry Point
//!
//! Replays a recorded conversation event log in a full-screen terminal view.
//!
//! Usage:
//!   observer-tui [OPTIONS] <FILE>
//!
//! Logs go to a file since the terminal belongs to the UI.

use std::fs::File;
use std::io;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use observer_core::{load_config, load_config_from_path, ConfigOverrides};
use observer_tui::App;

/// Watch a recorded two-agent conversation
#[derive(Parser, Debug)]
#[command(name = "observer-tui")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Event log (one JSON frame per line)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Configuration file path
    #[arg(short = 'c', long, env = "OBSERVER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Never request an autostart on connect
    #[arg(long)]
    no_auto_start: bool,

    /// Delay between replayed frames in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Log file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("observer_tui=info,observer_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_path = args
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("observer-tui.log"));
    init_logging(&log_path)?;

    let mut config = match &args.config {
        Some(path) => load_config_from_path(Some(path.clone())),
        None => load_config(),
    }
    .context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if args.no_auto_start {
        overrides = overrides.with_auto_start(false);
    }
    if let Some(ms) = args.interval_ms {
        overrides = overrides.with_replay_interval_ms(ms);
    }
    overrides.apply(&mut config);
    tracing::info!(source = %config.source(), log = %log_path.display(), "Configuration loaded");

    let log = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read event log: {}", args.file.display()))?;
    let frames: Vec<String> = log.lines().map(str::to_owned).collect();

    // Check if we have a TTY before attempting initialization
    use std::io::IsTerminal;

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("Error: observer-tui requires a terminal (TTY)");
        eprintln!("Use observer-replay for headless replays.");
        std::process::exit(1);
    }

    // Restore terminal before printing a panic
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = App::new(config, frames);
    let result = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
