use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use runwatch::config::Config;
use runwatch::domain::{RunState, RunStatus, StepEvent, StepStatus};
use runwatch::history::{HistoryStore, SavedRun};
use runwatch::progress::{LoopOutcome, ProgressScope, ProgressView};
use runwatch::report::{collect_highlights, group_by_category};
use runwatch::transport::{BackendClient, LongPollTransport, SnapshotTransport, Transport};

fn setup_logging(level: &str) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("runwatch")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("runwatch.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Watch { run_key, snapshot } => handle_watch_command(run_key, *snapshot, config).await,
        Commands::Start {
            payload,
            no_watch,
            snapshot,
        } => handle_start_command(payload, *no_watch, *snapshot, config).await,
        Commands::History { limit } => handle_history_command(*limit, config),
        Commands::Show { run_key } => handle_show_command(run_key, config),
    }
}

fn build_transport(config: &Config, snapshot: bool) -> Result<Arc<dyn Transport>> {
    let client = BackendClient::new(config.backend.clone()).context("Failed to create backend client")?;
    let transport: Arc<dyn Transport> = if snapshot {
        Arc::new(SnapshotTransport::new(client))
    } else {
        Arc::new(LongPollTransport::new(client, config.poll.wait_secs))
    };
    Ok(transport)
}

async fn handle_start_command(payload: &Path, no_watch: bool, snapshot: bool, config: &Config) -> Result<()> {
    info!("Starting run from payload: {}", payload.display());
    let content = fs::read_to_string(payload).context(format!("Failed to read {}", payload.display()))?;
    let body: serde_json::Value = serde_json::from_str(&content).context("Payload is not valid JSON")?;

    let client = BackendClient::new(config.backend.clone()).context("Failed to create backend client")?;
    let run_key = client.start_run(&body).await.context("Failed to start run")?;
    println!("{} {}", "Started:".green(), run_key.bold());

    if no_watch {
        return Ok(());
    }
    handle_watch_command(&run_key, snapshot, config).await
}

async fn handle_watch_command(run_key: &str, snapshot: bool, config: &Config) -> Result<()> {
    info!("Watching run {} (snapshot: {})", run_key, snapshot);
    if run_key.trim().is_empty() {
        eyre::bail!("Run key must not be empty");
    }
    let transport = build_transport(config, snapshot)?;
    let mut scope = ProgressScope::new(transport, &config.poll).context("Invalid poll configuration")?;
    let mut rx = scope.subscribe();

    println!("{} {}", "Watching:".cyan(), run_key.bold());
    scope.watch(run_key);

    let mut printed = 0usize;
    let mut last_error: Option<String> = None;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let view = loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break scope.snapshot();
                }
                let view = rx.borrow_and_update().clone();
                render_progress(&view, &mut printed, &mut last_error);
                if view.is_finished() {
                    break view;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted while watching {}", run_key);
                scope.clear();
                println!("{}", "Interrupted, stopped watching".yellow());
                return Ok(());
            }
        }
    };

    let outcome = scope.wait_finished().await;
    info!("Run {} ended: {:?}", run_key, outcome);

    match outcome {
        Some(LoopOutcome::Stalled) => println!("{}", "No new steps for a while, treating run as finished".yellow()),
        Some(LoopOutcome::TimedOut) => println!("{}", "Watch time limit reached, treating run as finished".yellow()),
        Some(LoopOutcome::Failed(message)) => {
            println!("{} {}", "Stopped:".red(), message);
        }
        _ => {}
    }

    if let Some(data) = view.data {
        print_summary(&data);
        if data.is_terminal() {
            let store = HistoryStore::open(&config.history.dir, config.history.max_entries)
                .context("Failed to open history")?;
            store
                .save(SavedRun::new(run_key, data))
                .context("Failed to save run to history")?;
            info!("Saved run {} to {}", run_key, store.path().display());
        }
    }
    Ok(())
}

fn render_progress(view: &ProgressView, printed: &mut usize, last_error: &mut Option<String>) {
    if let Some(data) = &view.data {
        for step in data.steps.iter().skip(*printed) {
            print_step(step);
        }
        *printed = data.steps.len();
    }

    if view.error != *last_error {
        if let Some(error) = &view.error {
            println!("{} {}", "Error:".red(), error);
        }
        *last_error = view.error.clone();
    }
}

fn print_step(step: &StepEvent) {
    let marker = match step.status {
        StepStatus::Success => "✓".green(),
        StepStatus::Error => "✗".red(),
        StepStatus::Running => "…".yellow(),
    };
    match &step.message {
        Some(message) => println!("  {} {} {}", marker, step.name, message.dimmed()),
        None => println!("  {} {}", marker, step.name),
    }
}

fn status_label(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Completed => status.as_str().green(),
        RunStatus::Error => status.as_str().red(),
        RunStatus::Running => status.as_str().yellow(),
    }
}

fn print_summary(data: &RunState) {
    println!();
    println!("{} {}", "Status:".bold(), status_label(data.status));
    println!("{} {}", "Steps:".bold(), data.steps.len());
    if let Some(duration) = data.duration() {
        println!("{} {}s", "Duration:".bold(), duration.num_seconds());
    }
    print_highlights(&data.steps);
}

fn print_highlights(steps: &[StepEvent]) {
    let highlights = collect_highlights(steps);
    if highlights.is_empty() {
        return;
    }
    println!("{}", "Identifiers:".bold());
    for (key, values) in highlights.iter() {
        println!("  {:<10} {}", key.to_string().cyan(), values.join(", "));
    }
}

fn handle_history_command(limit: usize, config: &Config) -> Result<()> {
    info!("Listing saved runs (limit {})", limit);
    let store = HistoryStore::open(&config.history.dir, config.history.max_entries).context("Failed to open history")?;
    let runs = store.load().context("Failed to read history")?;

    if runs.is_empty() {
        println!("{}", "No saved runs".yellow());
        return Ok(());
    }

    for run in runs.iter().take(limit) {
        println!(
            "{}  {}  {:<9}  {} steps",
            run.saved_at.format("%Y-%m-%d %H:%M:%S"),
            run.run_key.bold(),
            status_label(run.data.status),
            run.data.steps.len()
        );
    }
    Ok(())
}

fn handle_show_command(run_key: &str, config: &Config) -> Result<()> {
    info!("Showing saved run {}", run_key);
    let store = HistoryStore::open(&config.history.dir, config.history.max_entries).context("Failed to open history")?;
    let run = store.get(run_key).context("Failed to load saved run")?;

    println!("{} {}", "Run:".green(), run.run_key.bold());
    println!("{} {}", "Saved:".bold(), run.saved_at.to_rfc3339());
    for (category, steps) in group_by_category(&run.data.steps) {
        println!("{}", category.to_string().cyan().bold());
        for step in steps {
            print_step(step);
        }
    }
    print_summary(&run.data);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = if cli.is_verbose() {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };
    setup_logging(level).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
