use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use presence_watchdog::app::{forward_changes, AlertLevel, AppEvent, Config, StateChange};
use presence_watchdog::logwatch::{PresenceState, PresenceWatchdog};

/// Presence Watchdog - follows the chat client's log and reports presence changes
#[derive(Parser)]
#[command(name = "presence-watchdog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Config file (defaults to ~/.config/presence-watchdog/config.toml)
    #[arg(short, long, env = "PRESENCE_WATCHDOG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the log and report every presence change (default)
    Watch {
        /// Chat client log file
        #[arg(long)]
        log_path: Option<PathBuf>,
        /// Seconds between refreshes
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Read the log once and print the current presence
    Check {
        /// Chat client log file
        #[arg(long)]
        log_path: Option<PathBuf>,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(log_file) = cli.log_file {
        config.log_file = Some(log_file);
    }

    init_logging(&config.log_level, config.log_file.as_deref())?;

    match cli.command {
        Some(Commands::Check { log_path, json }) => {
            if let Some(log_path) = log_path {
                config.log_path = log_path;
            }
            config.validate()?;
            run_check(&config, json)
        }
        Some(Commands::Config { init }) => {
            let path = match cli.config {
                Some(path) => path,
                None => Config::config_path()?,
            };
            if init {
                config.save_to(&path)?;
            }
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Commands::Watch { log_path, interval }) => {
            if let Some(log_path) = log_path {
                config.log_path = log_path;
            }
            if let Some(interval) = interval {
                config.poll_interval_secs = interval;
            }
            config.validate()?;
            run_watch(config)
        }
        None => {
            config.validate()?;
            run_watch(config)
        }
    }
}

fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(file))
                .init();
        }
        None => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    info!("Presence Watchdog starting");
    Ok(())
}

fn run_watch(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(watch(config))
}

async fn watch(config: Config) -> Result<()> {
    let watchdog = PresenceWatchdog::new(&config.log_path)?;
    let (tx, mut rx) = mpsc::channel::<AppEvent>(100);

    forward_changes(&watchdog, tx.clone());
    watchdog.start(config.poll_interval())?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(AppEvent::Quit).await;
        }
    });

    while let Some(event) = rx.recv().await {
        match event {
            AppEvent::PresenceChanged(change) => report_change(&change),
            AppEvent::Quit => break,
        }
    }

    watchdog.stop_and_wait().await;
    Ok(())
}

fn report_change(change: &StateChange) {
    info!(
        "Presence {} -> {} at {}",
        change.previous, change.current, change.observed_at
    );
    match change.message() {
        Some(message) => println!(
            "{} {} ({}) {}",
            change.alert.icon(),
            change.title(),
            change.observed_at.to_rfc3339(),
            message
        ),
        None => println!(
            "{} {} ({})",
            change.alert.icon(),
            change.title(),
            change.observed_at.to_rfc3339()
        ),
    }
}

fn run_check(config: &Config, json: bool) -> Result<()> {
    let watchdog = PresenceWatchdog::new(&config.log_path)?;
    watchdog
        .refresh()
        .with_context(|| format!("Failed to read {}", config.log_path.display()))?;

    let snapshot = watchdog.snapshot();
    let alert = AlertLevel::from_state(snapshot.current_state);

    if json {
        let output = serde_json::json!({
            "log_path": config.log_path,
            "snapshot": snapshot,
            "alert": alert,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if snapshot.current_state == PresenceState::Start {
        println!("No presence record found in {}", config.log_path.display());
    } else {
        println!(
            "{} {} since {}",
            alert.icon(),
            snapshot.current_state,
            snapshot.last_observed.to_rfc3339()
        );
    }

    Ok(())
}
