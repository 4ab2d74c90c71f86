use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use kiosk_sync::cli::args::{Cli, Commands, OutputFormat};
use kiosk_sync::cli::commands;
use kiosk_sync::config::{ColorSetting, Config, LoggingConfig, Paths};
use kiosk_sync::error::KioskError;
use kiosk_sync::storage::Database;
use kiosk_sync::sync::{HttpCheckInRemote, QueueManager, QueueStore};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

fn run() -> Result<(), KioskError> {
    let cli = Cli::parse();

    // Completions need no data directory
    if let Commands::Completions { shell } = cli.command {
        print!("{}", commands::completions(shell)?);
        return Ok(());
    }

    let paths = match cli.home {
        Some(root) => Paths::with_root(root),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    let config = Config::load(&paths)?;
    init_logging(&config.logging);
    apply_color(config.general.color);
    let format = cli.output.unwrap_or(config.general.default_output);

    let store = QueueStore::with_database(Database::open_at(&paths.database)?);
    let remote = HttpCheckInRemote::from_config(&config.remote)?;
    let manager = Arc::new(QueueManager::from_config(
        store,
        Arc::new(remote),
        &config.queue,
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(dispatch(cli.command, manager, &config, format));
    // Stdin reads in `watch` cannot be cancelled; do not wait for them
    runtime.shutdown_background();
    let output = output?;

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

async fn dispatch(
    command: Commands,
    manager: Arc<QueueManager>,
    config: &Config,
    format: OutputFormat,
) -> Result<String, KioskError> {
    match command {
        Commands::Status => commands::status(&manager, format),
        Commands::List { conflicts } => commands::list(&manager, conflicts, format),
        Commands::Enqueue(args) => commands::enqueue(&manager, args, format),
        Commands::Flush { offline } => commands::flush(&manager, offline, format).await,
        Commands::Conflicts => commands::conflicts(&manager, format),
        Commands::Retry { id } => commands::retry(&manager, &id, format).await,
        Commands::Discard { id, force } => commands::discard(&manager, &id, force, format),
        Commands::Watch => commands::watch(manager, config.queue.tick_interval(), format).await,
        Commands::Clear { force } => commands::clear(&manager, force, format),
        Commands::Completions { shell } => commands::completions(shell),
    }
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` overrides the
/// configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn apply_color(setting: ColorSetting) {
    match setting {
        ColorSetting::Always => colored::control::set_override(true),
        ColorSetting::Never => colored::control::set_override(false),
        ColorSetting::Auto => {},
    }
}
