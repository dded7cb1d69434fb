//! tokengate - sign in, sign out and inspect the current session from a terminal.

mod args;
mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use args::Command;
use commands::Context;
use tokengate_core::Config;

/// Prefix for daily-rolled log files
const LOG_FILE_PREFIX: &str = "tokengate.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, args::USAGE);
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        print!("{}", args::USAGE);
        return Ok(());
    }

    let (mut config, config_error) = match Config::load() {
        Ok(c) => (c, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_env()?;

    let _log_guard = init_tracing(config.log_dir.as_deref());
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!(?command, "tokengate starting");

    let mut ctx = Context::build(config)?;

    match command {
        Command::Status => commands::status(&ctx),
        Command::Login { username, remember } => {
            commands::login(&mut ctx, username, remember).await?
        }
        Command::Logout { forget } => commands::logout(&ctx, forget)?,
        Command::Refresh => commands::refresh(&ctx).await?,
        Command::Profile => commands::profile(&ctx).await?,
        Command::Open { path } => commands::open(&ctx, &path),
        Command::Help => print!("{}", args::USAGE),
    }

    Ok(())
}
