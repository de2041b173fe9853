mod cli;
mod commands;
mod completions;
mod config;
mod error;
mod output;
mod render;
mod setup;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::CliConfig;
use parley_storage::paths;
use setup::prepare_client;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = CliConfig::load();
    // Held until exit so buffered log lines are flushed.
    let _guard = init_logging(cli.verbose)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting parley");

    match run(cli, &config).await {
        Ok(code) => Ok(code),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Command failed");
            Ok(error::handle_error(err))
        }
    }
}

/// Log to a daily file: the terminal belongs to the conversation.
fn init_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = paths::log_dir()?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "parley.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    Ok(guard)
}

async fn run(cli: Cli, config: &CliConfig) -> Result<ExitCode> {
    let format = cli.format;
    let connect = || prepare_client(config, cli.base_url.as_deref());

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Completions { shell } => {
            completions::generate_completions(shell);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Chat => commands::chat::run(&connect()?).await,
        Commands::Send(args) => commands::send::run(&connect()?, &args, format).await,
        Commands::Health => commands::session::health(&connect()?, format).await,
        Commands::Reset => commands::session::reset(&connect()?, format).await,
        Commands::NewSession => commands::session::new_session(&connect()?, format).await,
        Commands::History => commands::session::history(&connect()?, format).await,
    }
}
