//! Hotelier CLI - back office for the hotel management API

mod commands;
mod logging;
mod shell;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use commands::Commands;
use hotelier_core::HotelierConfig;
use hotelier_session::BackOffice;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "hotelier")]
#[command(about = "Back office for the hotel management API")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(short = 'c', long, global = true, env = "HOTELIER_CONFIG")]
    config: Option<PathBuf>,

    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Data directory for the persisted session and logs
    #[arg(short = 'd', long, global = true, env = "HOTELIER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Timeout for one-shot commands in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "60")]
    timeout: u64,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.log_level.into(), cli.data_dir.clone(), cli.no_file_log)?;

    let mut config = HotelierConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(data_dir) = &cli.data_dir {
        config = config.with_data_dir(data_dir);
    }
    debug!(base_url = %config.api.base_url, token_file = %config.storage.token_file.display(), "configuration loaded");

    let office = BackOffice::connect(&config).context("failed to set up the API client")?;

    let result = if cli.timeout == 0 || cli.command.is_interactive() {
        cli.command.execute(&office, &config).await
    } else {
        let timeout_duration = Duration::from_secs(cli.timeout);
        match tokio::time::timeout(timeout_duration, cli.command.execute(&office, &config)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "Command timed out after {} seconds",
                cli.timeout
            )),
        }
    };

    office.shutdown();

    if let Err(e) = result {
        error!("Command failed: {e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
