use anyhow::{Context, Result};
use arubacloud_provider::server::Server;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `arubacloud_provider=trace`
const LOG_ENV: &str = "ARUBACLOUD_PROVIDER_LOG";

/// Aruba Cloud infrastructure-as-code provider plugin
#[derive(Parser, Debug)]
#[command(name = "arubacloud-provider", version, about, long_about = None)]
struct Args {
    /// Log level; overrides ARUBACLOUD_PROVIDER_LOG
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn setup_logging(args: &Args) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = match args.log_level {
        Some(level) => EnvFilter::new(level.as_directive()),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    // Stdout carries the protocol, so logs never go there
    let (non_blocking, guard) = match &args.log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {:?}", parent))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        "{} provider {} started",
        arubacloud_provider::PROVIDER_NAME,
        arubacloud_provider::VERSION
    );
    if let Some(path) = &args.log_file {
        tracing::info!("Log file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(&args)?;

    let server = Arc::new(Server::new());
    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("Provider protocol loop failed")?;

    tracing::info!("provider stopped");
    Ok(())
}
