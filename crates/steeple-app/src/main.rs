//! Steeple - streaming relay fleet manager for fellowship organizations.
//!
//! Runs the HTTP API server over the SQLite-backed proxy repository. The
//! session system, health prober, and telemetry pipeline are separate
//! processes that talk to the same database.

use std::path::PathBuf;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use steeple_server::{Server, ServerConfig};
use steeple_storage::Database;

/// Steeple - streaming relay fleet manager
#[derive(Parser, Debug)]
#[command(name = "steeple", version, about)]
struct Args {
    /// Host to bind the API server to
    #[arg(long, default_value = steeple_server::DEFAULT_HOST)]
    host: String,

    /// Port to bind the API server to
    #[arg(long, default_value_t = steeple_server::DEFAULT_PORT)]
    port: u16,

    /// Database file path (defaults to the app data directory)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory for daily-rolling log files (console only when unset)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Initialize logging, optionally with file rotation.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("steeple={},warn", args.log_level)));

    if let Some(log_dir) = &args.log_dir {
        if std::fs::create_dir_all(log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("steeple")
                .filename_suffix("log")
                .build(log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }

        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        tracing::warn!("File logging unavailable, using console only");
        return None;
    }

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the guard alive so buffered log lines flush on shutdown.
    let _log_guard = init_logging(&args);

    tracing::info!("Starting Steeple...");

    let db = match &args.db_path {
        Some(path) => Database::with_path(path),
        None => Database::new(),
    }
    .map_err(|e| anyhow::anyhow!("Database error: {e}"))?;

    tracing::info!(proxies = db.count_proxies().unwrap_or(0), "Fleet loaded");

    let config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
        db_path: None,
    };

    let server = Server::with_database(config, db)?;
    tracing::info!("API listening on {}", server.addr());

    server.run().await?;

    tracing::info!("Steeple shutting down");
    Ok(())
}
