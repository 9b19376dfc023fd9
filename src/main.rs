// main.rs — taskd entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use taskd::config::TaskdConfig;
use taskd::rewards::catalog;
use taskd::storage::Storage;
use taskd::AppContext;

#[derive(Parser)]
#[command(name = "taskd", version, about = "Task-management API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API server (default).
    Serve {
        /// Path to config.toml.
        #[arg(long, env = "TASKD_CONFIG")]
        config: Option<PathBuf>,
        /// Override the REST port.
        #[arg(long)]
        port: Option<u16>,
        /// Override the data directory.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Emit JSON log lines.
        #[arg(long)]
        json_logs: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Serve {
            config,
            port,
            data_dir,
            json_logs,
        }) => run_serve(config, port, data_dir, json_logs).await,
        None => run_serve(None, None, None, false).await,
    }
}

fn init_logging(json: bool) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sqlx=warn".to_string());
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}

async fn run_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    json_logs: bool,
) -> Result<()> {
    let mut config = TaskdConfig::load(config_path.as_deref())?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(data_dir) = data_dir {
        config.database.data_dir = data_dir;
    }
    if json_logs {
        config.server.json_logs = true;
    }

    init_logging(config.server.json_logs);

    if config.auth.jwt_secret.is_empty() {
        anyhow::bail!("auth.jwt_secret must be set (config file or TASKD_JWT_SECRET)");
    }

    info!(
        data_dir = %config.database.data_dir.display(),
        "starting taskd v{}",
        env!("CARGO_PKG_VERSION")
    );

    let storage = Storage::new_with_slow_query(
        &config.database.data_dir,
        config.database.slow_query_threshold_ms,
    )
    .await?;

    // One-time idempotent catalog seed; the evaluator treats it as read-only.
    catalog::seed(&storage.pool()).await?;

    let ctx = Arc::new(AppContext::new(config, storage));
    taskd::rest::start_rest_server(ctx).await
}
