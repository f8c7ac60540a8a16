//! governd - lightweight service-governance daemon

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use govern_db::SqliteDatabase;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use governd::config::{Config, LoggingConfig};
use governd::Manager;

/// governd - service registration, health monitoring, and membership
/// notifications
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/governd.toml")]
    config: String,

    /// Port (overrides the config file)
    #[arg(short, long, env = "GOVERND_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    init_logging(&config.logging);

    info!("Starting governd v{}", env!("CARGO_PKG_VERSION"));

    let mut manager_config = config.manager_config();
    if let Some(port) = args.port {
        manager_config.server_port = port;
    }

    // Optional persistent mirror; the daemon runs cache-only without it
    let database: Option<Arc<dyn govern_db::DatabaseStore>> = if config.database.enabled {
        if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let url = format!("sqlite:{}?mode=rwc", config.database.path);
        let db = SqliteDatabase::new(&url)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        Some(Arc::new(db))
    } else {
        None
    };

    let mut manager = Manager::with_database(manager_config, database);

    if config.metrics.enabled {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install metrics recorder")?;
        manager = manager.with_metrics_handle(Arc::new(handle));
    }

    manager.start().await.context("Failed to start manager")?;

    shutdown_signal().await;
    manager.stop().await;

    info!("governd stopped");
    Ok(())
}

/// Initialize logging from the config layer; RUST_LOG wins when set
fn init_logging(config: &LoggingConfig) {
    if !config.enabled {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
