//! Daily Run API Server Binary

use clap::Parser;
use dailyrun::{
    api::ApiServer,
    config::{ArcadeConfig, StorageBackend},
    ArcadeService,
};
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dailyrun")]
#[command(about = "Provably fair daily mini-game server", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Override the RocksDB data directory
    #[arg(long)]
    data_dir: Option<String>,

    /// Keep everything in memory; nothing survives a restart
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ArcadeConfig::from_file(path)?,
        None => ArcadeConfig::default(),
    };
    config.apply_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(dir) = args.data_dir {
        config.storage.data_directory = dir;
    }
    if args.ephemeral {
        config.storage.backend = StorageBackend::Memory;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.monitoring.log_level.as_filter())),
        )
        .init();

    config.validate()?;
    if config.fairness.secret_key.is_dev_default() {
        warn!("Using the built-in development secret; set SERVER_SECRET before going live");
    }

    info!(
        backend = ?config.storage.backend,
        data_dir = %config.storage.data_directory,
        timezone = %config.fairness.timezone,
        "Starting daily run server"
    );

    let service = Arc::new(ArcadeService::from_config(&config)?);
    ApiServer::new(config.server.clone(), service).run().await
}
