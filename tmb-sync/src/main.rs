//! tmb-sync - translation vendor synchronization service

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tmb_common::config::Config;
use tmb_common::db::init::init_database;
use tmb_sync::vendor::VendorRegistry;
use tmb_sync::{build_router, AppState};
use tracing::info;

#[derive(Parser)]
#[command(name = "tmb-sync", version, about = "Translation vendor synchronization service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting tmb-sync v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    info!(
        "Loaded {} translator(s): {}",
        config.translators.len(),
        config
            .translators
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let pool = init_database(&config.database.path).await?;
    info!("Database ready at {}", config.database.path.display());

    let registry = Arc::new(VendorRegistry::from_config(&config)?);

    let state = AppState::new(pool, registry);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("tmb-sync listening on http://{}", config.server.bind);
    info!("Health check: http://{}/health", config.server.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
