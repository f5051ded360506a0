//! ssb-api - squad save bot core service
//!
//! Savings goals, bill splitting with AI receipt extraction, and the
//! work-time estimator behind one local HTTP + SSE surface.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ssb_common::config::{self, GatewayConfig};
use ssb_common::events::EventBus;

use ssb_api::extraction::gateway_client::GatewayClient;
use ssb_api::AppState;

/// Command-line arguments for ssb-api
#[derive(Parser, Debug)]
#[command(name = "ssb-api")]
#[command(about = "squad save bot core service")]
#[command(version)]
struct Args {
    /// Port to listen on (falls back to SSB_PORT, then the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Data folder for the database and uploaded receipts
    /// (falls back to SSB_DATA_FOLDER, then the config file)
    #[arg(short, long)]
    data_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ssb_api=info,ssb_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting ssb-api (squad save bot core service)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve and prepare the data folder (CLI → env → config file → OS default)
    let data_folder = config::resolve_data_folder(args.data_folder.as_deref());
    config::ensure_data_folder(&data_folder)
        .with_context(|| format!("Failed to initialize data folder {}", data_folder.display()))?;
    info!("Data folder: {}", data_folder.display());

    let port = config::resolve_port(args.port);

    // Open or create the database
    let db_path = data_folder.join("ssb.db");
    info!("Database: {}", db_path.display());
    let db_pool = ssb_api::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Event bus for SSE broadcasting
    let event_bus = EventBus::new(100); // 100 event capacity
    info!("Event bus initialized");

    // Gateway client for receipt extraction
    let gateway_config = GatewayConfig::load();
    if gateway_config.api_key.is_none() {
        warn!(
            "No gateway API key configured ({} unset); receipt extraction will fail until it is set",
            config::GATEWAY_API_KEY_ENV
        );
    }
    let gateway = GatewayClient::new(&gateway_config);

    let state = AppState::new(db_pool, event_bus, gateway, data_folder);

    let app = ssb_api::build_router(state);

    // Start server
    let bind_addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/api/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
