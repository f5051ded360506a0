//! ssb-api library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod db;
pub mod error;
pub mod estimator;
pub mod extraction;
pub mod models;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use ssb_common::events::EventBus;

use crate::extraction::gateway_client::GatewayClient;
use crate::models::BillSession;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (savings goals)
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// The live bill session; exactly one exists at a time
    pub bill: Arc<RwLock<BillSession>>,
    /// AI gateway client for receipt extraction
    pub gateway: GatewayClient,
    /// Data folder holding ssb.db and uploads/
    pub data_folder: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        gateway: GatewayClient,
        data_folder: PathBuf,
    ) -> Self {
        Self {
            db,
            event_bus,
            bill: Arc::new(RwLock::new(BillSession::new())),
            gateway,
            data_folder,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Request body cap: a 5 MB receipt arrives base64-encoded in a JSON
/// envelope (4/3 inflation), so the transport limit sits above that and
/// the upload gate enforces the real cap on the decoded bytes.
const MAX_REQUEST_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::routing::get;
    use tower_http::cors::CorsLayer;

    Router::new()
        .merge(api::bill_routes())
        .merge(api::goal_routes())
        .merge(api::estimator_routes())
        .merge(api::health_routes())
        .route("/api/events", get(api::event_stream))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
