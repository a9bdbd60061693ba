//! cg-server library interface
//!
//! Exposes the router, state and services for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::SessionRuntime;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Running sessions and the tools they launch
    pub runtime: SessionRuntime,
    /// Shared key required by the scheduler endpoints
    pub scheduler_key: Arc<String>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(runtime: SessionRuntime, scheduler_key: String) -> Self {
        Self {
            db: runtime.pool.clone(),
            runtime,
            scheduler_key: Arc::new(scheduler_key),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember an error for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::settings_routes())
        .merge(api::session_routes())
        .merge(api::lifecycle_routes())
        .merge(api::record_routes())
        .merge(api::scheduler_routes())
        .merge(api::reference_routes())
        .merge(api::paypal_routes())
        .merge(api::ebay_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
