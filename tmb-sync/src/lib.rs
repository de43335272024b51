//! tmb-sync library - vendor synchronization service
//!
//! Bridges local translation jobs to external vendor platforms: submits
//! job content as XLIFF, tracks the remote project/document identifiers,
//! and reconciles vendor status changes back into local job state via
//! webhooks or polling.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;

pub mod api;
pub mod engine;
pub mod vendor;

use engine::Engine;
use vendor::VendorRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub registry: Arc<VendorRegistry>,
    pub engine: Engine,
}

impl AppState {
    pub fn new(db: SqlitePool, registry: Arc<VendorRegistry>) -> Self {
        let engine = Engine::new(db.clone(), registry.clone());
        Self { db, registry, engine }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health::health_routes())
        .merge(api::webhook::webhook_routes())
        .merge(api::jobs::job_routes())
        .merge(api::pull::pull_routes())
        .with_state(state)
}
