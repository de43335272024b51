//! Pull endpoint
//!
//! Polling counterpart to the webhook path, for deployments whose service
//! is not reachable from the vendor. Walks every active job item of every
//! configured translator.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::api::error::ApiResult;
use crate::engine::PullReport;
use crate::AppState;

/// POST /api/pull
pub async fn pull_all(State(state): State<AppState>) -> ApiResult<Json<PullReport>> {
    let report = state.engine.pull_all().await?;
    Ok(Json(report))
}

/// POST /api/jobs/:id/pull
pub async fn pull_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> ApiResult<Json<PullReport>> {
    let report = state.engine.pull_job(job_id).await?;
    Ok(Json(report))
}

pub fn pull_routes() -> Router<AppState> {
    Router::new()
        .route("/api/pull", post(pull_all))
        .route("/api/jobs/:id/pull", post(pull_job))
}
