//! Job lifecycle endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use crate::api::error::ApiResult;
use crate::AppState;
use tmb_common::{db, xliff};

/// POST /api/jobs/:id/submit
pub async fn submit_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let job_state = state.engine.submit_job(job_id).await?;
    Ok(Json(json!({ "job_id": job_id, "state": job_state.as_str() })))
}

/// POST /api/jobs/:id/abort
pub async fn abort_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let aborted = state.engine.abort_job(job_id).await?;
    Ok(Json(json!({ "job_id": job_id, "aborted": aborted })))
}

#[derive(Debug, Serialize)]
pub struct JobDetail {
    pub id: i64,
    pub label: String,
    pub translator: String,
    pub source_langcode: String,
    pub target_langcode: String,
    pub state: String,
    pub items: Vec<JobItemSummary>,
    pub messages: Vec<MessageSummary>,
}

#[derive(Debug, Serialize)]
pub struct JobItemSummary {
    pub id: i64,
    pub label: String,
    pub state: String,
    pub word_count: i64,
    /// Translated fields in the host's nested shape, empty until imported
    pub translations: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct MessageSummary {
    pub severity: String,
    pub message: String,
    pub created_at: String,
}

/// GET /api/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> ApiResult<Json<JobDetail>> {
    let job = db::load_job(&state.db, job_id).await?;
    let items = db::load_job_items(&state.db, job_id).await?;
    let messages = db::load_job_messages(&state.db, job_id).await?;

    Ok(Json(JobDetail {
        id: job.id,
        label: job.label,
        translator: job.translator,
        source_langcode: job.source_langcode,
        target_langcode: job.target_langcode,
        state: job.state.as_str().to_string(),
        items: items
            .into_iter()
            .map(|item| {
                let translated: std::collections::BTreeMap<String, String> = item
                    .data
                    .iter()
                    .filter_map(|(key, d)| {
                        d.translation.as_ref().map(|t| (key.clone(), t.clone()))
                    })
                    .collect();
                JobItemSummary {
                    id: item.id,
                    label: item.label,
                    state: item.state.as_str().to_string(),
                    word_count: item.word_count,
                    translations: xliff::unflatten(&translated),
                }
            })
            .collect(),
        messages: messages
            .into_iter()
            .map(|m| MessageSummary {
                severity: m.severity,
                message: m.message,
                created_at: m.created_at,
            })
            .collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct TranslatorSummary {
    pub name: String,
    pub vendor: String,
    pub available: bool,
}

/// GET /api/translators
///
/// Lists configured translators with a live credential probe.
pub async fn list_translators(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TranslatorSummary>>> {
    let mut translators = Vec::new();
    for name in state.registry.translator_names() {
        let adapter = state.registry.resolve(&name)?;
        translators.push(TranslatorSummary {
            vendor: adapter.vendor().as_str().to_string(),
            available: adapter.check_available().await,
            name,
        });
    }
    Ok(Json(translators))
}

#[derive(Debug, Serialize)]
pub struct RemoteLanguage {
    pub code: String,
    pub label: String,
}

/// GET /api/translators/:name/languages
pub async fn remote_languages(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<RemoteLanguage>>> {
    let adapter = state.registry.resolve(&name)?;
    let languages = adapter.supported_remote_languages().await?;
    Ok(Json(
        languages
            .into_iter()
            .map(|(code, label)| RemoteLanguage { code, label })
            .collect(),
    ))
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/api/jobs/:id", get(get_job))
        .route("/api/jobs/:id/submit", post(submit_job))
        .route("/api/jobs/:id/abort", post(abort_job))
        .route("/api/translators", get(list_translators))
        .route("/api/translators/:name/languages", get(remote_languages))
}
