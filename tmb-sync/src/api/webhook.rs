//! Vendor callback endpoints
//!
//! TextMaster delivers two callback shapes: a per-document payload when a
//! document reaches the configured trigger status, and a project-level
//! payload enumerating job parts with their workflow stage. Both funnel
//! into the engine's event path; response codes are part of the vendor
//! contract (200 acknowledges, 400 asks the vendor to stop retrying a
//! malformed event, 404 marks an unknown document).

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::engine::{RemoteEvent, WorkflowLevel};
use crate::AppState;
use tmb_common::config::VendorKind;
use tmb_common::db;

/// Per-document callback payload.
#[derive(Debug, Deserialize)]
pub struct DocumentCallback {
    pub id: serde_json::Value,
    pub project_id: serde_json::Value,
    pub status: String,
    /// Pre-signed URL of the translated file, present once delivered
    pub author_work: Option<String>,
}

/// Project-level callback payload.
#[derive(Debug, Deserialize)]
pub struct ProjectCallback {
    #[serde(rename = "jobParts", default)]
    pub job_parts: Vec<JobPart>,
}

#[derive(Debug, Deserialize)]
pub struct JobPart {
    pub id: serde_json::Value,
    pub status: String,
    #[serde(rename = "workflowLevel")]
    pub workflow_level: i64,
    pub project: JobPartProject,
}

#[derive(Debug, Deserialize)]
pub struct JobPartProject {
    pub id: serde_json::Value,
    #[serde(rename = "lastWorkflowLevel")]
    pub last_workflow_level: i64,
}

fn id_string(value: &serde_json::Value, field: &str) -> ApiResult<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Err(ApiError::BadRequest(format!("payload field '{field}' is not an identifier"))),
    }
}

/// POST /webhook/textmaster
///
/// Applies one document status change. Answers 200 even when the
/// translated content could not be fetched; the failure is recorded
/// against the job and retried by polling.
pub async fn textmaster_document(
    State(state): State<AppState>,
    Json(payload): Json<DocumentCallback>,
) -> ApiResult<Json<serde_json::Value>> {
    let event = RemoteEvent {
        vendor: VendorKind::Textmaster,
        project_id: id_string(&payload.project_id, "project_id")?,
        document_id: id_string(&payload.id, "id")?,
        status: payload.status,
        download_url: payload.author_work,
        workflow: None,
    };
    info!(
        project_id = %event.project_id,
        document_id = %event.document_id,
        status = %event.status,
        "document callback received"
    );
    let outcome = state.engine.apply_remote_event(&event).await?;
    Ok(Json(json!({ "outcome": format!("{outcome:?}") })))
}

/// POST /webhook/textmaster/project
///
/// Applies each job part in order and stops at the first part that fails
/// lookup or validation; earlier parts stay applied. Parts are matched
/// against the project's mapping set: an unknown project and an unknown
/// document within a known project are distinct 404s.
pub async fn textmaster_project(
    State(state): State<AppState>,
    Json(payload): Json<ProjectCallback>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut applied = 0usize;
    for part in &payload.job_parts {
        let project_id = id_string(&part.project.id, "project.id")?;
        let document_id = id_string(&part.id, "id")?;

        let mappings = db::find_by_remote_project(
            &state.db,
            VendorKind::Textmaster.as_str(),
            &project_id,
        )
        .await?;
        if mappings.is_empty() {
            return Err(ApiError::NotFound(format!("Project {project_id} not found.")));
        }
        // Resubmission leaves historical rows; the last match is the newest
        if !mappings
            .iter()
            .any(|m| m.remote_document_id == document_id)
        {
            return Err(ApiError::NotFound(format!("File {document_id} not found.")));
        }

        let event = RemoteEvent {
            vendor: VendorKind::Textmaster,
            project_id,
            document_id,
            status: part.status.clone(),
            download_url: None,
            workflow: Some(WorkflowLevel {
                level: part.workflow_level,
                last_level: part.project.last_workflow_level,
            }),
        };
        state.engine.apply_remote_event(&event).await?;
        applied += 1;
    }
    Ok(Json(json!({ "applied": applied })))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/webhook/textmaster", post(textmaster_document))
        .route("/webhook/textmaster/project", post(textmaster_project))
}
