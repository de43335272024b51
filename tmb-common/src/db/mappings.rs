//! Remote mapping queries
//!
//! A mapping links one local job item to the vendor-side
//! (project, document) pair. Rows are created only after the remote
//! document exists, mutated as remote state changes, and deleted only as a
//! compensating rollback of a failed submission. Resubmission accumulates
//! historical rows; the newest row is authoritative.

use crate::db::models::RemoteMapping;
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Insert a mapping for a freshly created remote document.
///
/// Refuses with [`Error::DuplicateMapping`] when a mapping for the same
/// (job, job item, vendor) already exists, unless the caller explicitly
/// supersedes the prior row (resubmission after rejection).
pub async fn create_mapping(
    pool: &SqlitePool,
    job_id: i64,
    job_item_id: i64,
    vendor: &str,
    remote_project_id: &str,
    remote_document_id: &str,
    initial_state: &BTreeMap<String, serde_json::Value>,
    supersede: bool,
) -> Result<i64> {
    if !supersede {
        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM remote_mappings \
             WHERE job_id = ? AND job_item_id = ? AND vendor = ?",
        )
        .bind(job_id)
        .bind(job_item_id)
        .bind(vendor)
        .fetch_one(pool)
        .await?;
        if existing > 0 {
            return Err(Error::DuplicateMapping(format!(
                "job {job_id} item {job_item_id} already mapped for {vendor}"
            )));
        }
    }

    let state_json =
        serde_json::to_string(initial_state).map_err(|e| Error::Internal(e.to_string()))?;
    let result = sqlx::query(
        r#"
        INSERT INTO remote_mappings
            (job_id, job_item_id, vendor, remote_project_id, remote_document_id, remote_state)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job_id)
    .bind(job_item_id)
    .bind(vendor)
    .bind(remote_project_id)
    .bind(remote_document_id)
    .bind(&state_json)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Reverse lookup from a webhook/poll identifier triple.
///
/// Multiple historical matches can exist after resubmission; only the most
/// recent row is returned, older rows are inert history.
pub async fn find_by_remote_triple(
    pool: &SqlitePool,
    vendor: &str,
    remote_project_id: &str,
    remote_document_id: &str,
) -> Result<Option<RemoteMapping>> {
    let row = sqlx::query_as::<_, (i64, i64, i64, String, String, String, String)>(
        "SELECT id, job_id, job_item_id, vendor, remote_project_id, remote_document_id, remote_state \
         FROM remote_mappings \
         WHERE vendor = ? AND remote_project_id = ? AND remote_document_id = ? \
         ORDER BY id DESC LIMIT 1",
    )
    .bind(vendor)
    .bind(remote_project_id)
    .bind(remote_document_id)
    .fetch_optional(pool)
    .await?;

    row.map(mapping_from_row).transpose()
}

/// All mappings of a vendor project, used by the project-level webhook to
/// match individual job parts.
pub async fn find_by_remote_project(
    pool: &SqlitePool,
    vendor: &str,
    remote_project_id: &str,
) -> Result<Vec<RemoteMapping>> {
    let rows = sqlx::query_as::<_, (i64, i64, i64, String, String, String, String)>(
        "SELECT id, job_id, job_item_id, vendor, remote_project_id, remote_document_id, remote_state \
         FROM remote_mappings \
         WHERE vendor = ? AND remote_project_id = ? ORDER BY id",
    )
    .bind(vendor)
    .bind(remote_project_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(mapping_from_row).collect()
}

/// All mappings of a job, oldest to newest; the last row is the newest.
pub async fn find_by_job(pool: &SqlitePool, job_id: i64) -> Result<Vec<RemoteMapping>> {
    let rows = sqlx::query_as::<_, (i64, i64, i64, String, String, String, String)>(
        "SELECT id, job_id, job_item_id, vendor, remote_project_id, remote_document_id, remote_state \
         FROM remote_mappings \
         WHERE job_id = ? ORDER BY id",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(mapping_from_row).collect()
}

/// All mappings of a local job item, oldest to newest (stale rows included).
pub async fn find_by_local(
    pool: &SqlitePool,
    job_id: i64,
    job_item_id: i64,
) -> Result<Vec<RemoteMapping>> {
    let rows = sqlx::query_as::<_, (i64, i64, i64, String, String, String, String)>(
        "SELECT id, job_id, job_item_id, vendor, remote_project_id, remote_document_id, remote_state \
         FROM remote_mappings \
         WHERE job_id = ? AND job_item_id = ? ORDER BY id",
    )
    .bind(job_id)
    .bind(job_item_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(mapping_from_row).collect()
}

fn mapping_from_row(
    row: (i64, i64, i64, String, String, String, String),
) -> Result<RemoteMapping> {
    let remote_state: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&row.6).map_err(|e| Error::Internal(e.to_string()))?;
    Ok(RemoteMapping {
        id: row.0,
        job_id: row.1,
        job_item_id: row.2,
        vendor: row.3,
        remote_project_id: row.4,
        remote_document_id: row.5,
        remote_state,
    })
}

/// Replace-or-insert one key of the mapping's state bag.
pub async fn update_remote_state(
    pool: &SqlitePool,
    mapping_id: i64,
    key: &str,
    value: serde_json::Value,
) -> Result<()> {
    let current: String =
        sqlx::query_scalar("SELECT remote_state FROM remote_mappings WHERE id = ?")
            .bind(mapping_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("mapping {mapping_id}")))?;

    let mut state: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&current).map_err(|e| Error::Internal(e.to_string()))?;
    state.insert(key.to_string(), value);

    let state_json = serde_json::to_string(&state).map_err(|e| Error::Internal(e.to_string()))?;
    sqlx::query("UPDATE remote_mappings SET remote_state = ? WHERE id = ?")
        .bind(&state_json)
        .bind(mapping_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Remove one key from the mapping's state bag; absent keys are ignored.
pub async fn remove_remote_state(pool: &SqlitePool, mapping_id: i64, key: &str) -> Result<()> {
    let current: String =
        sqlx::query_scalar("SELECT remote_state FROM remote_mappings WHERE id = ?")
            .bind(mapping_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("mapping {mapping_id}")))?;

    let mut state: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&current).map_err(|e| Error::Internal(e.to_string()))?;
    if state.remove(key).is_none() {
        return Ok(());
    }

    let state_json = serde_json::to_string(&state).map_err(|e| Error::Internal(e.to_string()))?;
    sqlx::query("UPDATE remote_mappings SET remote_state = ? WHERE id = ?")
        .bind(&state_json)
        .bind(mapping_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Delete a mapping; rollback use only.
pub async fn delete_mapping(pool: &SqlitePool, mapping_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM remote_mappings WHERE id = ?")
        .bind(mapping_id)
        .execute(pool)
        .await?;
    Ok(())
}
