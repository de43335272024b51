//! Job and job item queries
//!
//! The job message log replaces host-side UI feedback: every engine and
//! adapter failure that must stay visible to an operator lands here.

use crate::db::models::{
    DataItem, DataItemState, Job, JobItem, JobItemState, JobMessage, JobState, MessageSeverity,
};
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Parameters for creating a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub label: String,
    pub translator: String,
    pub source_langcode: String,
    pub target_langcode: String,
    pub project_template: Option<String>,
    pub due_date: Option<String>,
}

/// Parameters for creating a job item.
#[derive(Debug, Clone)]
pub struct NewJobItem {
    pub item_type: String,
    pub item_key: String,
    pub label: String,
    pub data: BTreeMap<String, DataItem>,
}

/// Insert a new job in the `unprocessed` state.
pub async fn create_job(pool: &SqlitePool, new: &NewJob) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO jobs (label, translator, source_langcode, target_langcode, project_template, due_date)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.label)
    .bind(&new.translator)
    .bind(&new.source_langcode)
    .bind(&new.target_langcode)
    .bind(&new.project_template)
    .bind(&new.due_date)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Insert a new job item; word count is derived from the source fields.
pub async fn create_job_item(pool: &SqlitePool, job_id: i64, new: &NewJobItem) -> Result<i64> {
    let word_count: i64 = new
        .data
        .values()
        .map(|d| d.source.split_whitespace().count() as i64)
        .sum();
    let data_json =
        serde_json::to_string(&new.data).map_err(|e| Error::Internal(e.to_string()))?;

    let result = sqlx::query(
        r#"
        INSERT INTO job_items (job_id, item_type, item_key, label, data, word_count)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job_id)
    .bind(&new.item_type)
    .bind(&new.item_key)
    .bind(&new.label)
    .bind(&data_json)
    .bind(word_count)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load a job by id.
pub async fn load_job(pool: &SqlitePool, job_id: i64) -> Result<Job> {
    let row = sqlx::query_as::<_, (i64, String, String, String, String, String, Option<String>, Option<String>)>(
        "SELECT id, label, translator, source_langcode, target_langcode, state, project_template, due_date \
         FROM jobs WHERE id = ?",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("job {job_id}")))?;

    Ok(Job {
        id: row.0,
        label: row.1,
        translator: row.2,
        source_langcode: row.3,
        target_langcode: row.4,
        state: JobState::parse(&row.5)?,
        project_template: row.6,
        due_date: row.7,
    })
}

/// Load all items of a job, ordered by id.
pub async fn load_job_items(pool: &SqlitePool, job_id: i64) -> Result<Vec<JobItem>> {
    let rows = sqlx::query_as::<_, (i64, i64, String, String, String, String, String, i64)>(
        "SELECT id, job_id, item_type, item_key, label, state, data, word_count \
         FROM job_items WHERE job_id = ? ORDER BY id",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(job_item_from_row).collect()
}

/// Load one job item by id.
pub async fn load_job_item(pool: &SqlitePool, item_id: i64) -> Result<JobItem> {
    let row = sqlx::query_as::<_, (i64, i64, String, String, String, String, String, i64)>(
        "SELECT id, job_id, item_type, item_key, label, state, data, word_count \
         FROM job_items WHERE id = ?",
    )
    .bind(item_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("job item {item_id}")))?;

    job_item_from_row(row)
}

fn job_item_from_row(
    row: (i64, i64, String, String, String, String, String, i64),
) -> Result<JobItem> {
    let data: BTreeMap<String, DataItem> =
        serde_json::from_str(&row.6).map_err(|e| Error::Internal(e.to_string()))?;
    Ok(JobItem {
        id: row.0,
        job_id: row.1,
        item_type: row.2,
        item_key: row.3,
        label: row.4,
        state: JobItemState::parse(&row.5)?,
        data,
        word_count: row.7,
    })
}

/// Update a job's lifecycle state.
pub async fn set_job_state(pool: &SqlitePool, job_id: i64, state: JobState) -> Result<()> {
    sqlx::query("UPDATE jobs SET state = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(state.as_str())
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Update a job item's lifecycle state.
pub async fn set_job_item_state(
    pool: &SqlitePool,
    item_id: i64,
    state: JobItemState,
) -> Result<()> {
    sqlx::query("UPDATE job_items SET state = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(state.as_str())
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Append a message to the job's message log.
pub async fn add_job_message(
    pool: &SqlitePool,
    job_id: i64,
    severity: MessageSeverity,
    message: &str,
) -> Result<()> {
    sqlx::query("INSERT INTO job_messages (job_id, severity, message) VALUES (?, ?, ?)")
        .bind(job_id)
        .bind(severity.as_str())
        .bind(message)
        .execute(pool)
        .await?;
    Ok(())
}

/// Load all messages of a job, oldest first.
pub async fn load_job_messages(pool: &SqlitePool, job_id: i64) -> Result<Vec<JobMessage>> {
    let rows = sqlx::query_as::<_, (i64, i64, String, String, String)>(
        "SELECT id, job_id, severity, message, created_at \
         FROM job_messages WHERE job_id = ? ORDER BY id",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| JobMessage {
            id: r.0,
            job_id: r.1,
            severity: r.2,
            message: r.3,
            created_at: r.4,
        })
        .collect())
}

/// Apply translated field values to a job item.
///
/// Fields already carrying the same translation are rewritten; re-applying
/// the same translation set is harmless. The item moves to `review` when at
/// least one field was applied. Returns the number of applied fields.
pub async fn apply_translated_data(
    pool: &SqlitePool,
    item_id: i64,
    translations: &BTreeMap<String, String>,
    state: DataItemState,
) -> Result<usize> {
    let mut item = load_job_item(pool, item_id).await?;
    let mut applied = 0;

    for (key, text) in translations {
        if let Some(data_item) = item.data.get_mut(key) {
            data_item.translation = Some(text.clone());
            data_item.state = state;
            applied += 1;
        }
    }

    if applied > 0 {
        let data_json =
            serde_json::to_string(&item.data).map_err(|e| Error::Internal(e.to_string()))?;
        sqlx::query(
            "UPDATE job_items SET data = ?, state = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(&data_json)
        .bind(JobItemState::Review.as_str())
        .bind(item_id)
        .execute(pool)
        .await?;
    }

    Ok(applied)
}

/// Ids of active/in-review job items belonging to the given translators.
///
/// Feed for the pull batch: only items that may still receive translations.
pub async fn active_item_ids_for_translators(
    pool: &SqlitePool,
    translators: &[String],
) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    for translator in translators {
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT ji.id FROM job_items ji \
             JOIN jobs j ON j.id = ji.job_id \
             WHERE j.translator = ? AND ji.state IN ('active', 'review') \
             ORDER BY ji.id",
        )
        .bind(translator)
        .fetch_all(pool)
        .await?;
        ids.extend(rows);
    }
    Ok(ids)
}
