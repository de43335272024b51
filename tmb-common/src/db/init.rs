//! Database initialization
//!
//! Creates the database on first run and brings the schema up idempotently;
//! every statement is `CREATE ... IF NOT EXISTS` so startup is safe to
//! repeat.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL allows the webhook receiver and a polling batch to read
    // concurrently with single-row upserts
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// Connect to an in-memory database with the full schema (test helper).
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    create_tables(&pool).await?;
    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_jobs_table(pool).await?;
    create_job_items_table(pool).await?;
    create_remote_mappings_table(pool).await?;
    create_job_messages_table(pool).await?;
    Ok(())
}

async fn create_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            translator TEXT NOT NULL,
            source_langcode TEXT NOT NULL,
            target_langcode TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'unprocessed'
                CHECK (state IN ('unprocessed', 'active', 'rejected', 'aborted', 'finished')),
            project_template TEXT,
            due_date TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_translator ON jobs(translator)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_job_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            item_type TEXT NOT NULL,
            item_key TEXT NOT NULL,
            label TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'inactive'
                CHECK (state IN ('inactive', 'active', 'review', 'accepted')),
            data TEXT NOT NULL DEFAULT '{}',
            word_count INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (word_count >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_items_job ON job_items(job_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_items_state ON job_items(state)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_remote_mappings_table(pool: &SqlitePool) -> Result<()> {
    // Document identity is unique within its project scope by construction;
    // no stored constraint. Historical rows from resubmission are kept, the
    // newest row is authoritative.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS remote_mappings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            job_item_id INTEGER NOT NULL REFERENCES job_items(id) ON DELETE CASCADE,
            vendor TEXT NOT NULL,
            remote_project_id TEXT NOT NULL,
            remote_document_id TEXT NOT NULL,
            remote_state TEXT NOT NULL DEFAULT '{}',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_remote_mappings_remote \
         ON remote_mappings(vendor, remote_project_id, remote_document_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_remote_mappings_local \
         ON remote_mappings(job_id, job_item_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_job_messages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            severity TEXT NOT NULL DEFAULT 'status'
                CHECK (severity IN ('debug', 'status', 'warning', 'error')),
            message TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_messages_job ON job_messages(job_id)")
        .execute(pool)
        .await?;

    Ok(())
}
