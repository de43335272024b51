//! Reconciliation engine
//!
//! Drives the submit -> poll/callback -> fetch -> finalize lifecycle for
//! one job. Both webhook delivery and polling funnel terminal events
//! through [`Engine::apply_remote_event`], which is safe to run twice for
//! the same event: re-running re-imports the same content and rewrites the
//! same state value.

use crate::vendor::{AbortOutcome, TranslationStatus, VendorAdapter, VendorRegistry};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tmb_common::config::VendorKind;
use tmb_common::db::models::{
    remote_keys, DataItemState, Job, JobItemState, JobState, MessageSeverity, RemoteMapping,
};
use tmb_common::db;
use tmb_common::xliff;
use tmb_common::{Error, Result};
use tracing::{debug, info, warn};

/// Page size for the pull batch; bounds a single pull request's workload.
const PULL_PAGE_SIZE: usize = 50;

/// A remote status change, from a webhook payload or a poll response.
#[derive(Debug, Clone)]
pub struct RemoteEvent {
    pub vendor: VendorKind,
    pub project_id: String,
    pub document_id: String,
    /// Raw vendor status string
    pub status: String,
    pub download_url: Option<String>,
    /// Workflow stage carried by project-level webhook payloads
    pub workflow: Option<WorkflowLevel>,
}

/// Workflow stage of an event versus the project's final stage.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowLevel {
    pub level: i64,
    pub last_level: i64,
}

/// What applying a remote event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Non-terminal status; only the raw status string was persisted
    InProgress,
    /// Translated content fetched and imported
    Imported,
    /// Terminal status, but fetch/parse failed; recorded as a job message
    ImportFailed,
}

/// Outcome of the pull batch.
#[derive(Debug, Default, Serialize)]
pub struct PullReport {
    pub translated: usize,
    pub untranslated: usize,
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct Engine {
    db: SqlitePool,
    registry: Arc<VendorRegistry>,
}

impl Engine {
    pub fn new(db: SqlitePool, registry: Arc<VendorRegistry>) -> Self {
        Self { db, registry }
    }

    /// Submit a job to its bound vendor.
    ///
    /// Creates one remote project, then one remote document per job item.
    /// The first per-item failure rejects the job and stops: the failing
    /// item's partially created mapping is deleted, earlier items' mappings
    /// and remote documents are left as-is, later items are never
    /// attempted. Returns the job's resulting state.
    pub async fn submit_job(&self, job_id: i64) -> Result<JobState> {
        let job = db::load_job(&self.db, job_id).await?;
        if job.state == JobState::Active {
            return Err(Error::InvalidInput(format!("job {job_id} already submitted")));
        }
        let resubmission = job.state == JobState::Rejected;
        if resubmission {
            db::set_job_state(&self.db, job_id, JobState::Unprocessed).await?;
        }

        let adapter = self.registry.resolve(&job.translator)?;
        let items = db::load_job_items(&self.db, job_id).await?;
        if items.is_empty() {
            return Err(Error::InvalidInput(format!("job {job_id} has no items")));
        }

        let project_id = match adapter.create_project(&job).await {
            Ok(id) => id,
            Err(e) => return self.reject_job(job_id, &e).await,
        };
        db::add_job_message(
            &self.db,
            job_id,
            MessageSeverity::Debug,
            &format!("Created a new project with the id: {project_id}"),
        )
        .await?;

        let auto_launch = adapter
            .template_auto_launch(job.project_template.as_deref())
            .await
            .unwrap_or(false);

        for item in &items {
            let mut mapping_id = None;
            let result = async {
                let content = xliff::export(&job, item)?;
                let title = format!(
                    "JobID_{}_JobItemID_{}_{}_{}",
                    job.id, item.id, job.source_langcode, job.target_langcode
                );
                let document_id = adapter.create_document(&project_id, &title, &content).await?;

                let mut initial_state = std::collections::BTreeMap::new();
                initial_state.insert(remote_keys::FILE_STATE_VERSION.to_string(), json!(1));
                initial_state.insert(remote_keys::VENDOR_STATE.to_string(), json!("preliminary"));
                initial_state.insert(
                    remote_keys::TEMPLATE_AUTO_LAUNCH.to_string(),
                    json!(auto_launch),
                );
                if let Some(due_date) = &job.due_date {
                    initial_state.insert(remote_keys::REQUIRED_BY.to_string(), json!(due_date));
                }
                mapping_id = Some(
                    db::create_mapping(
                        &self.db,
                        job.id,
                        item.id,
                        adapter.vendor().as_str(),
                        &project_id,
                        &document_id,
                        &initial_state,
                        resubmission,
                    )
                    .await?,
                );

                db::set_job_item_state(&self.db, item.id, JobItemState::Active).await?;
                Ok::<_, Error>(())
            }
            .await;

            if let Err(e) = result {
                // Compensating delete covers only this item's mapping
                if let Some(mapping_id) = mapping_id {
                    db::delete_mapping(&self.db, mapping_id).await?;
                }
                return self.reject_job(job_id, &e).await;
            }
        }

        adapter.finalize_project(&project_id).await?;

        let state = if auto_launch {
            JobState::Active
        } else {
            db::add_job_message(
                &self.db,
                job_id,
                MessageSeverity::Status,
                "The translation job has been submitted.",
            )
            .await?;
            JobState::Unprocessed
        };
        db::set_job_state(&self.db, job_id, state).await?;
        info!(job_id, %project_id, ?state, "job submitted");
        Ok(state)
    }

    async fn reject_job(&self, job_id: i64, error: &Error) -> Result<JobState> {
        db::add_job_message(
            &self.db,
            job_id,
            MessageSeverity::Error,
            &format!("Job has been rejected with following error: {error}"),
        )
        .await?;
        db::set_job_state(&self.db, job_id, JobState::Rejected).await?;
        warn!(job_id, %error, "job rejected");
        Ok(JobState::Rejected)
    }

    /// Apply one remote status event; the single idempotent entry point
    /// used by both webhook delivery and polling.
    pub async fn apply_remote_event(&self, event: &RemoteEvent) -> Result<EventOutcome> {
        let mapping = db::find_by_remote_triple(
            &self.db,
            event.vendor.as_str(),
            &event.project_id,
            &event.document_id,
        )
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "no mapping for {} project {} document {}",
                event.vendor.as_str(),
                event.project_id,
                event.document_id
            ))
        })?;

        if let Some(workflow) = event.workflow {
            if workflow.level != workflow.last_level {
                return Err(Error::StaleWorkflowLevel {
                    got: workflow.level,
                    want: workflow.last_level,
                });
            }
        }

        let job = db::load_job(&self.db, mapping.job_id).await?;
        let adapter = self.registry.resolve(&job.translator)?;

        match adapter.classify_status(&event.status)? {
            TranslationStatus::InProgress => {
                db::update_remote_state(
                    &self.db,
                    mapping.id,
                    remote_keys::RAW_STATUS,
                    json!(event.status),
                )
                .await?;
                debug!(
                    mapping_id = mapping.id,
                    status = %event.status,
                    "non-terminal status recorded"
                );
                Ok(EventOutcome::InProgress)
            }
            TranslationStatus::Completed => {
                match self
                    .import_translation(&job, &mapping, adapter.as_ref(), &event.status, event.download_url.as_deref())
                    .await
                {
                    Ok(()) => Ok(EventOutcome::Imported),
                    Err(e) => {
                        // A single item's failure must not abort sibling
                        // processing; record and answer success upstream
                        db::add_job_message(
                            &self.db,
                            job.id,
                            MessageSeverity::Error,
                            &format!(
                                "Error fetching the job item {}: {e}",
                                mapping.job_item_id
                            ),
                        )
                        .await?;
                        warn!(mapping_id = mapping.id, error = %e, "translation import failed");
                        Ok(EventOutcome::ImportFailed)
                    }
                }
            }
        }
    }

    /// Download, parse and apply a completed translation.
    async fn import_translation(
        &self,
        job: &Job,
        mapping: &RemoteMapping,
        adapter: &dyn VendorAdapter,
        status: &str,
        download_url: Option<&str>,
    ) -> Result<()> {
        let url = match download_url {
            Some(url) => url.to_string(),
            // Project-level events carry no URL; ask the vendor
            None => {
                let (_, url) = adapter
                    .poll_status(&mapping.remote_project_id, &mapping.remote_document_id)
                    .await?;
                url.ok_or_else(|| {
                    Error::TransientFetch(format!(
                        "document {} reports completion but no download URL",
                        mapping.remote_document_id
                    ))
                })?
            }
        };

        let content = adapter.fetch_translated_content(&url).await?;
        let imported = xliff::import(&content)?;
        let translations = imported.get(&mapping.job_item_id).ok_or_else(|| {
            Error::Parse(format!(
                "translated file has no content for job item {}",
                mapping.job_item_id
            ))
        })?;

        db::apply_translated_data(
            &self.db,
            mapping.job_item_id,
            translations,
            DataItemState::Translated,
        )
        .await?;

        // Drop the submission-time vendor state before recording the new one
        db::remove_remote_state(&self.db, mapping.id, remote_keys::VENDOR_STATE).await?;
        db::update_remote_state(
            &self.db,
            mapping.id,
            remote_keys::VENDOR_STATE,
            json!("translated"),
        )
        .await?;
        db::update_remote_state(&self.db, mapping.id, remote_keys::RAW_STATUS, json!(status))
            .await?;

        info!(
            job_id = job.id,
            job_item_id = mapping.job_item_id,
            "translation imported"
        );
        Ok(())
    }

    /// Poll all active/in-review job items of every configured translator.
    ///
    /// Items are processed in pages of [`PULL_PAGE_SIZE`]; individual
    /// failures land in the report's error list and never halt the batch.
    pub async fn pull_all(&self) -> Result<PullReport> {
        let translators = self.registry.translator_names();
        let item_ids = db::active_item_ids_for_translators(&self.db, &translators).await?;

        let mut report = PullReport::default();
        let total = item_ids.len();
        for page in item_ids.chunks(PULL_PAGE_SIZE) {
            for &item_id in page {
                match self.pull_item(item_id, &mut report).await {
                    Ok(true) => report.translated += 1,
                    Ok(false) => {}
                    Err(e) => report.errors.push(format!("job item {item_id}: {e}")),
                }
            }
        }
        report.untranslated = total - report.translated;
        Ok(report)
    }

    /// Poll the active/in-review items of a single job.
    pub async fn pull_job(&self, job_id: i64) -> Result<PullReport> {
        let job = db::load_job(&self.db, job_id).await?;
        let items = db::load_job_items(&self.db, job_id).await?;

        let mut report = PullReport::default();
        let mut polled = 0usize;
        for item in items {
            if !matches!(item.state, JobItemState::Active | JobItemState::Review) {
                continue;
            }
            polled += 1;
            match self.pull_item(item.id, &mut report).await {
                Ok(true) => report.translated += 1,
                Ok(false) => {}
                Err(e) => report.errors.push(format!("job item {}: {e}", item.id)),
            }
        }
        report.untranslated = polled - report.translated;
        debug!(job_id = job.id, polled, "job pull finished");
        Ok(report)
    }

    /// Poll one job item's mappings; true when a translation was imported.
    ///
    /// A failing mapping never blocks the rest: stale rows from
    /// resubmission may point at remotely deleted documents, and the
    /// authoritative newer row must still be polled. Per-mapping failures
    /// land in the report's error list and the loop continues.
    async fn pull_item(&self, item_id: i64, report: &mut PullReport) -> Result<bool> {
        let item = db::load_job_item(&self.db, item_id).await?;
        let job = db::load_job(&self.db, item.job_id).await?;
        let adapter = self.registry.resolve(&job.translator)?;

        let mut translated = false;
        for mapping in db::find_by_local(&self.db, job.id, item.id).await? {
            if mapping.vendor != adapter.vendor().as_str() {
                continue;
            }
            let (status, download_url) = match adapter
                .poll_status(&mapping.remote_project_id, &mapping.remote_document_id)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    db::add_job_message(
                        &self.db,
                        job.id,
                        MessageSeverity::Error,
                        &format!(
                            "Error fetching the job item {}: document {} not found: {e}",
                            item.label, mapping.remote_document_id
                        ),
                    )
                    .await?;
                    report.errors.push(format!("job item {item_id}: {e}"));
                    continue;
                }
            };

            match adapter.classify_status(&status) {
                Ok(TranslationStatus::Completed) => {}
                _ => continue,
            }

            match self
                .import_translation(&job, &mapping, adapter.as_ref(), &status, download_url.as_deref())
                .await
            {
                Ok(()) => translated = true,
                Err(e) => {
                    db::add_job_message(
                        &self.db,
                        job.id,
                        MessageSeverity::Error,
                        &format!(
                            "Exception occurred while fetching the job item {}: {e}",
                            item.label
                        ),
                    )
                    .await?;
                    report.errors.push(format!("job item {item_id}: {e}"));
                }
            }
        }
        Ok(translated)
    }

    /// Ask the vendor to cancel a submitted job.
    ///
    /// Returns false (with a job message) when the vendor-side work is past
    /// a cancellable stage; the job state is left untouched in that case.
    pub async fn abort_job(&self, job_id: i64) -> Result<bool> {
        let job = db::load_job(&self.db, job_id).await?;
        let adapter = self.registry.resolve(&job.translator)?;

        let mappings = db::find_by_job(&self.db, job_id).await?;
        let mapping = mappings
            .last()
            .ok_or_else(|| Error::NotFound(format!("job {job_id} has no remote mappings")))?;

        match adapter.abort_project(&mapping.remote_project_id).await? {
            AbortOutcome::Aborted => {
                db::set_job_state(&self.db, job_id, JobState::Aborted).await?;
                db::add_job_message(
                    &self.db,
                    job_id,
                    MessageSeverity::Status,
                    "The translation job has been aborted.",
                )
                .await?;
                Ok(true)
            }
            AbortOutcome::Refused { status } => {
                db::add_job_message(
                    &self.db,
                    job_id,
                    MessageSeverity::Warning,
                    &format!(
                        "Could not cancel the project \"{}\" with status \"{status}\"",
                        job.label
                    ),
                )
                .await?;
                Ok(false)
            }
        }
    }
}
