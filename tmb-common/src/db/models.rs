//! Database models

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Translation job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created locally, not yet (or no longer) submitted to the vendor
    Unprocessed,
    /// Submitted and being worked on at the vendor
    Active,
    /// Submission failed; the triggering error is recorded as a job message
    Rejected,
    Aborted,
    Finished,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Unprocessed => "unprocessed",
            JobState::Active => "active",
            JobState::Rejected => "rejected",
            JobState::Aborted => "aborted",
            JobState::Finished => "finished",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "unprocessed" => Ok(JobState::Unprocessed),
            "active" => Ok(JobState::Active),
            "rejected" => Ok(JobState::Rejected),
            "aborted" => Ok(JobState::Aborted),
            "finished" => Ok(JobState::Finished),
            other => Err(Error::InvalidInput(format!("unknown job state: {other}"))),
        }
    }
}

/// Job item lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobItemState {
    Inactive,
    /// Submitted; waiting for the vendor to translate
    Active,
    /// Translation arrived and is awaiting local review
    Review,
    Accepted,
}

impl JobItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobItemState::Inactive => "inactive",
            JobItemState::Active => "active",
            JobItemState::Review => "review",
            JobItemState::Accepted => "accepted",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "inactive" => Ok(JobItemState::Inactive),
            "active" => Ok(JobItemState::Active),
            "review" => Ok(JobItemState::Review),
            "accepted" => Ok(JobItemState::Accepted),
            other => Err(Error::InvalidInput(format!(
                "unknown job item state: {other}"
            ))),
        }
    }
}

/// Per-field translation state inside a job item's data bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataItemState {
    Pending,
    /// Imported from a non-final vendor stage
    Preliminary,
    Translated,
    Reviewed,
}

/// One translatable field of a job item.
///
/// Keys in the surrounding map are flattened with the `][` separator the
/// host uses for nested structures (e.g. `title][0][value`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataItem {
    pub source: String,
    #[serde(default)]
    pub translation: Option<String>,
    pub state: DataItemState,
}

/// A translation request spanning one or more job items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub label: String,
    /// Configured translator name this job is bound to
    pub translator: String,
    pub source_langcode: String,
    pub target_langcode: String,
    pub state: JobState,
    pub project_template: Option<String>,
    pub due_date: Option<String>,
}

/// One translatable unit within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobItem {
    pub id: i64,
    pub job_id: i64,
    pub item_type: String,
    pub item_key: String,
    pub label: String,
    pub state: JobItemState,
    /// Flattened data-item map, stored as JSON
    pub data: BTreeMap<String, DataItem>,
    pub word_count: i64,
}

/// Persisted link between a local job item and a vendor's remote
/// project/document identifiers plus vendor-specific state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMapping {
    pub id: i64,
    pub job_id: i64,
    pub job_item_id: i64,
    pub vendor: String,
    pub remote_project_id: String,
    pub remote_document_id: String,
    /// Open-ended bag of vendor-defined state fields
    pub remote_state: BTreeMap<String, serde_json::Value>,
}

/// Remote-state bag keys shared by the adapters.
pub mod remote_keys {
    /// Version marker for the uploaded file content
    pub const FILE_STATE_VERSION: &str = "FileStateVersion";
    /// Collapsed local view of the vendor-side document state
    pub const VENDOR_STATE: &str = "VendorState";
    /// Raw vendor status string from the last poll or webhook event
    pub const RAW_STATUS: &str = "RawStatus";
    /// Whether the vendor project template launches work automatically
    pub const TEMPLATE_AUTO_LAUNCH: &str = "TemplateAutoLaunch";
    /// Deadline passed to the vendor, mirrored from the job's due date
    pub const REQUIRED_BY: &str = "RequiredBy";
}

/// Severity of a job message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSeverity {
    Debug,
    Status,
    Warning,
    Error,
}

impl MessageSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSeverity::Debug => "debug",
            MessageSeverity::Status => "status",
            MessageSeverity::Warning => "warning",
            MessageSeverity::Error => "error",
        }
    }
}

/// An entry in the per-job message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub id: i64,
    pub job_id: i64,
    pub severity: String,
    pub message: String,
    pub created_at: String,
}
