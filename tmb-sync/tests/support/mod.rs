//! Shared test harness: an in-memory database, a scripted vendor adapter
//! and a router wired like the production service.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tmb_common::config::VendorKind;
use tmb_common::db::models::{DataItem, DataItemState, Job};
use tmb_common::db::{self, NewJob, NewJobItem};
use tmb_common::{Error, Result};
use tmb_sync::vendor::{AbortOutcome, TranslationStatus, VendorAdapter, VendorRegistry};
use tmb_sync::AppState;

pub const TRANSLATOR: &str = "tm-test";

/// Scripted adapter standing in for a vendor API.
#[derive(Default)]
pub struct MockAdapter {
    /// Remote status and download URL per document id
    pub statuses: Mutex<HashMap<String, (String, Option<String>)>>,
    /// Downloadable content per URL
    pub content: Mutex<HashMap<String, String>>,
    /// 1-based index of the create_document call that should fail
    pub fail_on_document: Mutex<Option<usize>>,
    /// Project status answered to abort attempts
    pub abort_status: Mutex<String>,
    pub projects_created: AtomicUsize,
    pub documents_created: AtomicUsize,
    pub finalize_calls: AtomicUsize,
}

impl MockAdapter {
    pub fn set_status(&self, document_id: &str, status: &str, url: Option<&str>) {
        self.statuses.lock().unwrap().insert(
            document_id.to_string(),
            (status.to_string(), url.map(str::to_string)),
        );
    }

    pub fn set_content(&self, url: &str, content: &str) {
        self.content
            .lock()
            .unwrap()
            .insert(url.to_string(), content.to_string());
    }
}

#[async_trait]
impl VendorAdapter for MockAdapter {
    fn vendor(&self) -> VendorKind {
        VendorKind::Textmaster
    }

    fn classify_status(&self, raw: &str) -> Result<TranslationStatus> {
        match raw {
            "in_review" | "completed" => Ok(TranslationStatus::Completed),
            "in_creation" | "in_progress" | "paused" => Ok(TranslationStatus::InProgress),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }

    async fn check_available(&self) -> bool {
        true
    }

    async fn supported_remote_languages(&self) -> Result<Vec<(String, String)>> {
        Ok(vec![("fr".into(), "French (fr)".into())])
    }

    async fn create_project(&self, _job: &Job) -> Result<String> {
        let n = self.projects_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("P{n}"))
    }

    async fn create_document(
        &self,
        _project_id: &str,
        _title: &str,
        _xliff: &str,
    ) -> Result<String> {
        let n = self.documents_created.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on_document.lock().unwrap() == Some(n) {
            return Err(Error::RemoteRejected("document refused".into()));
        }
        let document_id = format!("D{n}");
        self.set_status(&document_id, "in_creation", None);
        Ok(document_id)
    }

    async fn finalize_project(&self, _project_id: &str) -> Result<()> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn poll_status(
        &self,
        _project_id: &str,
        document_id: &str,
    ) -> Result<(String, Option<String>)> {
        self.statuses
            .lock()
            .unwrap()
            .get(document_id)
            .cloned()
            .ok_or_else(|| Error::RemoteRejected(format!("document {document_id} not found")))
    }

    async fn fetch_translated_content(&self, url: &str) -> Result<String> {
        self.content
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::TransientFetch(format!("{url} unavailable")))
    }

    async fn abort_project(&self, _project_id: &str) -> Result<AbortOutcome> {
        let status = self.abort_status.lock().unwrap().clone();
        if status == "in_creation" || status == "in_progress" {
            Ok(AbortOutcome::Aborted)
        } else {
            Ok(AbortOutcome::Refused { status })
        }
    }
}

/// In-memory database plus a registry with one scripted translator.
pub async fn test_state() -> (AppState, Arc<MockAdapter>) {
    let pool = db::init_memory_database().await.unwrap();
    let adapter = Arc::new(MockAdapter {
        abort_status: Mutex::new("in_progress".to_string()),
        ..MockAdapter::default()
    });
    let mut registry = VendorRegistry::default();
    registry.insert(TRANSLATOR.to_string(), adapter.clone());
    (AppState::new(pool, Arc::new(registry)), adapter)
}

/// Create a job with `field_sets.len()` items; each set is (key, source).
pub async fn seed_job(pool: &SqlitePool, field_sets: &[&[(&str, &str)]]) -> (i64, Vec<i64>) {
    let job_id = db::create_job(
        pool,
        &NewJob {
            label: "Front page".into(),
            translator: TRANSLATOR.into(),
            source_langcode: "en".into(),
            target_langcode: "fr".into(),
            project_template: None,
            due_date: None,
        },
    )
    .await
    .unwrap();

    let mut item_ids = Vec::new();
    for (n, fields) in field_sets.iter().enumerate() {
        let data: BTreeMap<String, DataItem> = fields
            .iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    DataItem {
                        source: v.to_string(),
                        translation: None,
                        state: DataItemState::Pending,
                    },
                )
            })
            .collect();
        let item_id = db::create_job_item(
            pool,
            job_id,
            &NewJobItem {
                item_type: "node".into(),
                item_key: (n + 1).to_string(),
                label: format!("Page {}", n + 1),
                data,
            },
        )
        .await
        .unwrap();
        item_ids.push(item_id);
    }
    (job_id, item_ids)
}

/// Minimal translated XLIFF answering an exported item.
pub fn translated_xliff(item_id: i64, pairs: &[(&str, &str)]) -> String {
    let mut units = String::new();
    for (key, target) in pairs {
        units.push_str(&format!(
            "<trans-unit id=\"{item_id}][{key}\" resname=\"{key}\">\
             <source>src</source><target>{target}</target></trans-unit>"
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <xliff xmlns=\"urn:oasis:names:tc:xliff:document:1.2\" version=\"1.2\">\
         <file original=\"job\" source-language=\"en\" target-language=\"fr\" datatype=\"plaintext\">\
         <body><group id=\"{item_id}\">{units}</group></body></file></xliff>"
    )
}
