use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use docshelf::config::AppConfig;
use docshelf::error::GatewayError;
use docshelf::gateway::{DocumentGateway, GatewayResult};
use docshelf::models::{
    Collaborator, Document, DocumentChanges, LabelEntry, NewCollaborator, NewDocument,
};
use docshelf::notify::Notifier;
use docshelf::params::QueryParams;
use docshelf::state::StoreContext;
use docshelf::storage::ObjectStorage;
use docshelf::store::DocumentStore;
use once_cell::sync::Lazy;
use reqwest::StatusCode;
use uuid::Uuid;

#[allow(dead_code)]
pub static ACTING_USER: Lazy<Uuid> = Lazy::new(Uuid::new_v4);

const PUBLIC_BASE: &str = "https://cdn.test";

#[allow(dead_code)]
#[derive(Clone)]
pub struct UploadRecord {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub overwrite: bool,
}

#[derive(Default)]
pub struct FakeStorage {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub uploads: Mutex<Vec<UploadRecord>>,
    pub removed: Mutex<Vec<String>>,
    pub fail_uploads: AtomicBool,
    pub fail_removes: AtomicBool,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        overwrite: bool,
    ) -> Result<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(anyhow!("upload refused"));
        }
        let mut objects = self.objects.lock().unwrap();
        if !overwrite && objects.contains_key(key) {
            return Err(anyhow!("object {key} already exists"));
        }
        objects.insert(key.to_string(), bytes.clone());
        self.uploads.lock().unwrap().push(UploadRecord {
            key: key.to_string(),
            bytes,
            content_type,
            overwrite,
        });
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(anyhow!("remove refused"));
        }
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
            self.removed.lock().unwrap().push(key.clone());
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{PUBLIC_BASE}/{key}")
    }

    fn object_key(&self, url: &str) -> Option<String> {
        url.strip_prefix(PUBLIC_BASE)
            .map(|rest| rest.trim_start_matches('/').to_string())
            .filter(|key| !key.is_empty())
    }
}

#[allow(dead_code)]
impl FakeStorage {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn last_upload(&self) -> Option<UploadRecord> {
        self.uploads.lock().unwrap().last().cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

/// In-memory stand-in for the remote catalog. Mutation statuses are
/// scriptable so tests can drive the store's 204-only success rule.
pub struct FakeGateway {
    pub catalog: Mutex<Vec<Document>>,
    pub shared: Mutex<Vec<(Uuid, Uuid)>>,
    pub tags: Mutex<Vec<LabelEntry>>,
    pub categories: Mutex<Vec<LabelEntry>>,
    pub update_status: Mutex<StatusCode>,
    pub delete_status: Mutex<StatusCode>,
    pub fail_next_select: AtomicBool,
    pub select_calls: AtomicUsize,
    pub count_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub collaborator_deletes: AtomicUsize,
    pub inserted_collaborators: Mutex<Vec<NewCollaborator>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            catalog: Mutex::new(Vec::new()),
            shared: Mutex::new(Vec::new()),
            tags: Mutex::new(Vec::new()),
            categories: Mutex::new(Vec::new()),
            update_status: Mutex::new(StatusCode::NO_CONTENT),
            delete_status: Mutex::new(StatusCode::NO_CONTENT),
            fail_next_select: AtomicBool::new(false),
            select_calls: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            collaborator_deletes: AtomicUsize::new(0),
            inserted_collaborators: Mutex::new(Vec::new()),
        }
    }
}

#[allow(dead_code)]
impl FakeGateway {
    pub fn seed(&self, documents: Vec<Document>) {
        self.catalog.lock().unwrap().extend(documents);
    }

    pub fn set_update_status(&self, status: StatusCode) {
        *self.update_status.lock().unwrap() = status;
    }

    pub fn set_delete_status(&self, status: StatusCode) {
        *self.delete_status.lock().unwrap() = status;
    }

    pub fn fail_next_select(&self) {
        self.fail_next_select.store(true, Ordering::SeqCst);
    }

    pub fn collaborator_rows(&self) -> Vec<NewCollaborator> {
        self.inserted_collaborators.lock().unwrap().clone()
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.lock().unwrap().len()
    }

    fn matches(filters: Option<&docshelf::params::DocumentFilters>, doc: &Document) -> bool {
        let Some(filters) = filters else {
            return true;
        };
        if let Some(is_public) = filters.is_public {
            if doc.is_public != is_public {
                return false;
            }
        }
        if let Some(is_draft) = filters.is_draft {
            if doc.is_draft != is_draft {
                return false;
            }
        }
        if let Some(category) = filters.category.as_deref() {
            if doc.category.as_deref() != Some(category) {
                return false;
            }
        }
        if !filters.tags.is_empty()
            && !filters.tags.iter().all(|tag| doc.tags.contains(tag))
        {
            return false;
        }
        if let Some(search) = filters.search.as_deref() {
            if !doc.name.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl DocumentGateway for FakeGateway {
    async fn select_documents(&self, params: &QueryParams) -> GatewayResult<Vec<Document>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_select.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::new("select refused"));
        }
        let catalog = self.catalog.lock().unwrap();
        let filtered: Vec<Document> = catalog
            .iter()
            .filter(|doc| Self::matches(params.filters.as_ref(), doc))
            .cloned()
            .collect();
        let from = params.range.from.min(filtered.len());
        let to = (params.range.to + 1).min(filtered.len());
        Ok(filtered[from..to].to_vec())
    }

    async fn count_public_documents(&self) -> GatewayResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .iter()
            .filter(|doc| doc.is_public && !doc.is_draft)
            .count() as u64)
    }

    async fn fetch_mine(&self, user_id: Uuid) -> GatewayResult<Vec<Document>> {
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .iter()
            .filter(|doc| doc.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn fetch_private(&self, user_id: Uuid) -> GatewayResult<Vec<Document>> {
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .iter()
            .filter(|doc| doc.user_id == user_id && !doc.is_public)
            .cloned()
            .collect())
    }

    async fn fetch_drafts(&self, user_id: Uuid) -> GatewayResult<Vec<Document>> {
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .iter()
            .filter(|doc| doc.user_id == user_id && doc.is_draft)
            .cloned()
            .collect())
    }

    async fn fetch_shared_with_me(&self, user_id: Uuid) -> GatewayResult<Vec<Document>> {
        let shared = self.shared.lock().unwrap();
        let ids: Vec<Uuid> = shared
            .iter()
            .filter(|(_, user)| *user == user_id)
            .map(|(doc, _)| *doc)
            .collect();
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .iter()
            .filter(|doc| ids.contains(&doc.id))
            .cloned()
            .collect())
    }

    async fn fetch_document_detail(&self, id: Uuid) -> GatewayResult<Option<Document>> {
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog.iter().find(|doc| doc.id == id).map(|doc| {
            let mut doc = doc.clone();
            doc.comment_count = Some(doc.comment_count.unwrap_or(0));
            doc
        }))
    }

    async fn fetch_collaborators(&self, document_id: Uuid) -> GatewayResult<Vec<Collaborator>> {
        let shared = self.shared.lock().unwrap();
        Ok(shared
            .iter()
            .filter(|(doc, _)| *doc == document_id)
            .map(|(_, user)| Collaborator {
                id: *user,
                name: None,
                email: None,
                phone: None,
                avatar_url: None,
            })
            .collect())
    }

    async fn insert_document(&self, row: &NewDocument) -> GatewayResult<Document> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            user_id: row.user_id,
            name: row.name.clone(),
            description: row.description.clone(),
            url: row.url.clone(),
            is_draft: row.is_draft,
            is_public: row.is_public,
            tags: row.tags.clone(),
            category: row.category.clone(),
            file_size: row.file_size,
            file_type: row.file_type.clone(),
            file_name: row.file_name.clone(),
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
            comment_count: None,
            user: None,
        };
        self.catalog.lock().unwrap().push(document.clone());
        Ok(document)
    }

    async fn update_document(
        &self,
        _id: Uuid,
        _changes: &DocumentChanges,
    ) -> GatewayResult<StatusCode> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.update_status.lock().unwrap())
    }

    async fn delete_document(&self, id: Uuid) -> GatewayResult<StatusCode> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let status = *self.delete_status.lock().unwrap();
        if status == StatusCode::NO_CONTENT {
            self.catalog.lock().unwrap().retain(|doc| doc.id != id);
        }
        Ok(status)
    }

    async fn delete_collaborators(&self, document_id: Uuid) -> GatewayResult<()> {
        self.collaborator_deletes.fetch_add(1, Ordering::SeqCst);
        self.shared
            .lock()
            .unwrap()
            .retain(|(doc, _)| *doc != document_id);
        Ok(())
    }

    async fn insert_collaborators(&self, rows: &[NewCollaborator]) -> GatewayResult<()> {
        let mut shared = self.shared.lock().unwrap();
        let mut inserted = self.inserted_collaborators.lock().unwrap();
        for row in rows {
            shared.push((row.document_id, row.user_id));
            inserted.push(row.clone());
        }
        Ok(())
    }

    async fn list_tags(&self) -> GatewayResult<Vec<LabelEntry>> {
        Ok(self.tags.lock().unwrap().clone())
    }

    async fn list_categories(&self) -> GatewayResult<Vec<LabelEntry>> {
        Ok(self.categories.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(String, String)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(title, _)| title.clone())
            .collect()
    }
}

pub struct TestHarness {
    pub ctx: StoreContext,
    pub gateway: Arc<FakeGateway>,
    pub storage: Arc<FakeStorage>,
    pub notifier: Arc<RecordingNotifier>,
}

#[allow(dead_code)]
impl TestHarness {
    pub fn new() -> Self {
        let config = AppConfig {
            gateway_url: "https://gateway.test".to_string(),
            gateway_api_key: "test-key".to_string(),
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            storage_bucket: "test-bucket".to_string(),
            storage_public_url: PUBLIC_BASE.to_string(),
            page_size: 10,
        };

        let gateway = Arc::new(FakeGateway::default());
        let storage = Arc::new(FakeStorage::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = StoreContext::with_parts(
            config,
            gateway.clone(),
            storage.clone(),
            notifier.clone(),
        );

        Self {
            ctx,
            gateway,
            storage,
            notifier,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.ctx.documents
    }

    pub fn sign_in(&self) -> Uuid {
        self.ctx.session.sign_in(*ACTING_USER);
        *ACTING_USER
    }

    /// Seeds `count` public, non-draft documents owned by other users.
    pub fn seed_public_documents(&self, count: usize) -> Vec<Uuid> {
        let documents: Vec<Document> = (0..count).map(|i| public_document(i)).collect();
        let ids = documents.iter().map(|doc| doc.id).collect();
        self.gateway.seed(documents);
        ids
    }
}

pub fn public_document(index: usize) -> Document {
    let id = Uuid::new_v4();
    let now = Utc::now();
    Document {
        id,
        user_id: Uuid::new_v4(),
        name: format!("document-{index}"),
        description: None,
        url: format!("{PUBLIC_BASE}/documents/{id}-document-{index}.pdf"),
        is_draft: false,
        is_public: true,
        tags: Vec::new(),
        category: None,
        file_size: 1024,
        file_type: Some("application/pdf".to_string()),
        file_name: format!("document-{index}.pdf"),
        created_at: now,
        updated_at: now,
        last_accessed_at: None,
        comment_count: None,
        user: None,
    }
}

#[allow(dead_code)]
pub fn label(slug: &str, name: &str) -> LabelEntry {
    LabelEntry {
        slug: slug.to_string(),
        name: name.to_string(),
    }
}
