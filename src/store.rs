use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use reqwest::StatusCode;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::gateway::DocumentGateway;
use crate::labels::{LabelCatalog, LabelResolver};
use crate::models::{
    Document, DocumentChanges, DocumentDetail, DocumentForm, DocumentView, FilePayload,
    NewCollaborator, NewDocument,
};
use crate::notify::Notifier;
use crate::pagination::Paginator;
use crate::params::{DocumentFilters, FetchCriteria, QueryParams};
use crate::state::Session;
use crate::storage::ObjectStorage;
use crate::utils::slug::slugify_file_name;

const EVENT_BUFFER: usize = 64;
const STORAGE_PREFIX: &str = "documents";

/// Collection change published to subscribers. Consumers re-read the
/// store on receipt; events carry identity, not payloads.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    PageAppended { count: usize },
    CollectionReplaced { count: usize },
    CollectionCleared,
    DocumentCreated { id: Uuid },
    DocumentUpdated { id: Uuid },
    DocumentRemoved { id: Uuid },
}

#[derive(Debug)]
struct Inner {
    documents: Vec<Document>,
    params: QueryParams,
    paginator: Paginator,
    errors: HashMap<String, String>,
    loading: bool,
    creating: bool,
}

/// Owns the in-memory document collection and orchestrates every
/// remote operation against the gateway and blob storage. All state
/// lives behind one lock that is never held across an await; snapshots
/// handed out are owned copies.
pub struct DocumentStore {
    gateway: Arc<dyn DocumentGateway>,
    storage: Arc<dyn ObjectStorage>,
    notifier: Arc<dyn Notifier>,
    session: Arc<Session>,
    tags: Arc<LabelCatalog>,
    categories: Arc<LabelCatalog>,
    inner: RwLock<Inner>,
    events: broadcast::Sender<StoreEvent>,
}

impl DocumentStore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn DocumentGateway>,
        storage: Arc<dyn ObjectStorage>,
        notifier: Arc<dyn Notifier>,
        session: Arc<Session>,
        tags: Arc<LabelCatalog>,
        categories: Arc<LabelCatalog>,
        per_page: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            gateway,
            storage,
            notifier,
            session,
            tags,
            categories,
            inner: RwLock::new(Inner {
                documents: Vec::new(),
                params: QueryParams::with_page_size(per_page),
                paginator: Paginator::new(per_page),
                errors: HashMap::new(),
                loading: false,
                creating: false,
            }),
            events,
        }
    }

    // --- reads ---------------------------------------------------------

    /// Snapshot of the collection with display labels resolved against
    /// the sibling catalogs. Slugs stay the source of truth; this view
    /// is recomputed on every call.
    pub fn documents(&self) -> Vec<DocumentView> {
        let docs = {
            let inner = self.read();
            inner.documents.clone()
        };
        let tags = self.tags.entries();
        let categories = self.categories.entries();
        let resolver = LabelResolver::new(&tags, &categories);
        docs.iter().map(|doc| resolver.resolve(doc)).collect()
    }

    pub fn collection_len(&self) -> usize {
        self.read().documents.len()
    }

    pub fn page_number(&self) -> usize {
        self.read().paginator.page_number()
    }

    pub fn limit_reached(&self) -> bool {
        self.read().paginator.limit_reached()
    }

    pub fn total_documents(&self) -> Option<u64> {
        self.read().paginator.total_documents()
    }

    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    pub fn is_creating(&self) -> bool {
        self.read().creating
    }

    pub fn errors(&self) -> HashMap<String, String> {
        self.read().errors.clone()
    }

    pub fn clear_errors(&self) {
        self.write().errors.clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // --- public catalog pagination -------------------------------------

    /// Fetches the current page of the public catalog and appends it to
    /// the collection. The first page also obtains the public/non-draft
    /// total so the paginator can open up.
    pub async fn fetch_public_page(&self) -> StoreResult<usize> {
        self.set_loading(true);
        let result = self.fetch_public_page_inner().await;
        self.set_loading(false);

        match result {
            Ok(count) => Ok(count),
            Err(err) => {
                self.capture_failure("fetch", "Failed to load documents", &err);
                Err(err)
            }
        }
    }

    async fn fetch_public_page_inner(&self) -> StoreResult<usize> {
        let (params, needs_total, len) = {
            let inner = self.read();
            (
                public_params(&inner.params),
                inner.paginator.total_documents().is_none()
                    || inner.paginator.page_number() == 1,
                inner.documents.len(),
            )
        };

        if needs_total {
            let total = self.gateway.count_public_documents().await?;
            let mut inner = self.write();
            inner.paginator.set_total(total, len);
        }

        let rows = self.gateway.select_documents(&params).await?;

        let appended = {
            let mut inner = self.write();
            let existing: HashSet<Uuid> = inner.documents.iter().map(|doc| doc.id).collect();
            let fresh: Vec<Document> = rows
                .into_iter()
                .filter(|doc| !existing.contains(&doc.id))
                .collect();
            let appended = fresh.len();
            inner.documents.extend(fresh);
            let len = inner.documents.len();
            inner.paginator.recompute_limit(len);
            appended
        };

        info!(appended, "public page fetched");
        self.emit(StoreEvent::PageAppended { count: appended });
        Ok(appended)
    }

    /// Advances the paginator and fetches the next page. No-op once the
    /// limit has been reached.
    pub async fn advance_page(&self) -> StoreResult<usize> {
        let advanced = {
            let mut inner = self.write();
            if !inner.paginator.advance() {
                false
            } else {
                let range = inner.paginator.range();
                inner.params.set_range(range);
                true
            }
        };

        if !advanced {
            return Ok(0);
        }
        self.fetch_public_page().await
    }

    // --- user-scoped fetches -------------------------------------------

    /// Criteria-specific fetch that replaces the local collection and
    /// returns the resolved rows. Unknown criteria strings fall back to
    /// `Mine` via `FetchCriteria::parse`.
    pub async fn fetch_user_documents(
        &self,
        criteria: FetchCriteria,
    ) -> StoreResult<Vec<DocumentView>> {
        self.set_loading(true);
        let result = self.fetch_user_documents_inner(criteria).await;
        self.set_loading(false);

        match result {
            Ok(views) => Ok(views),
            Err(err) => {
                self.capture_failure("fetch", "Failed to load your documents", &err);
                Err(err)
            }
        }
    }

    async fn fetch_user_documents_inner(
        &self,
        criteria: FetchCriteria,
    ) -> StoreResult<Vec<DocumentView>> {
        let user_id = self
            .session
            .user_id()
            .ok_or_else(|| StoreError::validation("sign in to load your documents"))?;

        if let Err(err) = self.tags.ensure_loaded().await {
            warn!(error = %err, "tag catalog unavailable, slugs will pass through");
        }
        if let Err(err) = self.categories.ensure_loaded().await {
            warn!(error = %err, "category catalog unavailable, slugs will pass through");
        }

        let rows = match criteria {
            FetchCriteria::Mine => self.gateway.fetch_mine(user_id).await?,
            FetchCriteria::Private => self.gateway.fetch_private(user_id).await?,
            FetchCriteria::Drafts => self.gateway.fetch_drafts(user_id).await?,
            FetchCriteria::SharedWithMe => self.gateway.fetch_shared_with_me(user_id).await?,
        };

        let count = rows.len();
        {
            let mut inner = self.write();
            inner.documents.clear();
            inner.documents.extend(rows.iter().cloned());
            inner.paginator.recompute_limit(count);
        }
        info!(criteria = criteria.as_str(), count, "user documents fetched");
        self.emit(StoreEvent::CollectionReplaced { count });

        let tags = self.tags.entries();
        let categories = self.categories.entries();
        let resolver = LabelResolver::new(&tags, &categories);
        Ok(rows.iter().map(|doc| resolver.resolve(doc)).collect())
    }

    // --- mutations -----------------------------------------------------

    /// Uploads the file, inserts the document row, then reconciles the
    /// collaborator set. A missing file fails fast without touching the
    /// gateway; a collaborator failure is reported but does not undo
    /// the create.
    pub async fn create_document(
        &self,
        file: Option<FilePayload>,
        form: DocumentForm,
        collaborator_ids: &[Uuid],
    ) -> StoreResult<Document> {
        self.set_creating(true);
        let result = self.create_document_inner(file, form, collaborator_ids).await;
        self.set_creating(false);

        match result {
            Ok(document) => {
                self.notifier
                    .notify("Document created", &document.name);
                self.emit(StoreEvent::DocumentCreated { id: document.id });
                Ok(document)
            }
            Err(err) => {
                self.capture_failure("create", "Failed to create document", &err);
                Err(err)
            }
        }
    }

    async fn create_document_inner(
        &self,
        file: Option<FilePayload>,
        form: DocumentForm,
        collaborator_ids: &[Uuid],
    ) -> StoreResult<Document> {
        let file = file.ok_or_else(|| StoreError::validation("a file is required"))?;

        let key = format!(
            "{STORAGE_PREFIX}/{}-{}",
            Uuid::new_v4(),
            slugify_file_name(&file.file_name)
        );
        let content_type = file.resolved_content_type();
        self.storage
            .upload(&key, file.bytes.clone(), content_type.clone(), false)
            .await?;

        let user_id = self
            .session
            .user_id()
            .ok_or_else(|| StoreError::validation("sign in to create documents"))?;

        let row = NewDocument {
            user_id,
            name: form.name,
            description: form.description,
            url: self.storage.public_url(&key),
            is_draft: form.is_draft,
            is_public: form.is_public,
            tags: form.tags,
            category: form.category,
            file_size: file.size(),
            file_type: content_type,
            file_name: file.file_name,
        };

        let document = self.gateway.insert_document(&row).await?;
        info!(document_id = %document.id, "document created");

        if let Err(err) = self
            .persist_collaborators(document.id, user_id, collaborator_ids, false)
            .await
        {
            warn!(document_id = %document.id, error = %err, "collaborator reconciliation failed");
            self.notifier
                .notify("Collaborators not saved", &err.to_string());
        }

        Ok(document)
    }

    /// Merges form fields (and an optional replacement file) into an
    /// existing document. The gateway must answer the update with
    /// 204 No Content; any other status is a failure even without an
    /// error payload.
    pub async fn update_document(
        &self,
        id: Uuid,
        form: DocumentForm,
        file: Option<FilePayload>,
        collaborator_ids: &[Uuid],
    ) -> StoreResult<Document> {
        self.set_loading(true);
        let result = self
            .update_document_inner(id, form, file, collaborator_ids)
            .await;
        self.set_loading(false);

        match result {
            Ok(document) => {
                self.notifier.notify("Document updated", &document.name);
                self.emit(StoreEvent::DocumentUpdated { id });
                Ok(document)
            }
            Err(err) => {
                self.capture_failure("update", "Failed to update document", &err);
                Err(err)
            }
        }
    }

    async fn update_document_inner(
        &self,
        id: Uuid,
        form: DocumentForm,
        file: Option<FilePayload>,
        collaborator_ids: &[Uuid],
    ) -> StoreResult<Document> {
        let existing = self
            .gateway
            .fetch_document_detail(id)
            .await?
            .ok_or(StoreError::Gateway {
                message: "document not found".to_string(),
                status: Some(StatusCode::NOT_FOUND),
            })?;

        let mut changes = DocumentChanges {
            name: Some(form.name.clone()),
            description: Some(form.description.clone()),
            is_draft: Some(form.is_draft),
            is_public: Some(form.is_public),
            tags: Some(form.tags.clone()),
            category: Some(form.category.clone()),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        if let Some(file) = file.as_ref() {
            // Replacement files land at the original object path.
            let key = self
                .storage
                .object_key(&existing.url)
                .unwrap_or_else(|| {
                    format!(
                        "{STORAGE_PREFIX}/{}-{}",
                        id,
                        slugify_file_name(&file.file_name)
                    )
                });
            let content_type = file.resolved_content_type();
            self.storage
                .upload(&key, file.bytes.clone(), content_type.clone(), true)
                .await?;

            changes.url = Some(self.storage.public_url(&key));
            changes.file_size = Some(file.size());
            changes.file_type = Some(content_type);
            changes.file_name = Some(file.file_name.clone());
        }

        let status = self.gateway.update_document(id, &changes).await?;
        if status != StatusCode::NO_CONTENT {
            return Err(StoreError::Gateway {
                message: format!("update reported {status} instead of 204 No Content"),
                status: Some(status),
            });
        }

        if let Err(err) = self
            .persist_collaborators(id, existing.user_id, collaborator_ids, true)
            .await
        {
            warn!(document_id = %id, error = %err, "collaborator replacement failed");
            self.notifier
                .notify("Collaborators not saved", &err.to_string());
        }

        let merged = merge_changes(existing, &changes);
        {
            let mut inner = self.write();
            if let Some(slot) = inner.documents.iter_mut().find(|doc| doc.id == id) {
                *slot = merged.clone();
            }
        }
        info!(document_id = %id, "document updated");
        Ok(merged)
    }

    /// Deletes the backing blob (best effort), then the row, then the
    /// local entry. The row delete requires 204; a blob-delete failure
    /// is logged and the delete proceeds.
    pub async fn delete_document(&self, id: Uuid) -> StoreResult<()> {
        self.set_loading(true);
        let result = self.delete_document_inner(id).await;
        self.set_loading(false);

        match result {
            Ok(()) => {
                self.notifier.notify("Document deleted", "the document was removed");
                self.emit(StoreEvent::DocumentRemoved { id });
                Ok(())
            }
            Err(err) => {
                self.capture_failure("delete", "Failed to delete document", &err);
                Err(err)
            }
        }
    }

    async fn delete_document_inner(&self, id: Uuid) -> StoreResult<()> {
        let existing = self
            .gateway
            .fetch_document_detail(id)
            .await?
            .ok_or(StoreError::Gateway {
                message: "document not found".to_string(),
                status: Some(StatusCode::NOT_FOUND),
            })?;

        if let Some(key) = self.storage.object_key(&existing.url) {
            if let Err(err) = self.storage.remove(&[key]).await {
                warn!(document_id = %id, error = %err, "blob delete failed, removing row anyway");
            }
        }

        let status = self.gateway.delete_document(id).await?;
        if status != StatusCode::NO_CONTENT {
            return Err(StoreError::Gateway {
                message: format!("delete reported {status} instead of 204 No Content"),
                status: Some(status),
            });
        }

        {
            let mut inner = self.write();
            inner.documents.retain(|doc| doc.id != id);
            let len = inner.documents.len();
            inner.paginator.recompute_limit(len);
        }
        info!(document_id = %id, "document deleted");
        Ok(())
    }

    /// One document with its embedded user, collaborator set, and
    /// comment count. `Ok(None)` when the id does not resolve.
    pub async fn get_single_document(&self, id: Uuid) -> StoreResult<Option<DocumentDetail>> {
        let Some(document) = self.gateway.fetch_document_detail(id).await? else {
            return Ok(None);
        };
        let collaborators = self.gateway.fetch_collaborators(id).await?;
        Ok(Some(DocumentDetail {
            document,
            collaborators,
        }))
    }

    // --- filters -------------------------------------------------------

    /// Replaces the filter set, drops every loaded page, and refetches
    /// the first page. The collection is empty the moment this returns
    /// control to the caller, before the refetch resolves.
    pub async fn update_filters(&self, filters: DocumentFilters) -> StoreResult<usize> {
        self.apply_filters(Some(filters));
        self.fetch_public_page().await
    }

    /// Clears the filters entirely, with the same clear-and-refetch
    /// behavior as `update_filters`.
    pub async fn reset_filters(&self) -> StoreResult<usize> {
        self.apply_filters(None);
        self.fetch_public_page().await
    }

    fn apply_filters(&self, filters: Option<DocumentFilters>) {
        {
            let mut inner = self.write();
            inner.params.set_filters(filters);
            inner.documents.clear();
            inner.paginator.reset();
            inner.paginator.clear_total();
            let range = inner.paginator.range();
            inner.params.set_range(range);
        }
        self.emit(StoreEvent::CollectionCleared);
    }

    /// Restores the default order and range. Does not fetch.
    pub fn reset_params(&self) {
        let mut inner = self.write();
        let per_page = inner.paginator.per_page();
        let filters = inner.params.filters.clone();
        inner.params = QueryParams::with_page_size(per_page);
        inner.params.filters = filters;
        inner.paginator.reset();
    }

    // --- collaborators -------------------------------------------------

    /// Writes the collaborator set for a document. Input ids are
    /// de-duplicated and the owner is dropped: owners have implicit
    /// access and must not appear as collaborators. With `replace` the
    /// existing set is deleted first.
    async fn persist_collaborators(
        &self,
        document_id: Uuid,
        owner_id: Uuid,
        collaborator_ids: &[Uuid],
        replace: bool,
    ) -> StoreResult<()> {
        let mut seen = HashSet::new();
        let rows: Vec<NewCollaborator> = collaborator_ids
            .iter()
            .copied()
            .filter(|id| *id != owner_id)
            .filter(|id| seen.insert(*id))
            .map(|user_id| NewCollaborator {
                document_id,
                user_id,
            })
            .collect();

        if replace {
            self.gateway.delete_collaborators(document_id).await?;
        } else if rows.is_empty() {
            return Ok(());
        }

        self.gateway.insert_collaborators(&rows).await?;
        Ok(())
    }

    // --- internals -----------------------------------------------------

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_loading(&self, value: bool) {
        self.write().loading = value;
    }

    fn set_creating(&self, value: bool) {
        self.write().creating = value;
    }

    fn capture_failure(&self, field: &str, title: &str, err: &StoreError) {
        error!(field, kind = err.kind(), error = %err, "store action failed");
        {
            let mut inner = self.write();
            inner.errors.insert(field.to_string(), err.to_string());
        }
        self.notifier.notify(title, &err.to_string());
    }

    fn emit(&self, event: StoreEvent) {
        // Send only fails when nobody is subscribed.
        let _ = self.events.send(event);
    }
}

/// Page params for the public catalog: caller filters overlaid with
/// the public/non-draft predicates the catalog always applies.
fn public_params(params: &QueryParams) -> QueryParams {
    let mut effective = params.clone();
    let mut filters = effective.filters.take().unwrap_or_default();
    filters.is_public = Some(true);
    filters.is_draft = Some(false);
    effective.filters = Some(filters);
    effective
}

fn merge_changes(mut document: Document, changes: &DocumentChanges) -> Document {
    if let Some(name) = changes.name.clone() {
        document.name = name;
    }
    if let Some(description) = changes.description.clone() {
        document.description = description;
    }
    if let Some(url) = changes.url.clone() {
        document.url = url;
    }
    if let Some(is_draft) = changes.is_draft {
        document.is_draft = is_draft;
    }
    if let Some(is_public) = changes.is_public {
        document.is_public = is_public;
    }
    if let Some(tags) = changes.tags.clone() {
        document.tags = tags;
    }
    if let Some(category) = changes.category.clone() {
        document.category = category;
    }
    if let Some(file_size) = changes.file_size {
        document.file_size = file_size;
    }
    if let Some(file_type) = changes.file_type.clone() {
        document.file_type = file_type;
    }
    if let Some(file_name) = changes.file_name.clone() {
        document.file_name = file_name;
    }
    if let Some(updated_at) = changes.updated_at {
        document.updated_at = updated_at;
    }
    document
}
