use async_trait::async_trait;
use reqwest::StatusCode;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::models::{
    Collaborator, Document, DocumentChanges, LabelEntry, NewCollaborator, NewDocument,
};
use crate::params::QueryParams;

pub mod rest;

pub use rest::RestGateway;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Contract the store expects from the remote document catalog. Row
/// queries are parameterized by order/range/filters; mutations return
/// the raw status so the store can apply its own success rules (update
/// and delete only count 204 No Content as success).
#[async_trait]
pub trait DocumentGateway: Send + Sync + 'static {
    async fn select_documents(&self, params: &QueryParams) -> GatewayResult<Vec<Document>>;

    /// Count of public, non-draft documents.
    async fn count_public_documents(&self) -> GatewayResult<u64>;

    async fn fetch_mine(&self, user_id: Uuid) -> GatewayResult<Vec<Document>>;

    async fn fetch_private(&self, user_id: Uuid) -> GatewayResult<Vec<Document>>;

    async fn fetch_drafts(&self, user_id: Uuid) -> GatewayResult<Vec<Document>>;

    async fn fetch_shared_with_me(&self, user_id: Uuid) -> GatewayResult<Vec<Document>>;

    /// One document with its embedded user, collaborator set, and
    /// comment count. `None` when the id does not resolve.
    async fn fetch_document_detail(&self, id: Uuid) -> GatewayResult<Option<Document>>;

    async fn fetch_collaborators(&self, document_id: Uuid) -> GatewayResult<Vec<Collaborator>>;

    async fn insert_document(&self, row: &NewDocument) -> GatewayResult<Document>;

    async fn update_document(
        &self,
        id: Uuid,
        changes: &DocumentChanges,
    ) -> GatewayResult<StatusCode>;

    async fn delete_document(&self, id: Uuid) -> GatewayResult<StatusCode>;

    async fn delete_collaborators(&self, document_id: Uuid) -> GatewayResult<()>;

    async fn insert_collaborators(&self, rows: &[NewCollaborator]) -> GatewayResult<()>;

    async fn list_tags(&self) -> GatewayResult<Vec<LabelEntry>>;

    async fn list_categories(&self) -> GatewayResult<Vec<LabelEntry>>;
}
