use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted document row as returned by the gateway. Tag and category
/// fields hold slugs; display names are derived at read time and never
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub is_draft: bool,
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub file_size: i64,
    pub file_type: Option<String>,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comment_count: Option<i64>,
    #[serde(default)]
    pub user: Option<UserSummary>,
}

/// Embedded user projection carried on a document row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Transient input projection for create/update. Server-assigned
/// fields (id, timestamps, file metadata, owner) are absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentForm {
    pub name: String,
    pub description: Option<String>,
    pub is_draft: bool,
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: Option<String>,
}

/// In-memory file handed to create/update before it reaches storage.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
}

impl FilePayload {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            content_type: None,
        }
    }

    /// Declared MIME type, falling back to a guess from the filename.
    pub fn resolved_content_type(&self) -> Option<String> {
        self.content_type.clone().or_else(|| {
            mime_guess::from_path(&self.file_name)
                .first()
                .map(|mime| mime.to_string())
        })
    }

    pub fn size(&self) -> i64 {
        self.bytes.len() as i64
    }
}

/// Row payload for a document insert.
#[derive(Debug, Clone, Serialize)]
pub struct NewDocument {
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub is_draft: bool,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub file_size: i64,
    pub file_type: Option<String>,
    pub file_name: String,
}

/// Changeset for a document update keyed by id. `None` fields are
/// omitted from the serialized payload and left untouched remotely.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_draft: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// User granted access to a document beyond its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

/// Join row inserted when reconciling a document's collaborator set.
#[derive(Debug, Clone, Serialize)]
pub struct NewCollaborator {
    pub document_id: Uuid,
    pub user_id: Uuid,
}

/// Slug/name pair from the tag or category catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEntry {
    pub slug: String,
    pub name: String,
}

/// Read-side projection: a document plus its resolved display labels.
#[derive(Debug, Clone)]
pub struct DocumentView {
    pub document: Document,
    pub tag_names: Vec<String>,
    pub category_name: Option<String>,
}

/// Document detail with its explicit collaborator set.
#[derive(Debug, Clone)]
pub struct DocumentDetail {
    pub document: Document,
    pub collaborators: Vec<Collaborator>,
}
