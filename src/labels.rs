use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::StoreResult;
use crate::gateway::DocumentGateway;
use crate::models::{Document, DocumentView, LabelEntry};

/// Pure slug-to-name resolution against the tag and category catalogs.
/// Slugs missing from a catalog pass through unchanged, so resolution
/// never fails and resolving twice yields the same result.
pub struct LabelResolver<'a> {
    tags: &'a [LabelEntry],
    categories: &'a [LabelEntry],
}

impl<'a> LabelResolver<'a> {
    pub fn new(tags: &'a [LabelEntry], categories: &'a [LabelEntry]) -> Self {
        Self { tags, categories }
    }

    pub fn resolve(&self, document: &Document) -> DocumentView {
        let tag_names = document
            .tags
            .iter()
            .map(|slug| lookup(self.tags, slug))
            .collect();
        let category_name = document
            .category
            .as_deref()
            .map(|slug| lookup(self.categories, slug));

        DocumentView {
            document: document.clone(),
            tag_names,
            category_name,
        }
    }
}

fn lookup(entries: &[LabelEntry], slug: &str) -> String {
    entries
        .iter()
        .find(|entry| entry.slug == slug)
        .map(|entry| entry.name.clone())
        .unwrap_or_else(|| slug.to_string())
}

/// Which catalog a `LabelCatalog` instance fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Tags,
    Categories,
}

/// Lazily-loaded slug/name catalog backed by the gateway. Owned by the
/// session context; the document store only reads it.
pub struct LabelCatalog {
    gateway: Arc<dyn DocumentGateway>,
    kind: LabelKind,
    entries: RwLock<Option<Vec<LabelEntry>>>,
}

impl LabelCatalog {
    pub fn new(gateway: Arc<dyn DocumentGateway>, kind: LabelKind) -> Self {
        Self {
            gateway,
            kind,
            entries: RwLock::new(None),
        }
    }

    /// Fetches the catalog on first use; later calls are cheap reads.
    pub async fn ensure_loaded(&self) -> StoreResult<()> {
        {
            let guard = self
                .entries
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if guard.is_some() {
                return Ok(());
            }
        }

        let loaded = match self.kind {
            LabelKind::Tags => self.gateway.list_tags().await?,
            LabelKind::Categories => self.gateway.list_categories().await?,
        };
        debug!(kind = ?self.kind, count = loaded.len(), "label catalog loaded");

        let mut guard = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.get_or_insert(loaded);
        Ok(())
    }

    /// Snapshot of the catalog; empty until the first `ensure_loaded`.
    pub fn entries(&self) -> Vec<LabelEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }
}
