use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_query_str(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// Single honored sort column. The remote catalog accepts multiple
/// order keys but the store only ever drives one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            field: "created_at".to_string(),
            direction: SortDirection::Descending,
        }
    }
}

/// Zero-based offset window, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub from: usize,
    pub to: usize,
}

impl PageRange {
    pub fn first(per_page: usize) -> Self {
        Self {
            from: 0,
            to: per_page.saturating_sub(1),
        }
    }

    pub fn width(&self) -> usize {
        self.to - self.from + 1
    }
}

/// Predicate bag applied on top of order/range. Empty filters match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFilters {
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub is_draft: Option<bool>,
    pub is_public: Option<bool>,
}

impl DocumentFilters {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.category.is_none()
            && self.search.is_none()
            && self.is_draft.is_none()
            && self.is_public.is_none()
    }
}

/// Query configuration handed to the gateway on every page fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub order: SortOrder,
    pub range: PageRange,
    pub filters: Option<DocumentFilters>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl QueryParams {
    pub fn with_page_size(per_page: usize) -> Self {
        Self {
            order: SortOrder::default(),
            range: PageRange::first(per_page),
            filters: None,
        }
    }

    pub fn set_range(&mut self, range: PageRange) {
        self.range = range;
    }

    pub fn set_filters(&mut self, filters: Option<DocumentFilters>) {
        self.filters = filters.filter(|f| !f.is_empty());
    }
}

/// User-scoped fetch selector. Unknown inputs fall back to `Mine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchCriteria {
    Mine,
    Private,
    Drafts,
    SharedWithMe,
}

impl FetchCriteria {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "private" => Self::Private,
            "drafts" => Self::Drafts,
            "shared_with_me" | "shared-with-me" | "sharedwithme" => Self::SharedWithMe,
            _ => Self::Mine,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mine => "mine",
            Self::Private => "private",
            Self::Drafts => "drafts",
            Self::SharedWithMe => "shared_with_me",
        }
    }
}
