use crate::params::PageRange;

/// Offset-window pagination state for the document collection.
///
/// With an unknown total the controller refuses to advance: no
/// speculative fetches until a count has been observed.
#[derive(Debug, Clone)]
pub struct Paginator {
    per_page: usize,
    page_number: usize,
    range: PageRange,
    total_documents: Option<u64>,
    limit_reached: bool,
}

impl Paginator {
    pub fn new(per_page: usize) -> Self {
        let per_page = per_page.max(1);
        Self {
            per_page,
            page_number: 1,
            range: PageRange::first(per_page),
            total_documents: None,
            limit_reached: true,
        }
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn range(&self) -> PageRange {
        self.range
    }

    pub fn total_documents(&self) -> Option<u64> {
        self.total_documents
    }

    pub fn limit_reached(&self) -> bool {
        self.limit_reached
    }

    /// Moves the window to the next page. No-op when the limit has
    /// been reached; returns whether a fetch should follow.
    pub fn advance(&mut self) -> bool {
        if self.limit_reached {
            return false;
        }
        let from = self.range.to + 1;
        self.range = PageRange {
            from,
            to: from + self.per_page - 1,
        };
        self.page_number += 1;
        true
    }

    /// Records the remote total and re-evaluates the limit against the
    /// current collection length.
    pub fn set_total(&mut self, total: u64, current_len: usize) {
        self.total_documents = Some(total);
        self.recompute_limit(current_len);
    }

    /// `limit_reached` becomes true when the collection has caught up
    /// with the known total, and stays true while the total is unknown.
    pub fn recompute_limit(&mut self, current_len: usize) {
        self.limit_reached = match self.total_documents {
            Some(total) => current_len as u64 >= total,
            None => true,
        };
    }

    /// Back to page 1. The recorded total is kept; the limit is
    /// re-evaluated for an empty collection.
    pub fn reset(&mut self) {
        self.page_number = 1;
        self.range = PageRange::first(self.per_page);
        self.recompute_limit(0);
    }

    /// Forgets the recorded total, restoring the conservative default.
    pub fn clear_total(&mut self) {
        self.total_documents = None;
        self.limit_reached = true;
    }
}
