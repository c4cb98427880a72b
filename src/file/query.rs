//! Listing queries and result pages.

use serde::Serialize;

use super::{FileRecord, StorageSource};

/// Page size used when none is given.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Normalized listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileQuery {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    /// Lower-cased substring matched against both names.
    pub search: Option<String>,
    pub category: Option<String>,
    pub source: Option<StorageSource>,
}

impl Default for FileQuery {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl FileQuery {
    /// Build a query, clamping `page` to at least 1 and `limit` to
    /// `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_SIZE as i64)
            .clamp(1, MAX_PAGE_SIZE as i64) as u32;

        Self {
            page,
            limit,
            search: None,
            category: None,
            source: None,
        }
    }

    /// Filter by a case-insensitive substring; blank terms are ignored.
    pub fn with_search(mut self, term: Option<&str>) -> Self {
        self.search = term
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        self
    }

    /// Filter by exact category; blank values are ignored.
    pub fn with_category(mut self, category: Option<&str>) -> Self {
        self.category = category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }

    pub fn with_source(mut self, source: Option<StorageSource>) -> Self {
        self.source = source;
        self
    }

    /// Number of records skipped before this page.
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }

    /// Check whether a record passes every filter.
    pub fn matches(&self, record: &FileRecord) -> bool {
        if let Some(term) = &self.search {
            if !record.name_contains(term) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &record.category != category {
                return false;
            }
        }
        if let Some(source) = self.source {
            if record.source != source {
                return false;
            }
        }
        true
    }

    /// Filter, sort newest first and paginate an in-memory record set.
    pub fn apply(&self, records: Vec<FileRecord>) -> FilePage {
        let mut matching: Vec<FileRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();
        sort_newest_first(&mut matching);

        let total = matching.len() as u64;
        let files = matching
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .collect();

        FilePage::new(files, total, self)
    }
}

/// Order records by upload time, newest first, then by id descending.
pub(crate) fn sort_newest_first(records: &mut [FileRecord]) {
    records.sort_by(|a, b| {
        b.uploaded_at
            .cmp(&a.uploaded_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// One page of listing results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    pub files: Vec<FileRecord>,
    /// Number of records matching the filters across all pages.
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    /// Never less than 1, even for an empty result.
    pub total_pages: u64,
}

impl FilePage {
    pub fn new(files: Vec<FileRecord>, total: u64, query: &FileQuery) -> Self {
        let total_pages = total.div_ceil(query.limit as u64).max(1);
        Self {
            files,
            total,
            page: query.page,
            limit: query.limit,
            total_pages,
        }
    }
}
