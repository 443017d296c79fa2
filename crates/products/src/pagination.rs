//! Page-based pagination over available products.

use serde::Serialize;

use catalog_core::{DomainError, DomainResult};

/// Page request: 1-based `page` and a page size `limit`, both positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> DomainResult<Self> {
        if page == 0 {
            return Err(DomainError::validation("page must be a positive number"));
        }
        if limit == 0 {
            return Err(DomainError::validation("limit must be a positive number"));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of rows to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// Page metadata returned next to the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub last_page: u64,
}

impl PageMeta {
    /// `last_page = ceil(total / limit)`; zero when there are no rows.
    pub fn compute(total: u64, pagination: Pagination) -> Self {
        Self {
            total,
            page: pagination.page(),
            last_page: total.div_ceil(u64::from(pagination.limit())),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}
