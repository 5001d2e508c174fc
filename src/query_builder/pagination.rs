//! # Pagination
//!
//! [`PageRequest`] turns a 0-based page index and size into LIMIT/OFFSET for a plan;
//! [`Page`] carries one page of rows with the total that matched before paging.

use super::ordering::Sort;
use serde::{Deserialize, Serialize};

/// Requested page (0-based index) with its sort orders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    #[serde(default)]
    pub sort: Sort,
}

impl PageRequest {
    /// Create a page request for page `page` (0-based) with `size` rows per page
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort: Sort::unsorted(),
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Keep the size within `1..=max_size`
    pub fn clamped(mut self, max_size: u32) -> Self {
        self.size = self.size.clamp(1, max_size.max(1));
        self
    }

    pub fn limit(&self) -> u32 {
        self.size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

/// One page of results plus the total number of matching rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<R> {
    pub items: Vec<R>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
}

impl<R> Page<R> {
    pub fn new(items: Vec<R>, total: u64, request: &PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            size: request.size,
        }
    }

    /// Calculate total pages
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 1;
        }
        self.total.div_ceil(u64::from(self.size))
    }

    /// Check if there's a next page
    pub fn has_next_page(&self) -> bool {
        u64::from(self.page) + 1 < self.total_pages()
    }

    /// Check if there's a previous page
    pub fn has_previous_page(&self) -> bool {
        self.page > 0
    }

    pub fn map<U, F: FnMut(R) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
        }
    }
}
