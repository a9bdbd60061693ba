//! Pagination helpers shared by the list endpoints
//!
//! Each list clamps `per_page` to its own bounds; pages are 1-indexed.

/// Page size bounds for one list endpoint
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub min: i64,
    pub max: i64,
    pub default: i64,
}

pub const SESSION_PAGES: PageLimits = PageLimits { min: 10, max: 50, default: 20 };
pub const LOG_PAGES: PageLimits = PageLimits { min: 20, max: 100, default: 50 };
pub const TRANSACTION_PAGES: PageLimits = PageLimits { min: 1, max: 100, default: 50 };
pub const EBAY_PAGES: PageLimits = PageLimits { min: 10, max: 100, default: 50 };

/// Sanitized page request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    /// Current page number (1-indexed)
    pub page: i64,
    pub per_page: i64,
    /// Offset for SQL LIMIT/OFFSET
    pub offset: i64,
}

impl PageRequest {
    /// Clamp the caller's page and page size
    ///
    /// # Arguments
    /// * `page` - requested page, `None` or < 1 means the first page
    /// * `per_page` - requested size, `None` means the list default
    /// * `limits` - the endpoint's bounds
    pub fn new(page: Option<i64>, per_page: Option<i64>, limits: PageLimits) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page
            .unwrap_or(limits.default)
            .clamp(limits.min, limits.max);

        Self {
            page,
            per_page,
            offset: (page - 1) * per_page,
        }
    }

    /// Number of pages needed for `total` rows
    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.per_page - 1) / self.per_page
    }
}
