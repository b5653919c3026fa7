//! Offset pagination.
//!
//! List endpoints accept `skip`/`limit` query parameters. Out-of-range values
//! are clamped rather than rejected: a negative `skip` behaves as `0`, and a
//! `limit` above the configured maximum is reduced to the maximum.

use serde::Serialize;

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// A clamped `skip`/`limit` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    skip: i64,
    limit: i64,
}

impl PageRequest {
    /// Clamp raw query values into a valid request.
    ///
    /// `limit` values below one fall back to [`DEFAULT_PAGE_SIZE`] (itself
    /// capped at `max_limit`).
    #[must_use]
    pub fn new(skip: Option<i64>, limit: Option<i64>, max_limit: i64) -> Self {
        let max_limit = max_limit.max(1);
        let limit = match limit {
            Some(l) if l >= 1 => l.min(max_limit),
            _ => DEFAULT_PAGE_SIZE.min(max_limit),
        };
        Self {
            skip: skip.unwrap_or(0).max(0),
            limit,
        }
    }

    /// Rows to skip (SQL `OFFSET`).
    #[must_use]
    pub const fn skip(&self) -> i64 {
        self.skip
    }

    /// Rows to return (SQL `LIMIT`).
    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.limit
    }

    /// One-based page number implied by `skip` and `limit`.
    #[must_use]
    pub const fn page(&self) -> i64 {
        self.skip / self.limit + 1
    }
}

/// A page of results with the total row count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Total number of rows matching the filter.
    pub total: i64,
    /// Rows on this page.
    pub items: Vec<T>,
    /// One-based page number.
    pub page: i64,
    /// Page size.
    pub size: i64,
}

impl<T> Page<T> {
    /// Assemble a page from a request, its rows and the total count.
    #[must_use]
    pub const fn new(request: PageRequest, items: Vec<T>, total: i64) -> Self {
        Self {
            total,
            items,
            page: request.page(),
            size: request.limit(),
        }
    }
}
