//! Pagination model
//!
//! Offset pagination shared by every list endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Page size used when the client does not ask for one
pub const DEFAULT_LIMIT: i64 = 20;

/// Largest page size a client can get; bigger requests are clamped
pub const MAX_LIMIT: i64 = 100;

/// Rejected pagination parameters
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("limit must be at least 1")]
    InvalidLimit,
    #[error("offset must not be negative")]
    InvalidOffset,
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListParams {
    /// Maximum number of items to return (1..=100)
    pub limit: i64,
    /// Number of items to skip
    pub offset: i64,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl ListParams {
    /// Build pagination parameters from optional client input.
    ///
    /// Missing values fall back to the defaults and a limit above
    /// [`MAX_LIMIT`] is clamped.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Result<Self, PaginationError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if limit < 1 {
            return Err(PaginationError::InvalidLimit);
        }
        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(PaginationError::InvalidOffset);
        }
        Ok(Self {
            limit: limit.min(MAX_LIMIT),
            offset,
        })
    }

    /// Slice an in-memory, already ordered collection by these bounds
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(0);
        items.into_iter().skip(offset).take(limit).collect()
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> PagedResult<T> {
    /// Create a new paginated result
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            limit: params.limit,
            offset: params.offset,
        }
    }

    /// Convert the items while keeping the page bounds
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}
