//! Listing support: filters and pagination
//!
//! Listings are deterministic and recency-first: ordered by creation time
//! descending, with the store-assigned sequence number as tiebreaker.

use super::transaction::{Transaction, TransactionStatus, TransactionType};
use serde::{Deserialize, Serialize};

/// Optional type/status filter for transaction listings
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TransactionFilter {
    pub tx_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
}

impl TransactionFilter {
    /// Whether a transaction passes this filter
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(tx_type) = self.tx_type {
            if tx.tx_type != tx_type {
                return false;
            }
        }
        if let Some(status) = self.status {
            if tx.status != status {
                return false;
            }
        }
        true
    }
}

/// One-based page request
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        PageRequest {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }
}

/// A page of results with its count envelope
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Total matching records across all pages
    pub total: usize,

    /// Total number of pages
    pub pages: usize,

    /// The page these items belong to (one-based)
    pub page: usize,
}

impl<T> Page<T> {
    /// Slice a fully filtered, ordered result set into one page
    ///
    /// The request fields are clamped here as well as in `PageRequest::new`:
    /// the fields are public and deserializable, so a zero can arrive
    /// without passing through the constructor.
    pub fn slice(mut all: Vec<T>, request: PageRequest) -> Self {
        let page = request.page.max(1);
        let per_page = request.per_page.max(1);
        let total = all.len();
        let pages = total.div_ceil(per_page);
        let start = (page - 1).saturating_mul(per_page);
        let items: Vec<T> = if start >= total {
            Vec::new()
        } else {
            all.drain(start..(start + per_page).min(total)).collect()
        };
        Page {
            items,
            total,
            pages,
            page,
        }
    }
}
