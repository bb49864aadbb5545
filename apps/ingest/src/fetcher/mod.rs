//! Paginated access to the job posting catalog.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::errors::IngestError;

#[cfg(test)]
pub mod fake;
pub mod http;

pub use http::HttpListingSource;

/// Contract-type filter applied to every catalog query.
pub const CONTRACT_FILTER: &str = "contractor";

/// A paginated listing catalog.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Total number of listings matching the contract filter.
    async fn total_count(&self) -> Result<u64, IngestError>;

    /// One page of raw listing objects, newest first.
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Vec<Value>, IngestError>;
}

/// Pages needed to cover `total` listings.
///
/// Always `total / page_size + 1`: when `total` is an exact multiple this
/// requests one trailing empty page, but the tail is never missed.
pub fn page_count(total: u64, page_size: u32) -> u32 {
    let pages = total / u64::from(page_size.max(1)) + 1;
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Lazy walk over an inclusive page range. Each call to `next_page` issues
/// exactly one request; once exhausted the cursor stays exhausted.
pub struct PageCursor<'a, S: ListingSource + ?Sized> {
    source: &'a S,
    next: u32,
    last: u32,
    page_size: u32,
    exhausted: bool,
}

impl<'a, S: ListingSource + ?Sized> PageCursor<'a, S> {
    pub fn new(source: &'a S, first: u32, last: u32, page_size: u32) -> Self {
        Self {
            source,
            next: first,
            last,
            page_size,
            exhausted: first > last,
        }
    }

    /// Pages `1..=page_count(total, page_size)`.
    pub fn all_pages(source: &'a S, total: u64, page_size: u32) -> Self {
        Self::new(source, 1, page_count(total, page_size), page_size)
    }

    /// Pages not yet requested.
    pub fn remaining(&self) -> u32 {
        if self.exhausted {
            0
        } else {
            self.last - self.next + 1
        }
    }

    /// The page the next call to `next_page` will request.
    pub fn upcoming(&self) -> Option<u32> {
        (!self.exhausted).then_some(self.next)
    }

    pub async fn next_page(&mut self) -> Option<(u32, Result<Vec<Value>, IngestError>)> {
        if self.exhausted {
            return None;
        }

        let page = self.next;
        if page >= self.last {
            self.exhausted = true;
        } else {
            self.next += 1;
        }

        debug!("Requesting page {page} ({} per page)", self.page_size);
        Some((page, self.source.fetch_page(page, self.page_size).await))
    }
}
