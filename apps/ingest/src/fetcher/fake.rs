use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::IngestError;
use crate::fetcher::ListingSource;

/// Scripted catalog. Pages without scripted content come back empty.
#[derive(Default)]
pub struct FakeSource {
    pub total: u64,
    pub pages: HashMap<u32, Vec<Value>>,
    pub failing_pages: HashSet<u32>,
    pub failing_count: bool,
    requested: Mutex<Vec<u32>>,
}

impl FakeSource {
    pub fn with_total(total: u64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32, listings: Vec<Value>) -> Self {
        self.pages.insert(page, listings);
        self
    }

    pub fn fail_count(mut self) -> Self {
        self.failing_count = true;
        self
    }

    pub fn fail_page(mut self, page: u32) -> Self {
        self.failing_pages.insert(page);
        self
    }

    pub fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingSource for FakeSource {
    async fn total_count(&self) -> Result<u64, IngestError> {
        if self.failing_count {
            return Err(IngestError::UpstreamStatus {
                status: 502,
                url: "fake://job_postings/count".to_string(),
                message: "bad gateway".to_string(),
            });
        }
        Ok(self.total)
    }

    async fn fetch_page(&self, page: u32, _page_size: u32) -> Result<Vec<Value>, IngestError> {
        self.requested.lock().unwrap().push(page);
        if self.failing_pages.contains(&page) {
            return Err(IngestError::format(format!("page {page} body is not a list")));
        }
        Ok(self.pages.get(&page).cloned().unwrap_or_default())
    }
}
