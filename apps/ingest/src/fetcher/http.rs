use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::IngestError;
use crate::fetcher::{ListingSource, CONTRACT_FILTER};

/// Default catalog root, used when `LISTINGS_API_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "https://www.free-work.com/api";

/// `ListingSource` over the catalog's REST API.
#[derive(Clone)]
pub struct HttpListingSource {
    client: Client,
    base_url: String,
}

impl HttpListingSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IngestError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, IngestError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Catalog returned {status} for {url}");
            return Err(IngestError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
                message: truncate(&body, 200),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn total_count(&self) -> Result<u64, IngestError> {
        let url = format!("{}/job_postings/count", self.base_url);
        let body = self
            .get_text(&url, &[("contracts", CONTRACT_FILTER.to_string())])
            .await?;
        let total = parse_count(&body)?;
        debug!("Catalog reports {total} listings");
        Ok(total)
    }

    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Vec<Value>, IngestError> {
        let url = format!("{}/job_postings", self.base_url);
        let query = [
            ("contracts", CONTRACT_FILTER.to_string()),
            ("order", "date".to_string()),
            ("page", page.to_string()),
            ("itemsPerPage", page_size.to_string()),
        ];
        let body = self.get_text(&url, &query).await?;
        let listings = parse_page(&body)?;
        debug!("Page {page} returned {} listings", listings.len());
        Ok(listings)
    }
}

/// The count endpoint answers with a bare integer.
fn parse_count(body: &str) -> Result<u64, IngestError> {
    serde_json::from_str::<u64>(body).map_err(|_| {
        IngestError::format(format!(
            "count body is not a single integer: {}",
            truncate(body, 80)
        ))
    })
}

/// A page body must be a JSON array. Its items are decoded later, one at a
/// time, so a malformed item only fails that listing.
fn parse_page(body: &str) -> Result<Vec<Value>, IngestError> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Array(items) = value else {
        return Err(IngestError::format("page body is not a list of listings"));
    };
    Ok(items)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
