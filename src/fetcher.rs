//! Page fetching — the contract the pagination engine drives, plus the
//! HTTP implementation used for real listing sources.
//!
//! A fetcher owns everything source-specific: how a page index turns into a
//! request, where the records array lives in the response, and how (or
//! whether) the total page count can be discovered upfront. The engine only
//! sees [`PageFetcher`].

use crate::config::{EngineConfig, TotalPagesSource};
use crate::error::FetchError;
use crate::types::{PageCount, PageId, RawRecord};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Timeout for a single page request
const PAGE_FETCH_TIMEOUT_SECS: u64 = 30;

/// Retrieves one page of raw records from a listing source
///
/// Implementations must be safe to call concurrently; the pagination engine
/// issues up to its concurrency limit of `fetch_page` calls at once.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Source name, used for provenance tagging and snapshot filenames
    fn name(&self) -> &str;

    /// Discover how many pages this source has
    ///
    /// Called once before scheduling begins. Sources that cannot tell return
    /// [`PageCount::Unknown`] and the engine runs until the first empty page.
    async fn page_count(&self) -> Result<PageCount, FetchError>;

    /// Fetch one page of records
    ///
    /// An empty vec is a valid result and signals exhaustion, not an error.
    async fn fetch_page(&self, page: PageId) -> Result<Vec<RawRecord>, FetchError>;
}

/// HTTP fetcher for JSON listing APIs, configured per engine
///
/// Builds `base_url?page_param=<n>[&size_param=<k>]` requests and extracts
/// the records array via a JSON pointer. The total page count, when the
/// source exposes one, is read off the first-page body.
pub struct HttpListingFetcher {
    client: reqwest::Client,
    config: EngineConfig,
}

impl HttpListingFetcher {
    /// Create a fetcher for one engine
    pub fn new(config: EngineConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PAGE_FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::TotalPagesUnavailable {
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    /// Create a fetcher with a caller-supplied client (shared connection pool)
    pub fn with_client(client: reqwest::Client, config: EngineConfig) -> Self {
        Self { client, config }
    }

    fn page_url(&self, page: PageId) -> Result<Url, FetchError> {
        let mut url =
            Url::parse(&self.config.base_url).map_err(|e| FetchError::InvalidUrl {
                url: self.config.base_url.clone(),
                reason: e.to_string(),
            })?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(
                &self.config.page_param,
                &(self.config.first_page + page.get()).to_string(),
            );
            if let Some(size_param) = &self.config.size_param {
                pairs.append_pair(size_param, &self.config.results_per_page.to_string());
            }
        }

        Ok(url)
    }

    async fn fetch_body(&self, page: PageId) -> Result<Value, FetchError> {
        let url = self.page_url(page)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request { page, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                page,
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::MalformedBody {
                page,
                reason: e.to_string(),
            })
    }

    fn extract_records(&self, page: PageId, body: &Value) -> Result<Vec<RawRecord>, FetchError> {
        let pointer = &self.config.records_pointer;
        let records = body
            .pointer(pointer)
            .ok_or_else(|| FetchError::MissingField {
                page,
                pointer: pointer.clone(),
            })?;

        let array = records.as_array().ok_or_else(|| FetchError::MalformedBody {
            page,
            reason: format!("value at {pointer:?} is not an array"),
        })?;

        array
            .iter()
            .map(|entry| match entry {
                Value::Object(fields) => Ok(RawRecord::from_map(fields.clone())),
                other => Err(FetchError::MalformedBody {
                    page,
                    reason: format!("expected record object, got {other}"),
                }),
            })
            .collect()
    }
}

#[async_trait]
impl PageFetcher for HttpListingFetcher {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn page_count(&self) -> Result<PageCount, FetchError> {
        let Some(total) = &self.config.total else {
            return Ok(PageCount::Unknown);
        };

        let first = PageId::new(0);
        let body = self
            .fetch_body(first)
            .await
            .map_err(|e| FetchError::TotalPagesUnavailable {
                reason: e.to_string(),
            })?;

        let read_count = |pointer: &str| -> Result<u64, FetchError> {
            body.pointer(pointer)
                .and_then(Value::as_u64)
                .ok_or_else(|| FetchError::TotalPagesUnavailable {
                    reason: format!("no numeric value at {pointer:?} in first-page body"),
                })
        };

        match total {
            TotalPagesSource::Pages { pointer } => Ok(PageCount::Known(read_count(pointer)? as u32)),
            TotalPagesSource::Records { pointer } => {
                let records = read_count(pointer)?;
                let per_page = u64::from(self.config.results_per_page.max(1));
                Ok(PageCount::Known(records.div_ceil(per_page) as u32))
            }
        }
    }

    async fn fetch_page(&self, page: PageId) -> Result<Vec<RawRecord>, FetchError> {
        let body = self.fetch_body(page).await?;
        self.extract_records(page, &body)
    }
}
