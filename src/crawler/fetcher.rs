//! Search page fetcher
//!
//! This module issues the paged search requests, including:
//! - Building the shared HTTP client (connection pool and cookie store)
//! - Warming up the provider session for each keyword
//! - The randomized delay before every request
//! - Classifying each response into a `FetchOutcome`

use crate::config::{ClientConfig, Config, SearchConfig};
use crate::crawler::response::{decode_page, SearchPage};
use crate::crawler::throttle::Throttle;
use crate::RankError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Result of a single page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The provider returned a non-empty page
    Page(SearchPage),

    /// The provider returned no entries; there is nothing further to read
    EndOfData,

    /// Network error, timeout, or non-success status
    TransportFailure(String),

    /// The body did not match the expected response structure
    DecodeFailure(String),
}

/// Source of search result pages
///
/// One fetch is one network round trip. Implementations do not retry.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Prepares the session before the first page of a keyword
    async fn begin(&self, _keyword: &str) {}

    /// Requests one page of results
    ///
    /// # Arguments
    ///
    /// * `keyword` - Search query
    /// * `cursor` - Provider paging cursor, starting at 1
    /// * `page_size` - Number of entries requested
    /// * `page_number` - 1-based index of this request within the crawl
    async fn fetch(
        &self,
        keyword: &str,
        cursor: u64,
        page_size: u32,
        page_number: u32,
    ) -> FetchOutcome;
}

/// Builds the HTTP client shared by every request of a run
///
/// # Arguments
///
/// * `config` - Browser identity settings
/// * `timeout` - Per-request timeout
pub fn build_http_client(config: &ClientConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// `PageFetcher` backed by the provider's HTTP search endpoint
pub struct HttpPageFetcher {
    client: Client,
    endpoint: Url,
    search_page: Url,
    sort: String,
    accept_language: String,
    throttle: Throttle,
}

impl HttpPageFetcher {
    /// Creates a fetcher around an existing client
    pub fn new(
        client: Client,
        search: &SearchConfig,
        accept_language: &str,
        throttle: Throttle,
    ) -> Result<Self, RankError> {
        Ok(Self {
            client,
            endpoint: Url::parse(&search.endpoint)?,
            search_page: Url::parse(&search.search_page)?,
            sort: search.sort.clone(),
            accept_language: accept_language.to_string(),
            throttle,
        })
    }

    /// Builds the client and fetcher described by a configuration
    pub fn from_config(config: &Config) -> Result<Self, RankError> {
        let client = build_http_client(
            &config.client,
            Duration::from_secs(config.crawl.request_timeout),
        )?;
        Self::new(
            client,
            &config.search,
            &config.client.accept_language,
            Throttle::from_config(&config.crawl),
        )
    }

    /// Human search page for a keyword; also sent as the referer
    fn search_page_url(&self, keyword: &str) -> Url {
        let mut url = self.search_page.clone();
        url.query_pairs_mut().append_pair("query", keyword);
        url
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn begin(&self, keyword: &str) {
        let url = self.search_page_url(keyword);
        match self
            .client
            .get(url.clone())
            .header(ACCEPT_LANGUAGE, self.accept_language.as_str())
            .send()
            .await
        {
            Ok(response) => {
                tracing::debug!("Session warm-up {} -> {}", url, response.status());
            }
            Err(e) => {
                tracing::warn!("Session warm-up for '{}' failed: {}", keyword, e);
            }
        }
    }

    async fn fetch(
        &self,
        keyword: &str,
        cursor: u64,
        page_size: u32,
        page_number: u32,
    ) -> FetchOutcome {
        self.throttle.wait().await;

        let referer = self.search_page_url(keyword);
        let params = [
            ("cursor", cursor.to_string()),
            ("pageSize", page_size.to_string()),
            ("query", keyword.to_string()),
            ("sort", self.sort.clone()),
            ("searchMethod", "all.basic".to_string()),
            ("isFreshCategory", "false".to_string()),
            ("isOriginalQuerySearch", "false".to_string()),
        ];

        let response = match self
            .client
            .get(self.endpoint.clone())
            .query(&params)
            .header(ACCEPT, "*/*")
            .header(ACCEPT_LANGUAGE, self.accept_language.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(REFERER, referer.as_str())
            .header("sec-fetch-dest", "empty")
            .header("sec-fetch-mode", "cors")
            .header("sec-fetch-site", "same-origin")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchOutcome::TransportFailure(describe_transport_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::TransportFailure(format!("HTTP {}", status.as_u16()));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return FetchOutcome::TransportFailure(describe_transport_error(&e)),
        };

        match decode_page(&body, page_number) {
            Ok(Some(page)) => FetchOutcome::Page(page),
            Ok(None) => FetchOutcome::EndOfData,
            Err(message) => FetchOutcome::DecodeFailure(message),
        }
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    }
}
