//! HTTP client for the inventory endpoint.

use std::fmt;
use std::time::Duration;

use tracing::{debug, warn};

use crate::download::RetryPolicy;

use super::error::FetchError;
use super::filter::QueryFilter;
use super::pager::DescriptorPager;
use super::types::PageResult;

/// Default timeout for inventory page requests.
const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 60;

/// HTTP basic-auth credentials for the access point.
///
/// The same credentials authenticate both inventory pages and the file
/// locations they point at.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Client for a WASAPI webdata endpoint.
///
/// Issues one GET per page and decodes the JSON body into [`PageResult`].
/// Transient failures (connection errors, 5xx) are retried with backoff
/// before surfacing; auth failures and malformed bodies surface at once.
#[derive(Debug, Clone)]
pub struct InventoryClient {
    http: reqwest::Client,
    base_uri: String,
    credentials: Option<Credentials>,
    retry: RetryPolicy,
}

impl InventoryClient {
    /// Create a client for the given webdata base URI.
    pub fn new(base_uri: impl Into<String>) -> Result<Self, FetchError> {
        let base_uri = base_uri.into();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_PAGE_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::Connection {
                url: base_uri.clone(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_uri,
            credentials: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Authenticate requests with HTTP basic auth.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Override the page-level retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying HTTP client, shared with the file downloader so both
    /// use one connection pool.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Credentials, if any were configured.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Fetch one inventory page.
    ///
    /// With no cursor the filter's query parameters are sent against the
    /// base URI; a cursor is a complete `next` URL from a previous page and
    /// is requested as-is.
    pub async fn fetch_page(
        &self,
        filter: &QueryFilter,
        cursor: Option<&str>,
    ) -> Result<PageResult, FetchError> {
        let mut attempt = 1;
        loop {
            match self.request_page(filter, cursor).await {
                Ok(page) => return Ok(page),
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "inventory page request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Total number of matching files, from the first page's `count` field.
    ///
    /// Access points are not required to report a count.
    pub async fn count(&self, filter: &QueryFilter) -> Result<Option<u64>, FetchError> {
        let page = self.fetch_page(filter, None).await?;
        Ok(page.count)
    }

    /// Walk every page, returning the number of matching files and their
    /// combined size in bytes. Downloads nothing.
    pub async fn total_size(&self, filter: &QueryFilter) -> Result<(u64, u64), FetchError> {
        let mut pager = DescriptorPager::new(self.clone(), filter.clone());
        let mut files = 0u64;
        let mut bytes = 0u64;
        while let Some(descriptors) = pager.next_page().await? {
            for descriptor in &descriptors {
                files += 1;
                bytes += descriptor.size;
            }
        }
        Ok((files, bytes))
    }

    async fn request_page(
        &self,
        filter: &QueryFilter,
        cursor: Option<&str>,
    ) -> Result<PageResult, FetchError> {
        let url = cursor.unwrap_or(&self.base_uri).to_string();
        debug!(%url, "requesting inventory page");

        let mut request = self.http.get(&url);
        if cursor.is_none() {
            request = request.query(&filter.to_query());
        }
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request.send().await.map_err(|e| FetchError::Connection {
            url: url.clone(),
            source: e,
        })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(FetchError::Auth {
                url,
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response
            .json::<PageResult>()
            .await
            .map_err(|e| FetchError::Malformed {
                url,
                reason: e.to_string(),
            })
    }
}
