//! HTTP client wrapper for discovery pages and candidate documents.
//!
//! One pooled client is created per run and reused for every request. The
//! connection pool limit matches the engine's concurrency bound so the
//! semaphore is the only throttle.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, REFERER};
use tracing::{debug, instrument};

use super::error::FetchError;
use crate::config::MirrorConfig;

/// Browser-like User-Agent; the document host serves plain pages and files
/// but rejects obvious non-browser agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
    image/avif,image/webp,image/apng,*/*;q=0.8,application/pdf";

const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7";

/// HTTP client for discovery pages and candidate documents.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    accepted_content_types: Vec<String>,
}

impl HttpClient {
    /// Creates a client sized and configured from the mirror configuration:
    /// pool limit = concurrency bound, total request timeout, gzip, and
    /// browser-like default headers.
    ///
    /// # Panics
    ///
    /// Panics if the client builder fails with the static configuration,
    /// which does not happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(config: &MirrorConfig) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(config.concurrency)
            .build()
            .expect("failed to build HTTP client with static configuration");

        Self {
            client,
            accepted_content_types: config.accepted_content_types.clone(),
        }
    }

    /// Fetches a discovery page as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::HttpStatus`] for any non-200 response, or a
    /// network/timeout error.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }

    /// Fetches one candidate document and persists it to `dest`.
    ///
    /// Classification happens here: non-200 statuses, disallowed content
    /// types, transport failures, and disk failures each map to their own
    /// [`FetchError`] variant. Parent directories are created as needed; the
    /// file is only written after the content-type gate passes, so a
    /// mismatched response never leaves bytes on disk.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] for every non-success outcome.
    #[instrument(skip(self, dest), fields(url = %url))]
    pub async fn fetch_document(
        &self,
        url: &str,
        referer: &str,
        dest: &Path,
    ) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .header(REFERER, referer)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !self
            .accepted_content_types
            .iter()
            .any(|accepted| content_type.contains(accepted.as_str()))
        {
            return Err(FetchError::content_mismatch(url, content_type));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| FetchError::io(dest, e))?;

        let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        debug!(bytes = size, path = %dest.display(), "document persisted");
        Ok(size)
    }
}
