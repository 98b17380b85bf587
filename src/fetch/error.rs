//! Error types for the fetch module.
//!
//! Every fetch failure maps onto a durable reason tag via
//! [`FetchError::reason`]; the tags are what the state record stores, so they
//! must be stable across releases.

use std::path::PathBuf;

use thiserror::Error;

/// Reason tag for a 200 response with a disallowed content type. Distinct
/// from every decimal-status tag and from `exception`.
pub const REASON_CONTENT_MISMATCH: &str = "content-mismatch";

/// Reason tag for transport, timeout, decode, and file-write failures.
pub const REASON_EXCEPTION: &str = "exception";

/// Errors that can occur fetching a single candidate or discovery page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection refused, TLS, decode).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-200 HTTP response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// 200 response whose declared Content-Type is not accepted.
    #[error("unexpected content type {content_type:?} for {url}")]
    ContentMismatch {
        /// The URL that responded.
        url: String,
        /// The declared Content-Type.
        content_type: String,
    },

    /// File system error persisting the downloaded bytes.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Creates a network or timeout error from a reqwest error.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a content-mismatch error.
    pub fn content_mismatch(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::ContentMismatch {
            url: url.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The durable failure-reason tag recorded in the state record.
    ///
    /// `404` and other statuses become the decimal status code; a disallowed
    /// content type becomes `content-mismatch`; transport, timeout, and disk
    /// failures all become `exception`.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::HttpStatus { status, .. } => status.to_string(),
            Self::ContentMismatch { .. } => REASON_CONTENT_MISMATCH.to_string(),
            Self::Network { .. } | Self::Timeout { .. } | Self::Io { .. } => {
                REASON_EXCEPTION.to_string()
            }
        }
    }
}
