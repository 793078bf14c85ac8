//! Error types for the download pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionError;

/// Errors from URL resolution and streaming downloads.
///
/// Everything except the wrapped session auth failure is item-scoped: the
/// caller reports it, marks the (item, format) pair failed, and continues.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Session-level failure (transport, or a refresh that could not
    /// re-authenticate).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The files endpoint refused to produce a signed URL (a 401 here means
    /// the session's single refresh already happened and did not help).
    #[error("HTTP {status} resolving download URL for product {product_id} as {format}: {body}")]
    UrlResolve {
        /// Product whose files query failed.
        product_id: u64,
        /// The requested format.
        format: String,
        /// The HTTP status code.
        status: u16,
        /// Response body, verbatim, for logging.
        body: String,
    },

    /// The files endpoint answered 200 but the signed URL was missing or
    /// empty. Treated as "cannot download, skip this pair".
    #[error("no signed URL returned for product {product_id} as {format}")]
    MissingUrl {
        /// Product whose files query came back empty.
        product_id: u64,
        /// The requested format.
        format: String,
    },

    /// The streaming GET on the signed URL returned an error status.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The signed URL that failed.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Network-level error mid-transfer.
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// File system error (create, write, flush, rename).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub(crate) fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error for the streaming GET.
    pub(crate) fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// No blanket From<reqwest::Error> / From<std::io::Error>: the variants need
// context (url, path) the source errors do not carry. The helper
// constructors are the supported way to build these.
