//! Authenticated session against the entitlement service.
//!
//! A [`Session`] owns the account credentials, a single shared HTTP client,
//! and the cached bearer header. The header is obtained lazily on first use
//! and regenerated exactly once per observed 401 via [`Session::refresh`].
//! Tokens live only in memory; nothing is ever written to disk.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::endpoints;

/// Default HTTP connect timeout (30 seconds).
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
const READ_TIMEOUT_SECS: u64 = 300;

/// User-Agent identifying the tool (good citizenship; RFC 9308).
fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("bookpull/{version} (personal-library-tool)")
}

/// Account credentials, supplied once at startup. Immutable.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Manual Debug: the password must never reach logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The token endpoint rejected the credentials (or failed outright).
    ///
    /// This is fatal for the whole run: a new username/password cannot be
    /// supplied mid-run, so the binary reports status and body and exits
    /// with a distinct code.
    #[error("authentication failed with HTTP {status}: {body}")]
    AuthFailed {
        /// The HTTP status returned by the token endpoint.
        status: u16,
        /// Response body, verbatim, for the user to inspect.
        body: String,
    },

    /// Network-level error (DNS, connection refused, TLS, timeout).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The token endpoint returned 200 with a body we could not decode.
    #[error("malformed response from {url}: {source}")]
    Decode {
        /// The URL whose response failed to decode.
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SessionError {
    pub(crate) fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub(crate) fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    access: String,
}

/// Authenticated session: credentials, shared HTTP client, cached header.
///
/// Token state is a single mutable cell consumed sequentially — whichever
/// component needs a header next borrows the session. At most one header
/// value is current at any time; [`Session::refresh`] discards the old value
/// before obtaining a new one, so stale tokens are never reused.
pub struct Session {
    client: Client,
    base_url: Url,
    credentials: Credentials,
    header: Option<String>,
}

impl Session {
    /// Creates a session for the given service origin.
    ///
    /// The HTTP client is built once and reused for every request in the run
    /// (connection pooling). No network traffic happens until the first
    /// operation needs a header.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(base_url: Url, credentials: Credentials) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            base_url: endpoints::normalize_base(base_url),
            credentials,
            header: None,
        }
    }

    /// The normalized service origin this session talks to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the current bearer header, authenticating first if absent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AuthFailed`] when the token endpoint rejects
    /// the credentials, or a transport/decode error for the request itself.
    pub async fn header(&mut self) -> Result<String, SessionError> {
        if let Some(header) = &self.header {
            return Ok(header.clone());
        }
        self.authenticate().await
    }

    /// Clears the cached token and re-authenticates.
    ///
    /// Called exclusively in response to an observed 401 — never
    /// speculatively.
    ///
    /// # Errors
    ///
    /// Same as [`Session::header`].
    pub async fn refresh(&mut self) -> Result<String, SessionError> {
        debug!("bearer token expired, refreshing session");
        self.header = None;
        self.authenticate().await
    }

    /// POSTs the credentials and caches the resulting bearer header.
    #[instrument(skip(self))]
    async fn authenticate(&mut self) -> Result<String, SessionError> {
        let url = endpoints::auth_url(&self.base_url);
        debug!(url = %url, "POST token request");

        let body = TokenRequest {
            username: &self.credentials.username,
            password: &self.credentials.password,
        };
        // Credentials go as a structured JSON body, not form-encoded.
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::network(&url, e))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            return Err(SessionError::AuthFailed {
                status: status.as_u16(),
                body: text,
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&text).map_err(|e| SessionError::decode(&url, e))?;
        let header = format!("Bearer {}", token.data.access);
        self.header = Some(header.clone());
        info!("authenticated against {}", self.base_url);
        Ok(header)
    }

    /// Issues an authorized GET, refreshing the session once on a 401.
    ///
    /// This is the single implementation of the 401 rule shared by catalog
    /// paging, type resolution, URL resolution, and the streaming GET: an
    /// explicit two-attempt sequence, never recursion. The second response
    /// is returned as-is — a repeated 401 escalates at the call site.
    ///
    /// # Errors
    ///
    /// Returns a transport error for either attempt, or an auth error if the
    /// refresh itself fails.
    pub async fn get_with_refresh(&mut self, url: &str) -> Result<reqwest::Response, SessionError> {
        let header = self.header().await?;
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, &header)
            .send()
            .await
            .map_err(|e| SessionError::network(url, e))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let header = self.refresh().await?;
        self.client
            .get(url)
            .header(AUTHORIZATION, &header)
            .send()
            .await
            .map_err(|e| SessionError::network(url, e))
    }
}
