//! Per-item file-format resolution.
//!
//! Each item's available-format set is fetched from the types endpoint at
//! most once per process and cached on the item. A failed query records an
//! empty set (so the item is not re-queried) and reports the failure to the
//! caller — a single item must never abort the whole run.

use std::collections::BTreeSet;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::catalog::CatalogItem;
use crate::endpoints;
use crate::session::{Session, SessionError};

/// Errors from type resolution. All item-scoped: callers log and move on.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Session-level failure (transport, or a refresh that could not
    /// re-authenticate).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The types endpoint answered with a non-success status (a 401 here
    /// means the session's single refresh already happened and did not
    /// help).
    #[error("HTTP {status} resolving types for product {product_id}: {body}")]
    Status {
        /// Product whose types query failed.
        product_id: u64,
        /// The HTTP status code.
        status: u16,
        /// Response body, verbatim, for logging.
        body: String,
    },
}

#[derive(Debug, Deserialize)]
struct TypesResponse {
    #[serde(default)]
    data: Vec<TypesRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypesRecord {
    #[serde(default)]
    file_types: Vec<String>,
}

/// Returns the item's available formats, querying the types endpoint only
/// if the item's cell is still unresolved.
///
/// Idempotent once populated: a second invocation returns the cached set
/// with no network call, so callers can branch on membership freely.
///
/// # Errors
///
/// On a non-success response the item is marked as having no formats (it
/// will not be re-queried) and [`FormatError::Status`] is returned so the
/// caller can log status and body.
pub async fn ensure_types(
    session: &mut Session,
    item: &mut CatalogItem,
) -> Result<BTreeSet<String>, FormatError> {
    if let Some(cached) = item.formats() {
        return Ok(cached.clone());
    }

    let url = endpoints::types_url(session.base_url(), item.product_id);
    debug!(url = %url, "GET file types");

    let response = session.get_with_refresh(&url).await?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        item.record_formats(BTreeSet::new());
        return Err(FormatError::Status {
            product_id: item.product_id,
            status: status.as_u16(),
            body: text,
        });
    }

    // First result's format list; a missing field or empty data array means
    // the item has no downloadable formats.
    let formats: BTreeSet<String> = serde_json::from_str::<TypesResponse>(&text)
        .map(|types| {
            types
                .data
                .into_iter()
                .next()
                .map(|record| record.file_types.into_iter().collect())
                .unwrap_or_default()
        })
        .unwrap_or_default();

    item.record_formats(formats.clone());
    Ok(formats)
}
