//! Entitlement catalog: item model and count-authoritative pagination.
//!
//! The listing endpoint has a documented quirk: a request at `offset > 0`
//! may return far more (or fewer) items than the requested `limit`. The
//! fetch loop therefore treats the total count reported by the *first* page
//! as the authoritative target, advances the offset by the requested page
//! size rather than by items actually received, and terminates purely on
//! the accumulated count. Duplicate ids across overlapping pages are
//! dropped while accumulating.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::endpoints;
use crate::session::{Session, SessionError};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Session-level failure (transport, or a refresh that could not
    /// re-authenticate).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A page request returned a non-success status other than 401.
    #[error("HTTP {status} fetching catalog page at offset {offset}: {body}")]
    Page {
        /// Offset of the failing page request.
        offset: usize,
        /// The HTTP status code.
        status: u16,
        /// Response body, verbatim, for logging.
        body: String,
    },

    /// A page body could not be decoded.
    #[error("malformed catalog page at offset {offset}: {source}")]
    Decode {
        /// Offset of the page whose body failed to decode.
        offset: usize,
        #[source]
        source: serde_json::Error,
    },

    /// An entitlement record carried a non-numeric product id.
    #[error("catalog item {id} has non-numeric product id {raw:?}")]
    ProductId {
        /// The entitlement record id.
        id: String,
        /// The raw product id value as sent by the server.
        raw: String,
    },

    /// The server stopped returning new items before the reported total was
    /// reached. Surfaced instead of looping forever on empty pages.
    #[error("catalog ended early: server stopped returning new items at {collected} of {expected}")]
    ShortCatalog {
        /// Items accumulated before the server ran dry.
        collected: usize,
        /// The authoritative total from the first page.
        expected: u64,
    },
}

/// Availability of file formats for one item.
///
/// "Not yet queried" and "queried, none available" are distinct states; the
/// resolved set is only reachable once the types endpoint has answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatAvailability {
    /// The types endpoint has not been asked about this item.
    Unresolved,
    /// The types endpoint answered; the set may be empty.
    Resolved(BTreeSet<String>),
}

/// A single owned entitlement from the catalog.
#[derive(Debug, Clone)]
pub struct CatalogItem {
    /// Entitlement record id.
    pub id: String,
    /// Owning account id.
    pub user_id: String,
    /// Numeric product id used by the types and files endpoints.
    pub product_id: u64,
    /// Product title as listed.
    pub title: String,
    /// Product release timestamp.
    pub release_date: DateTime<Utc>,
    /// How the entitlement was granted (purchase, free promotion, ...).
    pub entitlement_source: String,
    /// Vendor-side entitlement link id.
    pub entitlement_link: String,
    /// Entitlement creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Entitlement update timestamp.
    pub updated_at: DateTime<Utc>,
    formats: FormatAvailability,
}

impl CatalogItem {
    /// The resolved format set, or `None` while the types endpoint has not
    /// been queried for this item.
    #[must_use]
    pub fn formats(&self) -> Option<&BTreeSet<String>> {
        match &self.formats {
            FormatAvailability::Unresolved => None,
            FormatAvailability::Resolved(set) => Some(set),
        }
    }

    /// Records the resolved format set. First write wins; the cell is
    /// written at most once per process.
    pub(crate) fn record_formats(&mut self, formats: BTreeSet<String>) {
        if matches!(self.formats, FormatAvailability::Unresolved) {
            self.formats = FormatAvailability::Resolved(formats);
        }
    }
}

/// One entitlement record as the listing endpoint sends it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductRecord {
    id: String,
    user_id: String,
    product_id: String,
    product_name: String,
    release_date: DateTime<Utc>,
    entitlement_source: String,
    entitlement_link: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRecord> for CatalogItem {
    type Error = CatalogError;

    fn try_from(record: ProductRecord) -> Result<Self, CatalogError> {
        // The wire sends productId as a string; the detail endpoints take it
        // as a number.
        let product_id =
            record
                .product_id
                .parse::<u64>()
                .map_err(|_| CatalogError::ProductId {
                    id: record.id.clone(),
                    raw: record.product_id.clone(),
                })?;
        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            product_id,
            title: record.product_name,
            release_date: record.release_date,
            entitlement_source: record.entitlement_source,
            entitlement_link: record.entitlement_link,
            created_at: record.created_at,
            updated_at: record.updated_at,
            formats: FormatAvailability::Unresolved,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    data: Vec<ProductRecord>,
}

struct CatalogPage {
    items: Vec<CatalogItem>,
    count: u64,
}

/// Fetches one page of the listing. 401 handling lives in the session.
async fn fetch_page(
    session: &mut Session,
    offset: usize,
    limit: usize,
) -> Result<CatalogPage, CatalogError> {
    let url = endpoints::products_url(session.base_url(), offset, limit);
    debug!(url = %url, "GET catalog page");

    let response = session.get_with_refresh(&url).await?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(CatalogError::Page {
            offset,
            status: status.as_u16(),
            body: text,
        });
    }

    let page: ProductsResponse =
        serde_json::from_str(&text).map_err(|e| CatalogError::Decode { offset, source: e })?;
    let count = page.count;
    let items = page
        .data
        .into_iter()
        .map(CatalogItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CatalogPage { items, count })
}

/// Fetches the complete entitlement catalog.
///
/// The first page's reported total is the authoritative target; later pages'
/// own counts are ignored. The offset advances by `page_size` regardless of
/// how many items each page actually returned, and the loop ends once the
/// accumulated (deduplicated) item count reaches the target. `on_page` is
/// called with `(collected, total)` after every page — an observability
/// hook, not a correctness requirement.
///
/// # Errors
///
/// Returns [`CatalogError::Page`] for any non-success page response (after
/// the session's single 401 refresh), [`CatalogError::ShortCatalog`] if the
/// server stops producing new items short of the target, and decode errors
/// for malformed bodies.
#[instrument(skip(session, on_page))]
pub async fn fetch_all<F>(
    session: &mut Session,
    page_size: usize,
    mut on_page: F,
) -> Result<Vec<CatalogItem>, CatalogError>
where
    F: FnMut(usize, u64),
{
    let mut offset = 0;
    let first = fetch_page(session, offset, page_size).await?;
    let total = first.count;

    let mut seen: HashSet<String> = HashSet::new();
    let mut items: Vec<CatalogItem> = Vec::new();
    extend_deduplicated(&mut items, &mut seen, first.items);
    on_page(items.len(), total);
    info!(collected = items.len(), total, "catalog page received");

    while (items.len() as u64) < total {
        offset += page_size;
        let page = fetch_page(session, offset, page_size).await?;
        let before = items.len();
        extend_deduplicated(&mut items, &mut seen, page.items);
        if items.len() == before {
            return Err(CatalogError::ShortCatalog {
                collected: items.len(),
                expected: total,
            });
        }
        on_page(items.len(), total);
        info!(collected = items.len(), total, "catalog page received");
    }

    Ok(items)
}

fn extend_deduplicated(
    items: &mut Vec<CatalogItem>,
    seen: &mut HashSet<String>,
    page: Vec<CatalogItem>,
) {
    for item in page {
        if seen.insert(item.id.clone()) {
            items.push(item);
        }
    }
}
