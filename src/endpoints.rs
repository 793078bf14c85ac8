//! Endpoint path construction for the entitlement service.
//!
//! Every URL the tool requests is assembled here, so a service-side path
//! change touches exactly one module. The base origin is configurable
//! (`--base-url`); paths are relative to it.

use url::Url;

/// Production origin of the entitlement service.
pub const DEFAULT_BASE_URL: &str = "https://services.packtpub.com/";

/// Token endpoint. POST with a JSON `{"username", "password"}` body.
const AUTH_PATH: &str = "auth-v1/users/tokens";

/// Entitlement listing. Sorted newest-first; paged by `offset`/`limit`.
const PRODUCTS_PATH: &str = "entitlements-v1/users/me/products";

/// Per-product metadata root (types and file endpoints hang off this).
const PRODUCT_DETAIL_PATH: &str = "products-v1/products";

/// URL of the token endpoint.
#[must_use]
pub fn auth_url(base: &Url) -> String {
    format!("{base}{AUTH_PATH}")
}

/// URL of one catalog page.
#[must_use]
pub fn products_url(base: &Url, offset: usize, limit: usize) -> String {
    format!("{base}{PRODUCTS_PATH}?sort=createdAt:DESC&offset={offset}&limit={limit}")
}

/// URL of the available-format listing for one product.
#[must_use]
pub fn types_url(base: &Url, product_id: u64) -> String {
    format!("{base}{PRODUCT_DETAIL_PATH}/{product_id}/types")
}

/// URL of the signed-download-URL endpoint for one product and format.
#[must_use]
pub fn file_url(base: &Url, product_id: u64, format: &str) -> String {
    format!("{base}{PRODUCT_DETAIL_PATH}/{product_id}/files/{format}")
}

/// Ensures the base origin ends with a trailing slash so path concatenation
/// stays well-formed regardless of how the flag was spelled.
#[must_use]
pub fn normalize_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}
