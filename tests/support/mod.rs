//! Shared helpers for integration tests: mock auth endpoint, session and
//! catalog construction against a wiremock server.

#![allow(dead_code)]

use bookpull_core::{CatalogItem, Credentials, Session};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts a token endpoint that always succeeds with the given token.
pub async fn mount_auth(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth-v1/users/tokens"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": {"access": token}})),
        )
        .mount(server)
        .await;
}

/// Session pointed at the mock server with fixed test credentials.
pub fn session_for(server: &MockServer) -> Session {
    Session::new(
        Url::parse(&server.uri()).expect("mock server uri parses"),
        Credentials::new("user@example.com", "hunter2"),
    )
}

/// One entitlement record in the listing endpoint's shape.
pub fn product_json(id: &str, product_id: u64, title: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "userId": "fa92d338-ab10-44a1-ba18-00ee55dca20b",
        "productId": product_id.to_string(),
        "productName": title,
        "releaseDate": "2018-03-09T12:50:00.000Z",
        "entitlementSource": "free learning",
        "entitlementLink": "630d71c8-6e88-4b89-838a-dbd36a176159",
        "createdAt": "2021-12-18T00:19:40.773Z",
        "updatedAt": "2021-12-18T00:19:40.773Z"
    })
}

/// Mounts a one-item catalog and fetches it, returning the session and the
/// item so tests can drive types/files endpoints directly.
pub async fn session_with_one_item(
    server: &MockServer,
    product_id: u64,
    title: &str,
) -> (Session, CatalogItem) {
    mount_auth(server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 1,
            "data": [product_json("item-1", product_id, title)]
        })))
        .mount(server)
        .await;

    let mut session = session_for(server);
    let mut items = bookpull_core::fetch_all(&mut session, 25, |_, _| {})
        .await
        .expect("one-page catalog fetch succeeds");
    let item = items.pop().expect("catalog has one item");
    (session, item)
}
