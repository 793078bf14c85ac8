//! Integration tests for catalog pagination against a mock entitlement
//! service, including the documented server-side pagination anomaly.

mod support;

use std::collections::HashSet;

use bookpull_core::{CatalogError, fetch_all};
use support::{mount_auth, product_json, session_for};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn products(range: std::ops::Range<u64>) -> Vec<serde_json::Value> {
    range
        .map(|i| product_json(&format!("item-{i}"), 9_780_000_000_000 + i, &format!("Book {i}")))
        .collect()
}

#[tokio::test]
async fn anomalous_second_page_yields_full_catalog_in_two_requests() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;

    // Page 1: 25 of 1000. Page 2: the documented anomaly — everything else,
    // ignoring the requested limit.
    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 1000,
            "data": products(0..25)
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .and(query_param("offset", "25"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 975,
            "data": products(25..1000)
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server);
    let mut progress = Vec::new();
    let items = fetch_all(&mut session, 25, |collected, total| {
        progress.push((collected, total));
    })
    .await
    .expect("fetch_all reconciles the anomaly");

    assert_eq!(items.len(), 1000);
    let unique: HashSet<_> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(unique.len(), 1000, "no duplicates in the result");
    // Progress reported after every page, against the authoritative total.
    assert_eq!(progress, vec![(25, 1000), (1000, 1000)]);
    // Mock expectations (exactly 2 page requests) are verified on drop.
}

#[tokio::test]
async fn overlapping_pages_are_deduplicated_by_id() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;

    let page1 = products(0..2);
    let page2 = products(1..4); // item-1 repeats

    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 4,
            "data": page1
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 4,
            "data": page2
        })))
        .mount(&server)
        .await;

    let mut session = session_for(&server);
    let items = fetch_all(&mut session, 2, |_, _| {}).await.unwrap();

    let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["item-0", "item-1", "item-2", "item-3"]);
}

#[tokio::test]
async fn first_page_count_is_authoritative_over_later_pages() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;

    // The second page reports an absurd count; it must be ignored.
    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 3,
            "data": products(0..2)
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 9999,
            "data": products(2..3)
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server);
    let items = fetch_all(&mut session, 2, |_, _| {}).await.unwrap();
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn page_request_carries_bearer_header() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok1").await;

    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 1,
            "data": products(0..1)
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server);
    let items = fetch_all(&mut session, 25, |_, _| {}).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn expired_token_on_a_page_refreshes_once_and_retries() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;

    // First listing attempt is rejected, the retry (after refresh) succeeds.
    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 1,
            "data": products(0..1)
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server);
    let items = fetch_all(&mut session, 25, |_, _| {}).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn failing_page_surfaces_status_and_body() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance window"))
        .mount(&server)
        .await;

    let mut session = session_for(&server);
    match fetch_all(&mut session, 25, |_, _| {}).await {
        Err(CatalogError::Page { offset, status, body }) => {
            assert_eq!(offset, 0);
            assert_eq!(status, 503);
            assert!(body.contains("maintenance window"));
        }
        other => panic!("expected Page error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_running_dry_before_total_is_an_error_not_a_loop() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;

    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 10,
            "data": products(0..2)
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entitlements-v1/users/me/products"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 10,
            "data": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server);
    match fetch_all(&mut session, 2, |_, _| {}).await {
        Err(CatalogError::ShortCatalog { collected, expected }) => {
            assert_eq!(collected, 2);
            assert_eq!(expected, 10);
        }
        other => panic!("expected ShortCatalog, got {other:?}"),
    }
}
