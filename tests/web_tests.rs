//! HTTP adapter, driven through the router without binding a socket.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use card_resolver::quota::{QuotaGate, QuotaMonitor};
use card_resolver::store::MemoryStore;
use card_resolver::web::create_router;
use common::*;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn router(monitor: Option<Arc<QuotaMonitor>>) -> Router {
    let h = harness(
        Arc::new(amarys_catalog()),
        Arc::new(amarys_images()),
        Arc::new(MemoryStore::new()),
    );
    create_router(Arc::new(h.service), monitor)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn card_route_resolves() {
    let (status, body) = get(router(None), "/api/cards/ppt-73092").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 200);
    assert_eq!(body["cached"], false);
    assert_eq!(body["data"]["id"], "ppt-73092");
    assert_eq!(body["data"]["name"], "Amarys");
}

#[tokio::test]
async fn second_request_is_served_from_cache() {
    let app = router(None);
    get(app.clone(), "/api/cards/73092").await;
    let (status, body) = get(app, "/api/cards/card-73092").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], true);
}

#[tokio::test]
async fn malformed_id_is_bad_request() {
    let (status, body) = get(router(None), "/api/cards/pikachu").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn unknown_card_is_not_found() {
    let (status, body) = get(router(None), "/api/cards/ppt-999").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("ppt-999"));
}

#[tokio::test]
async fn set_route_resolves() {
    let (status, body) = get(router(None), "/api/sets/501?refresh=true").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["kind"], "set");
}

#[tokio::test]
async fn quota_route_without_monitor() {
    let (status, body) = get(router(None), "/api/quota").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn quota_route_checks_on_demand() {
    let monitor = Arc::new(QuotaMonitor::new(
        Arc::new(FakeCredits::with_readings(&[15_000], Some(20_000))),
        Arc::new(QuotaGate::new()),
        None,
        Duration::from_secs(1),
    ));
    let (status, body) = get(router(Some(monitor)), "/api/quota").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["event"], "checked");
    assert_eq!(body["data"]["sample"]["status"], "healthy");
    assert_eq!(body["data"]["percentage"], 75.0);
}

#[tokio::test]
async fn failed_quota_check_is_reported() {
    let monitor = Arc::new(QuotaMonitor::new(
        Arc::new(FakeCredits::default()),
        Arc::new(QuotaGate::new()),
        None,
        Duration::from_secs(1),
    ));
    let (status, body) = get(router(Some(monitor)), "/api/quota").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["event"], "checkFailed");
}
