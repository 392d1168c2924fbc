//! HTTP API driven in-process through the router.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{retriever, shop_embedder, shop_tables, FakeCatalog};
use tablefinder::retriever::RetrieverSettings;
use tablefinder::server::router;

fn app() -> Router {
    let r = retriever(
        FakeCatalog::new(shop_tables()),
        Arc::new(shop_embedder()),
        RetrieverSettings {
            sample_rows: 0,
            ..RetrieverSettings::default()
        },
    );
    router(r)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_endpoints_before_first_build() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/tables/search",
        Some(json!({ "query": "customer purchase history" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "no_snapshot");

    let (status, body) = send(&app, "GET", "/snapshot", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "no_snapshot");

    // A stats-only refresh needs something to refresh.
    let (status, _) = send(&app, "POST", "/refresh", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_refresh_then_search() {
    let app = app();

    let (status, stats) = send(&app, "POST", "/refresh", Some(json!({ "full": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["kind"], "full");
    assert_eq!(stats["version"], 1);
    assert_eq!(stats["tables_embedded"], 2);
    assert_eq!(stats["skipped"], false);

    let (status, body) = send(
        &app,
        "POST",
        "/tables/search",
        Some(json!({ "query": "customer purchase history", "limit": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["snapshot_version"], 1);
    assert_eq!(body["is_stale"], false);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["table_name"], "SALES");
    assert_eq!(results[1]["table_name"], "CUSTOMERS");
    assert_eq!(results[1]["is_expanded"], true);
    assert_eq!(results[1]["origin_table"], "SALES");

    let (status, body) = send(
        &app,
        "POST",
        "/tables/search",
        Some(json!({ "query": "customer purchase history", "expand": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);

    // Stats-only refresh with no body.
    let (status, stats) = send(&app, "POST", "/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["kind"], "stats_only");
    assert_eq!(stats["version"], 2);

    let (status, info) = send(&app, "GET", "/snapshot", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["version"], 2);
    assert_eq!(info["table_count"], 2);
    assert_eq!(info["tables_with_foreign_keys"], 1);
}

#[tokio::test]
async fn test_bad_requests() {
    let app = app();
    send(&app, "POST", "/refresh", Some(json!({ "full": true }))).await;

    let (status, body) = send(&app, "POST", "/tables/search", Some(json!({ "query": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send(
        &app,
        "POST",
        "/tables/search",
        Some(json!({ "query": "sales", "limit": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = send(&app, "POST", "/tables/context", Some(json!({ "tables": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_context_endpoint() {
    let app = app();
    send(&app, "POST", "/refresh", Some(json!({ "full": true }))).await;

    let (status, body) = send(
        &app,
        "POST",
        "/tables/context",
        Some(json!({ "tables": ["SALES", "NOPE"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let text = body["context"].as_str().unwrap();
    assert!(text.starts_with("Relevant tables for this query:"));
    assert!(text.contains("- SALES (50,000 rows):"));
    assert!(!text.contains("NOPE"));
}
