//! HTTP Boundary Tests
//!
//! Routes requests through `server::handle` directly and checks status
//! mapping, headers and bodies.

use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};

use readthrough::adapters::{InMemoryKeyValueBackend, InMemoryObjectBackend, StaticOriginFetcher};
use readthrough::cache::{
    CacheResolver, DurableStore, FastStore, ResolverConfig, ResolverMetrics, WriteBackMode,
};
use readthrough::server::{handle, AppState, HealthResponse, HealthStatus, RESPONSE_TIME_HEADER};

struct Fixture {
    kv: Arc<InMemoryKeyValueBackend>,
    origin: Arc<StaticOriginFetcher>,
    state: AppState,
}

fn fixture() -> Fixture {
    let kv = Arc::new(InMemoryKeyValueBackend::new());
    let origin = Arc::new(StaticOriginFetcher::new());
    let resolver = CacheResolver::with_config(
        ResolverConfig {
            write_back: WriteBackMode::Inline,
            ..Default::default()
        },
        Arc::new(FastStore::new(kv.clone())),
        Arc::new(DurableStore::new(Arc::new(InMemoryObjectBackend::new()))),
        origin.clone(),
        Arc::new(ResolverMetrics::new().unwrap()),
    );
    let state = AppState::new(Arc::new(resolver));
    state.health.set_ready(true);
    Fixture { kv, origin, state }
}

async fn send(state: &AppState, method: Method, uri: &str) -> Response<Full<Bytes>> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(())
        .unwrap();
    handle(state, req).await
}

async fn body_text(response: Response<Full<Bytes>>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_search_serves_origin_then_fast_tier() {
    let f = fixture();
    f.origin
        .insert("Rust (language)", json!({"parse": {"title": "Rust (language)"}}));

    let response = send(&f.state, Method::GET, "/api/search?query=Rust+%28language%29").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["source"], "origin");
    assert_eq!(body["parse"]["title"], "Rust (language)");

    let response = send(&f.state, Method::GET, "/api/search?query=Rust%20(language)").await;
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["source"], "fast-tier");
    assert_eq!(f.origin.calls(), 1);
}

#[tokio::test]
async fn test_search_failure_is_generic_500() {
    let f = fixture();

    let response = send(&f.state, Method::GET, "/api/search?query=Missing").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Could not retrieve query: Missing.");

    let response = send(&f.state, Method::GET, "/api/search?query=++Missing+").await;
    assert_eq!(body_text(response).await, "Could not retrieve query: Missing.");
}

#[tokio::test]
async fn test_search_with_encoded_parameter_name() {
    let f = fixture();
    f.origin.insert("Rust", json!({"n": 1}));

    let response = send(&f.state, Method::GET, "/api/search?%71uery=Rust").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(f.origin.fetched(), vec!["Rust"]);
}

#[tokio::test]
async fn test_missing_query_is_treated_as_empty() {
    let f = fixture();

    for uri in ["/api/search", "/api/search?query=", "/api/search?query=+++"] {
        let response = send(&f.state, Method::GET, uri).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
    assert_eq!(f.kv.gets(), 0);
    assert_eq!(f.origin.calls(), 0);
}

#[tokio::test]
async fn test_cancelled_search_after_shutdown() {
    let f = fixture();
    f.origin.insert("Rust", json!({"n": 1}));
    f.state.shutdown.cancel();

    let response = send(&f.state, Method::GET, "/api/search?query=Rust").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(f.origin.calls(), 0);
}

#[tokio::test]
async fn test_every_response_has_response_time() {
    let f = fixture();

    for uri in ["/api/search?query=x", "/healthz", "/readyz", "/metrics", "/nope"] {
        let response = send(&f.state, Method::GET, uri).await;
        let value = response.headers()[RESPONSE_TIME_HEADER].to_str().unwrap();
        assert!(value.ends_with("ms"), "{uri}: {value}");
    }
}

#[tokio::test]
async fn test_method_and_path_errors() {
    let f = fixture();

    let response = send(&f.state, Method::POST, "/api/search?query=Rust").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"], "GET");

    let response = send(&f.state, Method::GET, "/api/other").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_liveness() {
    let f = fixture();

    for uri in ["/healthz", "/livez"] {
        let response = send(&f.state, Method::GET, uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    f.state.health.set_live(false);
    let response = send(&f.state, Method::GET, "/livez").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readiness_reflects_flag_and_tiers() {
    let f = fixture();

    let response = send(&f.state, Method::GET, "/readyz").await;
    assert_eq!(response.status(), StatusCode::OK);
    let report: HealthResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(report.status, HealthStatus::Healthy);

    f.kv.set_unavailable(true);
    let response = send(&f.state, Method::GET, "/readyz").await;
    assert_eq!(response.status(), StatusCode::OK);
    let report: HealthResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(report.status, HealthStatus::Degraded);

    f.state.health.set_ready(false);
    let response = send(&f.state, Method::GET, "/readyz").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let f = fixture();
    f.origin.insert("Rust", json!({"n": 1}));
    send(&f.state, Method::GET, "/api/search?query=Rust").await;

    let response = send(&f.state, Method::GET, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("readthrough_resolutions_total{source=\"origin\"} 1"));
    assert!(body.contains("readthrough_tier_lookups_total"));
}
