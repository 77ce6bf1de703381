//! Liveness, routing fallbacks and cross-cutting middleware.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use common::{get, router, send_json, unconfigured, TestApp};
use genai_gateway::services::metrics::{init_metrics, record_request};
use genai_gateway::services::providers::mock::MockTextProvider;
use tower::util::ServiceExt;

#[tokio::test]
async fn health_check_works_without_api_key() {
    let (status, body) = send_json(router(&unconfigured()), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["message"], "Gemini API Server is running");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn unknown_route_lists_available_endpoints() {
    let (status, body) = send_json(
        router(&MockTextProvider::replying("unused")),
        get("/does-not-exist"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Endpoint not found");

    let endpoints: Vec<&str> = body["availableEndpoints"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e.as_str())
        .collect();
    for expected in [
        "GET /health",
        "POST /query",
        "POST /chat",
        "POST /chat/stream",
        "POST /conversation",
        "POST /vision",
        "GET /models",
    ] {
        assert!(endpoints.contains(&expected), "missing {}", expected);
    }
}

#[tokio::test]
async fn request_id_is_propagated_or_generated() {
    let response = router(&unconfigured())
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");

    let response = router(&unconfigured()).oneshot(get("/health")).await.unwrap();
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let response = router(&unconfigured())
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "http://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn metrics_are_exposed_as_prometheus_text() {
    init_metrics();
    record_request("/chat", "metrics-probe");

    let response = router(&unconfigured()).oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("# TYPE genai_requests_total counter"));
    assert!(text.contains("model=\"metrics-probe\""));
}

#[tokio::test]
async fn served_over_tcp() {
    let app = TestApp::spawn(unconfigured()).await;

    let response = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}
