#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use genai_gateway::config::GatewayConfig;
use genai_gateway::services::providers::mock::{MockBehaviour, MockTextProvider};
use genai_gateway::{build_router, AppState, Application};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

/// A model reply in the shape the `/query` prompt asks for, fenced the way
/// Gemini usually answers.
pub const FENCED_OPERATION: &str = "```json\n{\n  \"result\": \"<p>4</p>\",\n  \"operacion\": \"Suma de 2 + 2\"\n}\n```";

pub fn router(provider: &MockTextProvider) -> Router {
    build_router(AppState::new(
        GatewayConfig::default(),
        Arc::new(provider.clone()),
    ))
}

pub fn unconfigured() -> MockTextProvider {
    MockTextProvider::new(MockBehaviour::Unconfigured)
}

pub fn post_json(path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

/// Drives one request through the router and decodes the JSON body.
pub async fn send_json(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// A running server on a random port, backed by a mock provider.
pub struct TestApp {
    pub address: String,
    pub provider: MockTextProvider,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn(provider: MockTextProvider) -> Self {
        let mut config = GatewayConfig::default();
        config.common.port = 0;

        let app = Application::build_with_provider(config, Arc::new(provider.clone()))
            .await
            .expect("Failed to build test application");
        let address = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        Self {
            address,
            provider,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}
