//! HTTP handlers for genai-gateway.

pub mod chat;
pub mod models;
pub mod query;

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use gateway_core::error::AppError;
use std::time::Instant;

use crate::dtos::{timestamp, HealthResponse, NotFoundResponse};
use crate::services::metrics;
use crate::services::providers::{GenerationRequest, ProviderError};
use crate::startup::AppState;

/// Summary used for most upstream failures.
pub(crate) const GENERATE_FAILED: &str = "Failed to generate response";

pub const AVAILABLE_ENDPOINTS: &[&str] = &[
    "GET /health",
    "POST /query",
    "POST /query/strict",
    "POST /chat",
    "POST /chat/stream",
    "POST /conversation",
    "POST /vision",
    "GET /models",
    "GET /metrics",
];

/// Liveness only; never touches the provider.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "Gemini API Server is running",
        timestamp: timestamp(),
    })
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::get_metrics(),
    )
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "Endpoint not found",
            available_endpoints: AVAILABLE_ENDPOINTS,
        }),
    )
}

/// Rejects the call before any provider traffic when no API key is set.
pub(crate) fn ensure_configured(state: &AppState) -> Result<(), AppError> {
    if state.provider.is_configured() {
        Ok(())
    } else {
        Err(AppError::ConfigError(anyhow::anyhow!(
            "API key is not configured"
        )))
    }
}

/// Maps a provider failure to the route's upstream error and counts it.
pub(crate) fn upstream_error(
    state: &AppState,
    context: &'static str,
    model: &str,
    error: ProviderError,
) -> AppError {
    tracing::error!(
        provider = state.provider.name(),
        model = %model,
        error_type = error.kind(),
        error = %error,
        "{}",
        context
    );
    metrics::record_provider_error(state.provider.name(), error.kind());
    AppError::upstream(context, error)
}

/// One non-streaming generation call with latency, token and error metrics.
pub(crate) async fn generate_text(
    state: &AppState,
    route: &'static str,
    context: &'static str,
    request: GenerationRequest,
) -> Result<Option<String>, AppError> {
    metrics::record_request(route, &request.model);

    let started = Instant::now();
    let result = state.provider.generate(&request).await;
    metrics::record_provider_latency(
        state.provider.name(),
        &request.model,
        started.elapsed().as_secs_f64(),
    );

    let response = result.map_err(|e| upstream_error(state, context, &request.model, e))?;

    metrics::record_tokens(&request.model, response.input_tokens, response.output_tokens);
    tracing::debug!(
        route,
        model = %request.model,
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        "Generation completed"
    );

    Ok(response.text)
}
