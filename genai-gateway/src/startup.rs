//! Application startup and lifecycle management.

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use gateway_core::error::AppError;
use gateway_core::middleware::{request_id_middleware, request_span};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::extraction::Extractor;
use crate::handlers;
use crate::services::providers::gemini::GeminiTextProvider;
use crate::services::providers::TextProvider;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub provider: Arc<dyn TextProvider>,
    pub extractor: Extractor,
}

impl AppState {
    pub fn new(config: GatewayConfig, provider: Arc<dyn TextProvider>) -> Self {
        Self {
            config,
            provider,
            extractor: Extractor::default(),
        }
    }

    /// The requested model, or the configured default when absent or blank.
    pub fn resolve_model(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(self.config.models.default_model.as_str())
            .to_string()
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.config.http.max_body_bytes;

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/query", post(handlers::query::query))
        .route("/query/strict", post(handlers::query::strict_query))
        .route("/chat", post(handlers::chat::chat))
        .route("/chat/stream", post(handlers::chat::chat_stream))
        .route("/conversation", post(handlers::chat::conversation))
        .route("/vision", post(handlers::chat::vision))
        .route("/models", get(handlers::models::list_models))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the Gemini provider.
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let provider = GeminiTextProvider::new(config.gemini())
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;

        if provider.is_configured() {
            tracing::info!(
                default_model = %config.models.default_model,
                api_base = %config.google.api_base,
                "Initialized Gemini text provider"
            );
        } else {
            tracing::warn!(
                "API key is not configured (set GOOGLE_API_KEY or GEMINI_API_KEY); \
                 model routes will return 500"
            );
        }

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    /// Build the application around any provider (port 0 binds a random port).
    pub async fn build_with_provider(
        config: GatewayConfig,
        provider: Arc<dyn TextProvider>,
    ) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let router = build_router(AppState::new(config, provider));

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until Ctrl-C or SIGTERM, then drain in-flight requests.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!("genai-gateway listening on port {}", self.port);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockTextProvider;

    fn state() -> AppState {
        AppState::new(
            GatewayConfig::default(),
            Arc::new(MockTextProvider::replying("ok")),
        )
    }

    #[test]
    fn blank_or_missing_model_falls_back_to_default() {
        let state = state();
        assert_eq!(state.resolve_model(None), "gemini-2.5-flash");
        assert_eq!(state.resolve_model(Some("  ")), "gemini-2.5-flash");
        assert_eq!(state.resolve_model(Some("gemini-2.0-flash")), "gemini-2.0-flash");
    }
}
