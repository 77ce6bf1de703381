use anyhow::Context;
use gateway_core::observability::{init_tracing, shutdown_tracing};
use genai_gateway::config::GatewayConfig;
use genai_gateway::services::metrics::init_metrics;
use genai_gateway::Application;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let otlp_endpoint = std::env::var("OTLP_ENDPOINT")
        .ok()
        .filter(|endpoint| !endpoint.is_empty());
    init_tracing("genai-gateway", &log_level, otlp_endpoint.as_deref());

    init_metrics();

    let config = GatewayConfig::load().context("Failed to load configuration")?;
    let application = Application::build(config)
        .await
        .context("Failed to build application")?;

    application
        .run_until_stopped()
        .await
        .context("Server error")?;

    shutdown_tracing();
    Ok(())
}
