use axum::{extract::State, Json};
use gateway_core::error::AppError;

use super::{ensure_configured, upstream_error};
use crate::dtos::ModelsResponse;
use crate::startup::AppState;

pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, AppError> {
    ensure_configured(&state)?;

    let models = state
        .provider
        .list_models()
        .await
        .map_err(|e| upstream_error(&state, "Failed to fetch models", "-", e))?;

    tracing::debug!(count = models.len(), "Listed models");

    Ok(Json(ModelsResponse {
        success: true,
        models,
    }))
}
