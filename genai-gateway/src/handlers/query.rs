//! `/query` handlers: ask the model for an HTML operation result and recover
//! the JSON it answers with.

use axum::{extract::State, Json};
use gateway_core::error::AppError;
use gateway_core::utils::ValidatedJson;
use serde_json::Value;

use super::{ensure_configured, generate_text, GENERATE_FAILED};
use crate::dtos::{timestamp, QueryRequest, QueryResponse};
use crate::extraction::{project_operation, OperationOutcome, ResponseReport};
use crate::services::metrics;
use crate::services::providers::GenerationRequest;
use crate::startup::AppState;

/// Prompt sent for every `/query` call. The model is asked to answer with
/// `{result, operacion}`; the wording is part of the contract with clients.
pub fn operation_prompt(query: &str) -> String {
    format!(
        "Devuelve el resultado de la siguiente operacion: {} en este formato: \
         {{result: <resultado>, operacion: <operacion>}} ; <resultado> es el html \
         generado y <operacion> es la operacion realizada",
        query
    )
}

pub async fn query(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<QueryRequest>,
) -> Result<Json<QueryResponse<OperationOutcome>>, AppError> {
    ensure_configured(&state)?;
    let model = state.resolve_model(payload.model.as_deref());

    let raw_response = generate_text(
        &state,
        "/query",
        GENERATE_FAILED,
        GenerationRequest::prompt(&model, operation_prompt(&payload.query)),
    )
    .await?;

    let text = raw_response.as_deref().unwrap_or_default();
    let processed_response = project_operation(state.extractor.extract(text));

    if let OperationOutcome::Failed(failure) = &processed_response {
        tracing::debug!(
            model = %model,
            error = %failure.error,
            report = ?ResponseReport::inspect(text),
            "Model response is not JSON"
        );
    }
    metrics::record_extraction("fallback", processed_response.label());

    Ok(Json(QueryResponse {
        success: true,
        query: payload.query,
        raw_response,
        processed_response,
        model,
        timestamp: timestamp(),
    }))
}

/// Same call as [`query`], but only a ```json fenced block counts as an
/// answer. Anything else yields `processedResponse: null`.
pub async fn strict_query(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<QueryRequest>,
) -> Result<Json<QueryResponse<Option<Value>>>, AppError> {
    ensure_configured(&state)?;
    let model = state.resolve_model(payload.model.as_deref());

    let raw_response = generate_text(
        &state,
        "/query/strict",
        GENERATE_FAILED,
        GenerationRequest::prompt(&model, operation_prompt(&payload.query)),
    )
    .await?;

    let text = raw_response.as_deref().unwrap_or_default();
    let processed_response = state.extractor.extract_and_parse_json_block(text);

    let outcome = if processed_response.is_some() {
        "fenced"
    } else {
        tracing::debug!(
            model = %model,
            report = ?ResponseReport::inspect(text),
            "No parseable json block in model response"
        );
        "failed"
    };
    metrics::record_extraction("strict", outcome);

    Ok(Json(QueryResponse {
        success: true,
        query: payload.query,
        raw_response,
        processed_response,
        model,
        timestamp: timestamp(),
    }))
}
