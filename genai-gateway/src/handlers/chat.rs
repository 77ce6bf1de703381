//! Free-form generation: single message, streamed message, multi-turn
//! conversation and image analysis.

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::{future, StreamExt};
use gateway_core::error::AppError;
use gateway_core::utils::ValidatedJson;

use super::{ensure_configured, generate_text, upstream_error, GENERATE_FAILED};
use crate::dtos::{ChatRequest, ConversationRequest, GenerationResponse, VisionRequest};
use crate::services::metrics;
use crate::services::providers::{
    Content, ContentPart, GenerationRequest, ProviderError, StreamChunk,
};
use crate::startup::AppState;

const STREAM_FAILED: &str = "Failed to generate streaming response";
const CONVERSATION_FAILED: &str = "Failed to generate conversation response";
const VISION_FAILED: &str = "Failed to analyze image";

pub async fn chat(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ChatRequest>,
) -> Result<Json<GenerationResponse>, AppError> {
    ensure_configured(&state)?;
    let model = state.resolve_model(payload.model.as_deref());

    let response = generate_text(
        &state,
        "/chat",
        GENERATE_FAILED,
        GenerationRequest::prompt(&model, payload.message),
    )
    .await?;

    Ok(Json(GenerationResponse::new(response, model)))
}

/// Relays model text as a chunked `text/plain` body, chunk by chunk in
/// arrival order. A client disconnect drops the body and with it the
/// upstream stream.
pub async fn chat_stream(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ChatRequest>,
) -> Result<Response, AppError> {
    ensure_configured(&state)?;
    let model = state.resolve_model(payload.model.as_deref());
    metrics::record_request("/chat/stream", &model);

    let request = GenerationRequest::prompt(&model, payload.message);
    let stream = state
        .provider
        .generate_stream(&request)
        .await
        .map_err(|e| upstream_error(&state, STREAM_FAILED, &model, e))?;

    let provider = state.provider.name();
    let body =
        stream.filter_map(move |chunk| future::ready(relay_chunk(chunk, provider, &model)));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

/// Text chunks become body frames; the completion marker only feeds metrics.
fn relay_chunk(
    chunk: Result<StreamChunk, ProviderError>,
    provider: &str,
    model: &str,
) -> Option<Result<Bytes, ProviderError>> {
    match chunk {
        Ok(StreamChunk::Text(text)) => Some(Ok(Bytes::from(text))),
        Ok(StreamChunk::Complete {
            input_tokens,
            output_tokens,
            ..
        }) => {
            metrics::record_tokens(model, input_tokens, output_tokens);
            tracing::debug!(model, input_tokens, output_tokens, "Stream completed");
            None
        }
        Err(e) => {
            tracing::error!(model, error = %e, "Stream failed after headers were sent");
            metrics::record_provider_error(provider, e.kind());
            Some(Err(e))
        }
    }
}

pub async fn conversation(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ConversationRequest>,
) -> Result<Json<GenerationResponse>, AppError> {
    ensure_configured(&state)?;
    let model = state.resolve_model(payload.model.as_deref());

    let contents: Vec<Content> = payload.messages.into_iter().map(Content::from).collect();

    let response = generate_text(
        &state,
        "/conversation",
        CONVERSATION_FAILED,
        GenerationRequest::new(&model, contents),
    )
    .await?;

    Ok(Json(GenerationResponse::new(response, model)))
}

pub async fn vision(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<VisionRequest>,
) -> Result<Json<GenerationResponse>, AppError> {
    ensure_configured(&state)?;
    let model = state.resolve_model(payload.model.as_deref());

    let image = ContentPart::inline(payload.mime_type(), payload.image_data.as_str());
    let contents = vec![Content::user(vec![
        ContentPart::text(payload.message.as_str()),
        image,
    ])];

    let response = generate_text(
        &state,
        "/vision",
        VISION_FAILED,
        GenerationRequest::new(&model, contents),
    )
    .await?;

    Ok(Json(GenerationResponse::new(response, model)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_marker_is_not_relayed() {
        let done = relay_chunk(
            Ok(StreamChunk::Complete {
                input_tokens: 1,
                output_tokens: 2,
                finish_reason: crate::services::providers::FinishReason::Complete,
            }),
            "mock",
            "m",
        );
        assert!(done.is_none());

        let text = relay_chunk(Ok(StreamChunk::Text("hi".into())), "mock", "m");
        assert_eq!(text.unwrap().unwrap(), Bytes::from("hi"));
    }
}
