//! Gemini AI provider implementation.
//!
//! Implements text generation using Google's Gemini API.
//! Supports both streaming and non-streaming responses.

use super::{
    Content, FinishReason, GenerationRequest, ModelInfo, ProviderError, ProviderResponse,
    ProviderStream, StreamChunk, TextProvider,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Capacity of the channel between the SSE reader and the HTTP body.
const STREAM_BUFFER: usize = 32;

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<Secret<String>>,
    pub api_base: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: Option<Secret<String>>) -> Self {
        Self {
            api_key,
            api_base: GEMINI_API_BASE.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Gemini text provider.
pub struct GeminiTextProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTextProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderError::NotConfigured("Gemini API key not configured".to_string()))
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:{}", self.config.api_base, model, method)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, ProviderError> {
        Ok(builder.header(API_KEY_HEADER, self.api_key()?))
    }

    async fn post_contents(
        &self,
        url: &str,
        request: &GenerationRequest,
    ) -> Result<Response, ProviderError> {
        let body = GenerateContentRequest {
            contents: &request.contents,
        };

        let response = self
            .authorized(self.client.post(url))?
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(response)
    }
}

/// Turn a non-2xx response into a provider error, preferring the API's own message.
async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&error_text)
        .map(|body| body.error.message)
        .unwrap_or(error_text);

    let detail = format!("Gemini API error {}: {}", status, message);
    match status.as_u16() {
        429 => ProviderError::RateLimited(detail),
        400 | 404 => ProviderError::InvalidRequest(detail),
        _ => ProviderError::ApiError(detail),
    }
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let url = self.api_url(&request.model, "generateContent");

        tracing::debug!(
            model = %request.model,
            prompt_len = request.prompt_len(),
            turns = request.contents.len(),
            "Sending request to Gemini API"
        );

        let response = self.post_contents(&url, request).await?;

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        let Some(candidate) = api_response.candidates.first() else {
            if let Some(reason) = api_response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
            {
                tracing::warn!(model = %request.model, block_reason = reason, "Prompt blocked by Gemini");
                return Err(ProviderError::ContentFiltered);
            }
            return Err(ProviderError::ApiError(
                "Gemini returned no candidates".to_string(),
            ));
        };

        let finish_reason = FinishReason::from_api(candidate.finish_reason.as_deref());
        if finish_reason == FinishReason::ContentFilter {
            return Err(ProviderError::ContentFiltered);
        }

        let usage = api_response.usage_metadata.unwrap_or_default();

        Ok(ProviderResponse {
            text: candidate.text(),
            input_tokens: usage.prompt_token_count.unwrap_or(0),
            output_tokens: usage.candidates_token_count.unwrap_or(0),
            finish_reason,
        })
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderStream, ProviderError> {
        let url = format!(
            "{}?alt=sse",
            self.api_url(&request.model, "streamGenerateContent")
        );

        tracing::debug!(
            model = %request.model,
            prompt_len = request.prompt_len(),
            turns = request.contents.len(),
            "Starting streaming request to Gemini API"
        );

        let response = self.post_contents(&url, request).await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let model = request.model.clone();

        // The task owns the upstream response; returning from it closes the
        // connection and stops generation.
        tokio::spawn(async move {
            let mut upstream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut total_input_tokens = 0i32;
            let mut total_output_tokens = 0i32;
            let mut last_finish_reason = FinishReason::Complete;

            loop {
                let next = tokio::select! {
                    _ = tx.closed() => {
                        tracing::debug!(model = %model, "Stream receiver dropped, aborting upstream generation");
                        return;
                    }
                    next = upstream.next() => next,
                };

                let bytes = match next {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(e)) => {
                        let _ = tx
                            .send(Err(ProviderError::NetworkError(e.to_string())))
                            .await;
                        return;
                    }
                    None => break,
                };

                buffer.extend_from_slice(&bytes);

                for data in take_sse_events(&mut buffer) {
                    let event = match serde_json::from_str::<GenerateContentResponse>(&data) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::debug!(error = %e, "Skipping unparseable SSE event");
                            continue;
                        }
                    };

                    if let Some(usage) = &event.usage_metadata {
                        total_input_tokens = usage.prompt_token_count.unwrap_or(0);
                        total_output_tokens = usage.candidates_token_count.unwrap_or(0);
                    }

                    let Some(candidate) = event.candidates.first() else {
                        continue;
                    };

                    if let Some(reason) = candidate.finish_reason.as_deref() {
                        last_finish_reason = FinishReason::from_api(Some(reason));
                    }

                    if let Some(text) = candidate.text().filter(|t| !t.is_empty()) {
                        if tx.send(Ok(StreamChunk::Text(text))).await.is_err() {
                            tracing::debug!(model = %model, "Stream receiver dropped, aborting upstream generation");
                            return;
                        }
                    }
                }
            }

            if last_finish_reason == FinishReason::ContentFilter {
                tracing::warn!(model = %model, "Stream stopped by Gemini safety filter");
                let _ = tx.send(Err(ProviderError::ContentFiltered)).await;
                return;
            }

            let _ = tx
                .send(Ok(StreamChunk::Complete {
                    input_tokens: total_input_tokens,
                    output_tokens: total_output_tokens,
                    finish_reason: last_finish_reason,
                }))
                .await;
        });

        let stream = ReceiverStream::new(rx);
        Ok(Box::pin(stream) as ProviderStream)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = format!("{}/models", self.config.api_base);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut builder = self.client.get(&url).query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                builder = builder.query(&[("pageToken", token.as_str())]);
            }

            let response = self
                .authorized(builder)?
                .send()
                .await
                .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }

            let page: ListModelsResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::ApiError(format!("Failed to parse models: {}", e)))?;

            models.extend(page.models);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}

/// Drains complete server-sent events from `buffer`, returning their `data`
/// payloads. A trailing partial event stays in the buffer.
fn take_sse_events(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut events = Vec::new();

    while let Some((end, separator_len)) = event_boundary(buffer) {
        let event: Vec<u8> = buffer.drain(..end + separator_len).collect();
        let text = String::from_utf8_lossy(&event[..end]);

        let data = text
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|payload| payload.strip_prefix(' ').unwrap_or(payload))
            .collect::<Vec<_>>()
            .join("\n");

        if !data.is_empty() {
            events.push(data);
        }
    }

    events
}

/// Position and length of the first blank-line separator.
fn event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl Candidate {
    /// Text parts joined in order, thought summaries excluded.
    fn text(&self) -> Option<String> {
        let parts = &self.content.as_ref()?.parts;
        let texts: Vec<&str> = parts
            .iter()
            .filter(|p| !p.thought.unwrap_or(false))
            .filter_map(|p| p.text.as_deref())
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
