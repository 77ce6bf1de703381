//! Mock provider implementation for testing.

use super::{
    FinishReason, GenerationRequest, ModelInfo, ProviderError, ProviderResponse, ProviderStream,
    StreamChunk, TextProvider,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Reply with this text; streams it as a single chunk.
    Reply(String),
    /// Stream these chunks in order; `generate` returns them concatenated.
    Chunks(Vec<String>),
    /// Every call fails with an API error carrying this message.
    Fail(String),
    /// Behaves like a provider without credentials.
    Unconfigured,
}

/// Mock text provider for testing. Records every request it receives.
#[derive(Clone)]
pub struct MockTextProvider {
    behaviour: MockBehaviour,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockTextProvider {
    pub fn new(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(MockBehaviour::Reply(text.into()))
    }

    /// Requests received so far, oldest first.
    pub fn recorded(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: &GenerationRequest) -> Result<(), ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        match &self.behaviour {
            MockBehaviour::Unconfigured => Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            )),
            MockBehaviour::Fail(message) => Err(ProviderError::ApiError(message.clone())),
            _ => Ok(()),
        }
    }

    fn chunks(&self) -> Vec<String> {
        match &self.behaviour {
            MockBehaviour::Reply(text) => vec![text.clone()],
            MockBehaviour::Chunks(chunks) => chunks.clone(),
            MockBehaviour::Fail(_) | MockBehaviour::Unconfigured => Vec::new(),
        }
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_configured(&self) -> bool {
        !matches!(self.behaviour, MockBehaviour::Unconfigured)
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        self.record(request)?;
        let text = self.chunks().concat();

        Ok(ProviderResponse {
            output_tokens: text.len() as i32 / 4,
            text: Some(text),
            input_tokens: request.prompt_len() as i32 / 4,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<ProviderStream, ProviderError> {
        self.record(request)?;

        let chunks = self.chunks();
        let output_tokens = chunks.len() as i32;
        let items: Vec<Result<StreamChunk, ProviderError>> = chunks
            .into_iter()
            .map(|chunk| Ok(StreamChunk::Text(chunk)))
            .chain(std::iter::once(Ok(StreamChunk::Complete {
                input_tokens: request.prompt_len() as i32 / 4,
                output_tokens,
                finish_reason: FinishReason::Complete,
            })))
            .collect();

        Ok(Box::pin(tokio_stream::iter(items)))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ));
        }
        if let MockBehaviour::Fail(message) = &self.behaviour {
            return Err(ProviderError::ApiError(message.clone()));
        }

        Ok(vec![ModelInfo {
            name: "models/mock-model".to_string(),
            display_name: Some("Mock Model".to_string()),
            description: None,
            version: Some("1".to_string()),
            input_token_limit: Some(1_048_576),
            output_token_limit: Some(8_192),
            supported_generation_methods: vec![
                "generateContent".to_string(),
                "streamGenerateContent".to_string(),
            ],
        }])
    }
}
