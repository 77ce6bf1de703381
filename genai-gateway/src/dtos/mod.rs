use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::providers::{Content, ModelInfo};

/// ISO-8601 UTC timestamp with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Query is required"))]
    pub query: String,

    pub model: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,

    pub model: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConversationRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Messages array is required"))]
    pub messages: Vec<ConversationMessage>,

    pub model: Option<String>,
}

/// A conversation entry: bare text for a user turn, or a full turn with role
/// and parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConversationMessage {
    Text(String),
    Turn(Content),
}

impl From<ConversationMessage> for Content {
    fn from(message: ConversationMessage) -> Self {
        match message {
            ConversationMessage::Text(text) => Content::user_text(text),
            ConversationMessage::Turn(content) => content,
        }
    }
}

pub const DEFAULT_IMAGE_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VisionRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Message and imageData are required"))]
    pub message: String,

    /// Base64 image bytes, without a `data:` prefix.
    #[serde(default)]
    #[validate(length(min = 1, message = "Message and imageData are required"))]
    pub image_data: String,

    pub mime_type: Option<String>,

    pub model: Option<String>,
}

impl VisionRequest {
    pub fn mime_type(&self) -> &str {
        self.mime_type
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_IMAGE_MIME_TYPE)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Envelope for `/query` and `/query/strict`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse<P: Serialize> {
    pub success: bool,
    pub query: String,
    pub raw_response: Option<String>,
    pub processed_response: P,
    pub model: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub success: bool,
    pub response: Option<String>,
    pub model: String,
    pub timestamp: String,
}

impl GenerationResponse {
    pub fn new(response: Option<String>, model: String) -> Self {
        Self {
            success: true,
            response,
            model,
            timestamp: timestamp(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub success: bool,
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundResponse {
    pub error: &'static str,
    pub available_endpoints: &'static [&'static str],
}
