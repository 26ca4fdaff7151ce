//! Remote model services, consumed only through these two traits so the
//! pipeline can be driven by fakes in tests.

pub mod azure;
#[cfg(test)]
pub mod mock;
pub mod openai;

pub use azure::AzureImageClient;
pub use openai::OpenAiVisionClient;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// The call did not complete: network, auth, quota, missing credentials.
    #[error("{0}")]
    Transport(String),
    /// The call completed but the body violates the expected contract.
    #[error("{0}")]
    Malformed(String),
}

/// One structured-completion call with a single image attached.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub system: String,
    pub text: String,
    /// `data:<mime>;base64,<payload>`
    pub image_data_url: String,
}

#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Returns the raw JSON text produced by the model.
    async fn complete_json(&self, request: &VisionRequest) -> Result<String, UpstreamError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns a URL for the generated image.
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

pub(crate) fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}...[{} chars]", value.chars().count())
}

/// Best human-readable message from an upstream error body.
pub(crate) fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("message").and_then(|v| v.as_str()));
        if let Some(message) = message {
            return truncate_for_log(message, 300);
        }
    }
    truncate_for_log(trimmed, 300)
}
