use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::{summarize_error_body, truncate_for_log, UpstreamError, VisionModel, VisionRequest};
use crate::config::OpenAiConfig;

/// Chat-completions client used for the single vision analysis call.
pub struct OpenAiVisionClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiVisionClient {
    pub fn new(client: Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }

    fn build_payload(&self, request: &VisionRequest) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [
                {"role": "system", "content": request.system},
                {
                    "role": "user",
                    "content": [
                        {"type": "text", "text": request.text},
                        {"type": "image_url", "image_url": {"url": request.image_data_url}}
                    ]
                }
            ],
            "response_format": {"type": "json_object"}
        })
    }
}

#[async_trait]
impl VisionModel for OpenAiVisionClient {
    async fn complete_json(&self, request: &VisionRequest) -> Result<String, UpstreamError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::Transport("vision service is not configured (OPENAI_API_KEY unset)".into()))?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        info!("🔗 Vision request to {} (model={})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.build_payload(request))
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(format!("vision service unreachable: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Transport(format!("failed to read vision response: {}", e.without_url())))?;

        if !status.is_success() {
            error!("❌ Vision API error status={} body={}", status, truncate_for_log(&body, 500));
            return Err(UpstreamError::Transport(format!(
                "vision service returned {}: {}",
                status,
                summarize_error_body(&body)
            )));
        }

        info!("📥 Vision response ({} bytes)", body.len());
        extract_message_content(&body)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

fn extract_message_content(body: &str) -> Result<String, UpstreamError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::Malformed(format!("vision response is not valid JSON: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| UpstreamError::Malformed("vision response contained no message content".into()))
}
