use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::{summarize_error_body, truncate_for_log, ImageGenerator, UpstreamError};
use crate::config::AzureImageConfig;

/// Image generation through an Azure OpenAI deployment.
pub struct AzureImageClient {
    client: Client,
    config: AzureImageConfig,
}

impl AzureImageClient {
    pub fn new(client: Client, config: AzureImageConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/openai/deployments/{}/images/generations?api-version={}",
            endpoint.trim_end_matches('/'),
            self.config.deployment,
            self.config.api_version
        )
    }

    fn build_payload(&self, prompt: &str) -> Value {
        json!({
            "prompt": prompt,
            "size": self.config.size,
            "quality": self.config.quality,
            "n": 1
        })
    }
}

#[async_trait]
impl ImageGenerator for AzureImageClient {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let (Some(api_key), Some(endpoint)) = (self.config.api_key.as_deref(), self.config.endpoint.as_deref()) else {
            return Err(UpstreamError::Transport(
                "image service is not configured (AZURE_OPENAI_API_KEY / AZURE_OPENAI_ENDPOINT unset)".into(),
            ));
        };

        let url = self.url(endpoint);
        info!("🔗 Image request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("api-key", api_key)
            .json(&self.build_payload(prompt))
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(format!("image service unreachable: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Transport(format!("failed to read image response: {}", e.without_url())))?;

        if !status.is_success() {
            error!("❌ Image API error status={} body={}", status, truncate_for_log(&body, 500));
            return Err(UpstreamError::Transport(format!(
                "image service returned {}: {}",
                status,
                summarize_error_body(&body)
            )));
        }

        extract_first_url(&body)
    }
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

fn extract_first_url(body: &str) -> Result<String, UpstreamError> {
    let parsed: ImagesResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::Malformed(format!("image response is not valid JSON: {e}")))?;
    parsed
        .data
        .into_iter()
        .find_map(|d| d.url)
        .ok_or_else(|| UpstreamError::Malformed("image response contained no image url".into()))
}
