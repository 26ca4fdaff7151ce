//! Stage two: one image request per style, at most `workers` in flight,
//! every style accounted for in the result whatever happens to its task.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::clients::{ImageGenerator, UpstreamError};
use crate::config::{FanOutConfig, MAX_IMAGE_RETRIES, MAX_IMAGE_WORKERS};
use crate::models::{GeneratedImage, ImageBatchResult, StyleSuggestion};

const PHOTO_REQUIREMENTS: &str = "Requirements:
- Professional fashion photography style
- Clean white or light gray background
- Full outfit displayed on invisible mannequin
- High-quality, detailed clothing
- No human faces or models
- Focus on the outfit combination
- Show accessories if mentioned
- Ensure all items are clearly visible
- Professional studio lighting
- Strictly follow the style description and occasion
- Sharp, clear details of fabrics and textures";

/// Fields shared by every style in a batch.
#[derive(Debug, Clone)]
pub struct StyleContext {
    pub occasion: String,
    pub attire: Option<String>,
    pub gender: String,
    pub age_range: String,
}

pub fn build_style_prompt(style: &StyleSuggestion, ctx: &StyleContext) -> String {
    let attire = ctx
        .attire
        .as_deref()
        .or(style.attire.as_deref())
        .map(|a| format!("Attire category: {a}.\n"))
        .unwrap_or_default();
    format!(
        "Create a fashion outfit photo for {} occasion.\n{}Style description: {} for {} and age range between {}\n\n{}",
        ctx.occasion, attire, style.description, ctx.gender, ctx.age_range, PHOTO_REQUIREMENTS
    )
}

pub struct StyleFanOut {
    images: Arc<dyn ImageGenerator>,
    config: FanOutConfig,
}

impl StyleFanOut {
    pub fn new(images: Arc<dyn ImageGenerator>, config: FanOutConfig) -> Self {
        Self { images, config }
    }

    /// Never fails as a whole: each style's error is recorded in its entry.
    pub async fn generate_images(&self, styles: Vec<StyleSuggestion>, ctx: StyleContext) -> ImageBatchResult {
        if styles.is_empty() {
            return Vec::new();
        }

        let total = styles.len();
        let span = info_span!("fanout", batch = %Uuid::new_v4(), styles = total);
        async move {
            info!("🚀 Generating {} style images with {} workers", total, self.config.workers);

            let semaphore = Arc::new(Semaphore::new(self.config.workers.clamp(1, MAX_IMAGE_WORKERS)));
            let collected: Arc<Mutex<Vec<(usize, GeneratedImage)>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));
            let ctx = Arc::new(ctx);
            let names: Vec<String> = styles.iter().map(|s| s.name.clone()).collect();

            let mut tasks = JoinSet::new();
            for (index, style) in styles.into_iter().enumerate() {
                let semaphore = semaphore.clone();
                let collected = collected.clone();
                let images = self.images.clone();
                let ctx = ctx.clone();
                let config = self.config.clone();

                tasks.spawn(
                    async move {
                        let entry = match semaphore.acquire_owned().await {
                            Ok(_permit) => render_style(images.as_ref(), &style, &ctx, &config).await,
                            Err(_) => GeneratedImage::failure(&style.name, "worker pool closed"),
                        };
                        collected.lock().push((index, entry));
                    }
                    .in_current_span(),
                );
            }

            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!("❌ Style task aborted: {}", e);
                }
            }

            let collected = std::mem::take(&mut *collected.lock());
            let mut seen = vec![false; total];
            let mut results: ImageBatchResult = Vec::with_capacity(total);
            for (index, entry) in collected {
                seen[index] = true;
                results.push(entry);
            }
            // tasks that panicked never wrote their slot
            for (index, name) in names.into_iter().enumerate().filter(|(i, _)| !seen[*i]) {
                warn!("⚠️ No result recorded for style #{} '{}'", index, name);
                results.push(GeneratedImage::failure(name, "image generation failed unexpectedly"));
            }

            let ok = results.iter().filter(|r| r.is_success()).count();
            info!("✅ Batch done: {} succeeded, {} failed", ok, results.len() - ok);
            results
        }
        .instrument(span)
        .await
    }
}

async fn render_style(
    images: &dyn ImageGenerator,
    style: &StyleSuggestion,
    ctx: &StyleContext,
    config: &FanOutConfig,
) -> GeneratedImage {
    let prompt = build_style_prompt(style, ctx);
    let attempts = config.retries.min(MAX_IMAGE_RETRIES).saturating_add(1);
    let mut last_error = String::from("image generation failed");

    for attempt in 1..=attempts {
        info!("🎯 Style '{}' attempt {}/{}", style.name, attempt, attempts);
        match call_with_timeout(images, &prompt, config.timeout).await {
            Ok(url) => {
                info!("🖼️ Style '{}' rendered", style.name);
                return GeneratedImage::success(&style.name, url);
            }
            Err(e) => {
                warn!("⚠️ Style '{}' attempt {} failed: {}", style.name, attempt, e);
                last_error = e.to_string();
            }
        }
    }

    error!("❌ Style '{}' failed: {}", style.name, last_error);
    GeneratedImage::failure(&style.name, last_error)
}

async fn call_with_timeout(
    images: &dyn ImageGenerator,
    prompt: &str,
    timeout: Option<Duration>,
) -> Result<String, UpstreamError> {
    match timeout {
        None => images.generate(prompt).await,
        Some(limit) => tokio::time::timeout(limit, images.generate(prompt))
            .await
            .unwrap_or_else(|_| Err(UpstreamError::Transport(format!("image generation timed out after {}s", limit.as_secs_f32())))),
    }
}
