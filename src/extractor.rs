//! Stage one: a single vision call turning a selfie and an occasion into a
//! validated [`StyleProfile`].

use std::sync::Arc;

use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::clients::{truncate_for_log, UpstreamError, VisionModel, VisionRequest};
use crate::models::{ColorSwatch, StyleProfile};

pub const STYLE_COUNT: usize = 5;
pub const COLOR_COUNT: usize = 5;

const SYSTEM_PROMPT: &str = "You are a precise style and fashion analyzer. Analyze the image and return your response in JSON format only. \
When suggesting colors or describing skin tone, always include a hex code in the form #RRGGBB.";

const NO_PERSON_MESSAGE: &str = "This image does not contain a clear view of a person. Please upload a clear selfie.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("style analysis service failed: {0}")]
    Transport(String),
    #[error("style analysis returned an unexpected response: {0}")]
    MalformedResponse(String),
    /// The model's sentinel message, verbatim.
    #[error("{0}")]
    NoPersonDetected(String),
}

impl From<UpstreamError> for AnalysisError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Transport(m) => AnalysisError::Transport(m),
            UpstreamError::Malformed(m) => AnalysisError::MalformedResponse(m),
        }
    }
}

pub type ExtractionOutcome = Result<StyleProfile, AnalysisError>;

/// An image that passed local validation.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl DecodedImage {
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Accepts raw base64 or a `data:...;base64,` URL.
pub fn decode_image(encoded: &str) -> Result<DecodedImage, AnalysisError> {
    let trimmed = encoded.trim();
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| AnalysisError::InvalidImage("data URL has no payload".into()))?,
        None => trimmed,
    };
    // line-wrapped (MIME style) base64 is still valid
    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if payload.is_empty() {
        return Err(AnalysisError::MissingField("image"));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&payload)
        .map_err(|e| AnalysisError::InvalidImage(format!("not valid base64 ({e})")))?;

    let format = image::guess_format(&bytes)
        .map_err(|_| AnalysisError::InvalidImage("unrecognised image format".into()))?;

    Ok(DecodedImage { bytes, mime_type: format.to_mime_type() })
}

pub struct ProfileExtractor {
    vision: Arc<dyn VisionModel>,
}

impl ProfileExtractor {
    pub fn new(vision: Arc<dyn VisionModel>) -> Self {
        Self { vision }
    }

    pub fn build_prompt(occasion: &str, attire: Option<&str>) -> String {
        let attire_line = attire
            .map(|a| format!(" The person prefers {a} attire; keep every style within that category."))
            .unwrap_or_default();
        let attire_field = attire.map(|a| format!(", \"attire\": {}", json_text(a))).unwrap_or_default();
        let description = json_text(&format!("brief description of the full outfit for {occasion}"));
        let occasion = json_text(occasion);
        let style = format!(
            "{{\"name\": \"style name\", \"description\": {description}, \"occasion\": {occasion}{attire_field}}}"
        );
        let color = "{\"name\": \"color name\", \"hex\": \"#RRGGBB\"}";
        let styles = vec![style.as_str(); STYLE_COUNT].join(",\n    ");
        let colors = vec![color; COLOR_COUNT].join(",\n    ");

        format!(
            "Analyze this image for the occasion {occasion}.{attire_line} Return ONLY a JSON object in one of these exact formats.

For images without a clear view of a person:
{{\"error\": \"{NO_PERSON_MESSAGE}\"}}

For valid selfies:
{{
  \"compliment\": \"compliment for the person in two sentences\",
  \"age_range\": \"estimated age range (e.g. '20-25')\",
  \"gender\": \"person's apparent gender\",
  \"hair\": \"hair color\",
  \"skin\": {{\"name\": \"skin tone\", \"hex\": \"#RRGGBB\"}},
  \"styles\": [
    {styles}
  ],
  \"colors\": [
    {colors}
  ],
  \"hair_suggestions\": [{{\"name\": \"haircut name\", \"description\": \"why it suits the person\"}}]
}}

Provide exactly {STYLE_COUNT} styles and exactly {COLOR_COUNT} colors. Every hex code is mandatory and must be # followed by 6 hex digits."
        )
    }

    pub async fn extract(&self, image: &str, occasion: Option<&str>, attire: Option<&str>) -> ExtractionOutcome {
        let occasion = occasion
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .ok_or(AnalysisError::MissingField("occasion"))?;
        let attire = attire.map(str::trim).filter(|a| !a.is_empty());
        let image = decode_image(image)?;

        info!("🎯 Analyzing {} image ({} bytes) for occasion '{}'", image.mime_type, image.bytes.len(), occasion);

        let request = VisionRequest {
            system: SYSTEM_PROMPT.to_string(),
            text: Self::build_prompt(occasion, attire),
            image_data_url: image.data_url(),
        };

        let raw = self.vision.complete_json(&request).await.map_err(|e| {
            error!("❌ Vision call failed: {}", e);
            AnalysisError::from(e)
        })?;

        let profile = parse_profile(&raw, occasion, attire)?;
        info!(
            "✅ Profile ready: {} styles, {} colors, age_range={}",
            profile.styles.len(),
            profile.colors.len(),
            profile.age_range
        );
        Ok(profile)
    }
}

/// Quoted and escaped JSON string literal for a user-supplied value.
fn json_text(value: &str) -> String {
    Value::from(value).to_string()
}

#[derive(Deserialize)]
struct Sentinel {
    error: String,
}

/// Parses the model output into a profile, or the sentinel into
/// [`AnalysisError::NoPersonDetected`].
pub fn parse_profile(raw: &str, occasion: &str, attire: Option<&str>) -> ExtractionOutcome {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        warn!("⚠️ Unparseable model output: {}", truncate_for_log(raw, 200));
        AnalysisError::MalformedResponse(format!("not valid JSON ({e})"))
    })?;

    if let Ok(sentinel) = Sentinel::deserialize(&value) {
        info!("🙈 Model reported no person: {:?}", sentinel.error);
        let message = match sentinel.error.trim() {
            "" => NO_PERSON_MESSAGE.to_string(),
            text => text.to_string(),
        };
        return Err(AnalysisError::NoPersonDetected(message));
    }

    let mut profile: StyleProfile = serde_json::from_value(value)
        .map_err(|e| AnalysisError::MalformedResponse(format!("profile does not match the expected shape ({e})")))?;

    for style in &mut profile.styles {
        if style.occasion.trim().is_empty() {
            style.occasion = occasion.to_string();
        }
        if style.attire.is_none() {
            style.attire = attire.map(str::to_string);
        }
    }

    validate_profile(&profile)?;
    Ok(profile)
}

fn validate_profile(profile: &StyleProfile) -> Result<(), AnalysisError> {
    let malformed = |m: String| Err(AnalysisError::MalformedResponse(m));

    if profile.styles.len() != STYLE_COUNT {
        return malformed(format!("expected {STYLE_COUNT} styles, got {}", profile.styles.len()));
    }
    if profile.colors.len() != COLOR_COUNT {
        return malformed(format!("expected {COLOR_COUNT} colors, got {}", profile.colors.len()));
    }
    if let Some(style) = profile.styles.iter().find(|s| s.name.trim().is_empty()) {
        return malformed(format!("style with empty name ({})", truncate_for_log(&style.description, 40)));
    }
    for swatch in std::iter::once(&profile.skin).chain(&profile.colors) {
        if !swatch.is_well_formed() {
            return malformed(format!("'{}' has invalid hex code '{}'", swatch.name, swatch.hex));
        }
    }
    Ok(())
}

impl ColorSwatch {
    /// `#` followed by exactly six hex digits.
    pub fn is_well_formed(&self) -> bool {
        self.hex.len() == 7 && self.hex.starts_with('#') && self.hex[1..].chars().all(|c| c.is_ascii_hexdigit())
    }
}
