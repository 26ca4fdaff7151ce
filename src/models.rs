use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Body of `POST /analyze`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalyzeRequest {
    /// Raw base64 or a `data:image/...;base64,` URL.
    pub image: String,
    #[serde(default)]
    pub occasion: Option<String>,
    #[serde(default)]
    pub attire: Option<String>,
}

/// A named color with its `#rrggbb` code.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ColorSwatch {
    pub name: String,
    #[serde(alias = "hexColor", alias = "hex_color")]
    pub hex: String,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StyleSuggestion {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub occasion: String,
    #[serde(default)]
    pub attire: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HairSuggestion {
    pub name: String,
    pub description: String,
}

/// Structured output of the vision analysis.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StyleProfile {
    #[serde(default)]
    pub compliment: Option<String>,
    #[serde(alias = "ageRange")]
    pub age_range: String,
    pub gender: String,
    #[serde(rename = "hair", alias = "hair_color", alias = "hairColor")]
    pub hair_color: String,
    pub skin: ColorSwatch,
    pub styles: Vec<StyleSuggestion>,
    pub colors: Vec<ColorSwatch>,
    #[serde(default, alias = "hairSuggestions")]
    pub hair_suggestions: Option<Vec<HairSuggestion>>,
}

/// Body of `POST /generate-images`. Carries the fields of a previously
/// returned profile; nothing is kept server-side between the two calls.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerateImagesRequest {
    pub styles: Vec<StyleSuggestion>,
    pub occasion: String,
    #[serde(default)]
    pub attire: Option<String>,
    pub gender: String,
    pub age_range: String,
}

/// Per-style result of the fan-out. A failure is ordinary data here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ImageOutcome {
    Success { image_url: String },
    Failure { error: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub style_name: String,
    #[serde(flatten)]
    pub outcome: ImageOutcome,
}

impl GeneratedImage {
    pub fn success(style_name: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self { style_name: style_name.into(), outcome: ImageOutcome::Success { image_url: image_url.into() } }
    }

    pub fn failure(style_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self { style_name: style_name.into(), outcome: ImageOutcome::Failure { error: error.into() } }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ImageOutcome::Success { .. })
    }
}

/// In completion order, one entry per requested style.
pub type ImageBatchResult = Vec<GeneratedImage>;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub result: StyleProfile,
    pub message: String,
    pub phase: String,
    pub needs_image_generation: bool,
}

impl AnalyzeResponse {
    pub fn complete(result: StyleProfile) -> Self {
        Self {
            success: true,
            result,
            message: "Analysis complete. Loading style images...".to_string(),
            phase: "analysis_complete".to_string(),
            needs_image_generation: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerateImagesResponse {
    pub success: bool,
    pub images: ImageBatchResult,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
}
