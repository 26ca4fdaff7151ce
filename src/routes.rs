use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    extractor::ProfileExtractor,
    fanout::{StyleContext, StyleFanOut},
    models::{AnalyzeRequest, AnalyzeResponse, GenerateImagesRequest, GenerateImagesResponse},
};

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<ProfileExtractor>,
    pub fanout: Arc<StyleFanOut>,
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/generate-images", post(generate_images))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(state)
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::InvalidInput(rejection.body_text())
}

pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let Json(body) = body.map_err(invalid_body)?;

    tracing::info!("📸 Analyze request (occasion={:?}, attire={:?})", body.occasion, body.attire);
    let profile = state
        .extractor
        .extract(&body.image, body.occasion.as_deref(), body.attire.as_deref())
        .await?;

    Ok(Json(AnalyzeResponse::complete(profile)))
}

pub async fn generate_images(
    State(state): State<AppState>,
    body: Result<Json<GenerateImagesRequest>, JsonRejection>,
) -> Result<Json<GenerateImagesResponse>, AppError> {
    let Json(body) = body.map_err(invalid_body)?;

    tracing::info!("🎨 Image request for {} styles (occasion={})", body.styles.len(), body.occasion);
    let ctx = StyleContext {
        occasion: body.occasion,
        attire: body.attire.filter(|a| !a.trim().is_empty()),
        gender: body.gender,
        age_range: body.age_range,
    };
    let images = state.fanout.generate_images(body.styles, ctx).await;

    Ok(Json(GenerateImagesResponse { success: true, images }))
}
