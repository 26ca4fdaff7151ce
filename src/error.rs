use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::extractor::AnalysisError;
use crate::models::FailureResponse;

/// Errors that end a request with the `{success: false, error}` envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Analysis(err) => match err {
                AnalysisError::MissingField(_) | AnalysisError::InvalidImage(_) => StatusCode::BAD_REQUEST,
                AnalysisError::Transport(_) => StatusCode::BAD_GATEWAY,
                AnalysisError::MalformedResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AnalysisError::NoPersonDetected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = FailureResponse { success: false, error: self.to_string() };
        (status, Json(body)).into_response()
    }
}
