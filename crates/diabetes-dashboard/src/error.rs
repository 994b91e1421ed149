//! Request errors and their HTTP rendering

use crate::render;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use diabetes_core::DiabetesError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error(transparent)]
    Prediction(#[from] DiabetesError),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Prediction(err) if err.is_user_error() => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Prediction(err) => match err {
                DiabetesError::ReportSourceMissing { .. } => StatusCode::NOT_FOUND,
                DiabetesError::ReportInvalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self.status() {
            StatusCode::NOT_FOUND => "Not found",
            StatusCode::INTERNAL_SERVER_ERROR => "Server error",
            _ => "Request rejected",
        }
    }

    fn log(&self) {
        if self.status().is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        self.log();
        let page = render::error_page(self.title(), &self.to_string());
        (self.status(), Html(page)).into_response()
    }
}

/// JSON flavour of [`ServerError`] for the `/api` routes
#[derive(Debug)]
pub struct ApiError(pub ServerError);

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        ApiError(err)
    }
}

impl From<DiabetesError> for ApiError {
    fn from(err: DiabetesError) -> Self {
        ApiError(ServerError::Prediction(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0.log();
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "status": self.0.status().as_u16(),
        });
        (self.0.status(), Json(body)).into_response()
    }
}
