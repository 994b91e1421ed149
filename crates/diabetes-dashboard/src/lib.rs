//! Diabetes Dashboard - Server-Rendered Prediction UI
//!
//! Four pages share one navigation bar:
//!
//! - `/` introduction, input descriptions and disclaimer
//! - `/manual` single-patient form with a plain-language verdict
//! - `/upload` `;`-separated CSV upload with per-row prediction and risk
//! - `/report` summary of previously exported results
//!
//! plus `POST /api/predict` (JSON) and `GET /health`.

pub mod error;
pub mod handlers;
pub mod render;
pub mod state;

pub use error::{ApiError, ServerError};
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Build the dashboard router
pub fn app(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(handlers::home))
        .route("/manual", get(handlers::manual_form).post(handlers::manual_submit))
        .route("/upload", get(handlers::upload_form).post(handlers::upload_submit))
        .route("/report", get(handlers::report))
        .route("/api/predict", post(handlers::api_predict))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
