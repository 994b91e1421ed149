//! Route handlers
//!
//! Scoring runs inline on the request task; the model is shared read-only
//! through [`AppState`].

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use diabetes_core::report::report_from_source;
use diabetes_core::{
    predict_csv, predict_single, score_records, BatchOutcome, DiabetesLabel, ManualInput,
    Verdict,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ApiError, Result, ServerError};
use crate::render::{self, UploadView};
use crate::state::AppState;

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "file";

pub async fn home() -> Html<String> {
    Html(render::home_page())
}

// ============================================================================
// Manual input
// ============================================================================

pub async fn manual_form() -> Html<String> {
    Html(render::manual_page(&ManualInput::default(), None))
}

pub async fn manual_submit(
    State(state): State<Arc<AppState>>,
    form: std::result::Result<Form<ManualInput>, FormRejection>,
) -> Response {
    let input = match form {
        Ok(Form(input)) => input,
        Err(rejection) => {
            warn!(error = %rejection, "malformed manual form");
            let page = render::manual_page(
                &ManualInput::default(),
                Some(Err(format!("Please fill in every field: {}", rejection.body_text()))),
            );
            return (StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response();
        }
    };

    match predict_single(state.model.as_ref(), &state.normalizer, &input) {
        Ok(verdict) => {
            info!(label = %verdict.label, "manual prediction");
            Html(render::manual_page(&input, Some(Ok(verdict)))).into_response()
        }
        Err(err) => {
            let err = ServerError::from(err);
            warn!(error = %err, "manual prediction rejected");
            let page = render::manual_page(&input, Some(Err(err.to_string())));
            (err.status(), Html(page)).into_response()
        }
    }
}

// ============================================================================
// CSV upload
// ============================================================================

pub async fn upload_form() -> Html<String> {
    Html(render::upload_page(UploadView::Empty))
}

pub async fn upload_submit(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let outcome = match read_upload(multipart, state.config.max_upload_bytes).await {
        Ok(bytes) => predict_csv(state.model.as_ref(), &state.normalizer, &bytes)
            .map_err(ServerError::from),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(outcome) => {
            let notice = export_results(&state, &outcome);
            let page = render::upload_page(UploadView::Scored {
                table: &outcome.table,
                positive: outcome.positive_count(),
                notice,
            });
            Html(page).into_response()
        }
        Err(err) => {
            warn!(error = %err, "upload rejected");
            let page = render::upload_page(UploadView::Failed(err.to_string()));
            (err.status(), Html(page)).into_response()
        }
    }
}

async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<Vec<u8>> {
    let too_large = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge { limit }
        } else {
            ServerError::BadRequest(e.body_text())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(too_large)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await.map_err(too_large)?;
        if data.is_empty() {
            return Err(ServerError::BadRequest("Uploaded file is empty".to_string()));
        }
        info!(file = %file_name, bytes = data.len(), "received upload");
        return Ok(data.to_vec());
    }
    Err(ServerError::BadRequest("No file uploaded".to_string()))
}

/// Write the report source when enabled; returns a notice on failure
fn export_results(state: &AppState, outcome: &BatchOutcome) -> Option<String> {
    if !state.config.export_results {
        return None;
    }
    let path = &state.config.report_csv_path;
    match outcome.results_table().write_csv(path) {
        Ok(()) => {
            info!(path = %path.display(), rows = outcome.results.len(), "exported results");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "result export failed");
            Some(format!("Results were not saved for the report: {}", err))
        }
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub charts: Option<String>,
}

impl ReportQuery {
    fn charts_enabled(&self) -> bool {
        match self.charts.as_deref() {
            None => false,
            Some(v) => !matches!(v.to_ascii_lowercase().as_str(), "" | "off" | "false" | "0"),
        }
    }
}

pub async fn report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Html<String>> {
    let charts = query.charts_enabled();
    let report = report_from_source(&state.config.report_source(), &state.normalizer, charts)?;
    Ok(Html(render::report_page(&report, charts)))
}

// ============================================================================
// JSON API
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub label: DiabetesLabel,
    pub message: String,
    pub risk_probability: f64,
}

pub async fn api_predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ManualInput>, JsonRejection>,
) -> std::result::Result<Json<PredictResponse>, ApiError> {
    let Json(input) = payload.map_err(|r| ServerError::BadRequest(r.body_text()))?;
    let record = state.normalizer.normalize_manual(&input)?;
    let scored = score_records(state.model.as_ref(), &[record])?;
    let result = scored
        .first()
        .ok_or_else(|| ServerError::Internal("model returned no prediction".to_string()))?;
    let verdict = Verdict {
        label: result.label,
    };

    Ok(Json(PredictResponse {
        label: verdict.label,
        message: verdict.message().to_string(),
        risk_probability: result.risk_probability,
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "model": state.model.summary(),
        "gender_policy": state.normalizer.policy(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charts_toggle() {
        let query = |v: Option<&str>| ReportQuery {
            charts: v.map(str::to_string),
        };
        assert!(!query(None).charts_enabled());
        assert!(query(Some("on")).charts_enabled());
        assert!(query(Some("true")).charts_enabled());
        assert!(!query(Some("off")).charts_enabled());
        assert!(!query(Some("")).charts_enabled());
    }
}
