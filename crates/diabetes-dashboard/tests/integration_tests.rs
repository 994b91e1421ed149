//! In-process tests of the dashboard routes

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use diabetes_core::{DashboardConfig, ModelArtifact};
use diabetes_dashboard::{app, AppState};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

/// One stump on HbA1c: `<= 6.5` gives 10% risk, above gives 90%
const STUMP_MODEL: &str = r#"{
    "kind": "random_forest",
    "feature_names": ["Gender","AGE","Urea","Cr","HbA1c","Chol","TG","HDL","LDL","VLDL","BMI"],
    "trees": [{"nodes": [
        {"feature": 4, "threshold": 6.5, "left": 1, "right": 2},
        {"value": [9.0, 1.0]},
        {"value": [1.0, 9.0]}
    ]}]
}"#;

const UPLOAD_CSV: &str = "gender;age;urea;cr;hba1c;chol;tg;hdl;ldl;vldl;bmi;class\n\
                          Male;50;4.7;46;7.9;4.2;0.9;2.4;1.4;0.5;24;Y\n\
                          Female;33;3.1;60;4.9;4.0;1.1;1.3;2.1;0.6;21;N\n";

const BOUNDARY: &str = "diabetes-test-boundary";

fn config_in(dir: &Path) -> DashboardConfig {
    DashboardConfig {
        report_csv_path: dir.join("prediction_results.csv"),
        report_xlsx_path: dir.join("prediction_results.xlsx"),
        ..DashboardConfig::default()
    }
}

fn router(config: DashboardConfig) -> Router {
    let model = ModelArtifact::from_json(STUMP_MODEL).unwrap();
    app(Arc::new(AppState::new(Arc::new(model), config)))
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn manual_form(age: &str, hba1c: &str) -> Request<Body> {
    let body = format!(
        "gender=Male&age={}&urea=4.7&creatinine=46&hba1c={}&cholesterol=4.2\
         &triglyceride=0.9&hdl=2.4&ldl=1.4&vldl=0.5&bmi=24",
        age, hba1c
    );
    Request::post("/manual")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn upload(csv: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"patients.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = BOUNDARY,
        csv = csv
    );
    Request::post("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_home_page_lists_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(config_in(dir.path()))
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Diabetes Risk Prediction"));
    assert!(html.contains("Body mass index."));
    assert!(html.contains("not a substitute for a medical diagnosis"));
}

#[tokio::test]
async fn test_manual_prediction_positive_and_negative() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(config_in(dir.path()));

    let response = app.clone().oneshot(manual_form("50", "7.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("The model predicts the patient has diabetes."));
    assert!(!html.contains("Risk Probability"));

    let response = app.oneshot(manual_form("50", "5.0")).await.unwrap();
    let html = body_text(response).await;
    assert!(html.contains("The model predicts the patient does not have diabetes."));
}

#[tokio::test]
async fn test_manual_age_out_of_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(config_in(dir.path()))
        .oneshot(manual_form("0", "7.9"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(response).await;
    assert!(html.contains("AGE"));
    assert!(!html.contains("The model predicts"));
}

#[tokio::test]
async fn test_manual_missing_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::post("/manual")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("gender=Male&age=50"))
        .unwrap();
    let response = router(config_in(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_upload_scores_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(config_in(dir.path()))
        .oneshot(upload(UPLOAD_CSV))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<th>Prediction</th>"));
    assert!(html.contains("<th>Risk Probability (%)</th>"));
    assert!(html.contains("<th>CLASS</th>"));
    assert!(html.contains("<td>Male</td>"));
    assert!(html.contains("<td>90.00</td>"));
    assert!(html.contains("<td>10.00</td>"));
    assert!(html.contains("1 of 2 patients predicted diabetic"));
}

#[tokio::test]
async fn test_upload_missing_column_names_it() {
    let dir = tempfile::tempdir().unwrap();
    let csv = "gender;age;urea;cr;hba1c;chol;tg;hdl;ldl;vldl\n\
               Male;50;4.7;46;7.9;4.2;0.9;2.4;1.4;0.5\n";
    let response = router(config_in(dir.path())).oneshot(upload(csv)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(response).await;
    assert!(html.contains("missing columns"));
    assert!(html.contains("BMI"));
    assert!(!html.contains("<th>Prediction</th>"));
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = DashboardConfig {
        max_upload_bytes: 64,
        ..config_in(dir.path())
    };
    let response = router(config).oneshot(upload(UPLOAD_CSV)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_report_without_source_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(config_in(dir.path()))
        .oneshot(Request::get("/report").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = body_text(response).await;
    assert!(html.contains("prediction_results.csv"));
}

#[tokio::test]
async fn test_exported_upload_feeds_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = DashboardConfig {
        export_results: true,
        ..config_in(dir.path())
    };
    let app = router(config);

    let response = app.clone().oneshot(upload(UPLOAD_CSV)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(dir.path().join("prediction_results.csv").exists());

    let response = app
        .clone()
        .oneshot(Request::get("/report").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("50.00%"));
    assert!(!html.contains("<svg"));

    let response = app
        .oneshot(Request::get("/report?charts=on").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let html = body_text(response).await;
    assert!(html.contains("<svg"));
}

#[tokio::test]
async fn test_api_predict_returns_probability() {
    let dir = tempfile::tempdir().unwrap();
    let payload = serde_json::json!({
        "gender": "Female", "age": 61, "urea": 5.0, "cr": 70, "hba1c": 8.2,
        "chol": 5.1, "tg": 2.0, "hdl": 1.0, "ldl": 3.0, "vldl": 0.9, "bmi": 31.5
    });
    let request = Request::post("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = router(config_in(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["label"], "Diabetes");
    assert!((body["risk_probability"].as_f64().unwrap() - 0.9).abs() < 1e-9);
}

#[tokio::test]
async fn test_api_predict_rejects_unknown_gender() {
    let dir = tempfile::tempdir().unwrap();
    let payload = serde_json::json!({
        "gender": "unknown", "age": 61, "urea": 5.0, "cr": 70, "hba1c": 8.2,
        "chol": 5.1, "tg": 2.0, "hdl": 1.0, "ldl": 3.0, "vldl": 0.9, "bmi": 31.5
    });
    let request = Request::post("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = router(config_in(dir.path())).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], 422);
}

#[tokio::test]
async fn test_health_reports_model() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(config_in(dir.path()))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"]["kind"], "random_forest");
    assert_eq!(body["model"]["trees"], 1);
    assert_eq!(body["gender_policy"], "strict");
}

#[tokio::test]
async fn test_report_with_incomplete_source_is_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    std::fs::write(
        &config.report_csv_path,
        "Gender;AGE;Urea;Cr;HbA1c;Chol;TG;HDL;LDL;VLDL;y_pred\nMale;50;5;1;8;5;2;1;3;1;1\n",
    )
    .unwrap();
    let response = router(config)
        .oneshot(Request::get("/report").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(response).await;
    assert!(html.contains("Report source is invalid: missing columns: BMI"));
    assert!(!html.contains("Uploaded file"));
}
