//! Diabetes Core - Risk Prediction Contract
//!
//! Everything both dashboard entry points (the manual form and the CSV
//! upload) must agree on before a record reaches the classifier:
//!
//! - The 11-field feature schema and its external column names
//! - Record normalization (header mapping, gender encoding, range checks)
//! - The serialized model artifact (`predict` / `predict_proba`)
//! - Single-record and batch prediction paths
//! - The summary report over previously exported batch results
//!
//! # Example
//!
//! ```rust,ignore
//! use diabetes_core::{predict_csv, ModelArtifact, RecordNormalizer, GenderPolicy};
//!
//! let model = ModelArtifact::load("model/rfc_diabetes_model.json")?;
//! let normalizer = RecordNormalizer::new(GenderPolicy::Strict);
//!
//! let csv = b"gender;age;urea;cr;hba1c;chol;tg;hdl;ldl;vldl;bmi\n\
//!             Male;45;5.2;0.8;6.1;4.5;1.3;1.0;2.9;0.6;27.3\n";
//! let outcome = predict_csv(&model, &normalizer, &csv[..])?;
//! println!("{} rows scored", outcome.results.len());
//! ```

pub mod config;
pub mod model;
pub mod normalize;
pub mod predict;
pub mod record;
pub mod report;
pub mod schema;
pub mod table;

pub use config::DashboardConfig;
pub use model::{Classifier, FeatureRow, ModelArtifact, ModelSummary};
pub use normalize::{NormalizedBatch, RecordNormalizer};
pub use predict::{
    predict_batch, predict_csv, predict_single, score_records, BatchOutcome, DiabetesLabel,
    PredictionResult, Verdict,
};
pub use record::{Gender, GenderPolicy, ManualInput, PatientRecord};
pub use report::{build_report, load_results_table, report_from_source, ReportSource, SummaryReport};
pub use schema::{Feature, FEATURE_COUNT};
pub use table::DisplayTable;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised anywhere between raw input and a rendered prediction
#[derive(Debug, Error)]
pub enum DiabetesError {
    /// The model artifact file does not exist
    #[error("Model artifact not found at {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    /// The model artifact exists but cannot be used
    #[error("Model artifact is invalid: {0}")]
    ArtifactInvalid(String),

    /// The uploaded file could not be parsed as a table
    #[error("Could not parse uploaded file: {0}")]
    UploadParse(String),

    /// Required feature columns are absent (canonical names, schema order)
    #[error("Uploaded file is missing columns: {0:?}")]
    MissingColumns(Vec<String>),

    /// A field failed type or range validation
    #[error("{}", describe_invalid(*row, column, value, reason))]
    InvalidValue {
        /// 1-based data row, `None` for form input
        row: Option<usize>,
        column: String,
        value: String,
        reason: String,
    },

    /// Inference produced output inconsistent with its input
    #[error("Scoring failed: {0}")]
    Scoring(String),

    /// Neither report source file exists
    #[error(
        "Report source not found: neither {} nor {} exists",
        csv.display(),
        xlsx.display()
    )]
    ReportSourceMissing { csv: PathBuf, xlsx: PathBuf },

    /// The report source exists but cannot be summarized
    #[error("Report source is invalid: {0}")]
    ReportInvalid(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn describe_invalid(row: Option<usize>, column: &str, value: &str, reason: &str) -> String {
    match row {
        Some(row) => format!(
            "Invalid value '{}' in column {} at row {}: {}",
            value, column, row, reason
        ),
        None => format!("Invalid value '{}' for {}: {}", value, column, reason),
    }
}

impl DiabetesError {
    /// Whether the error stems from user input rather than the deployment
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DiabetesError::UploadParse(_)
                | DiabetesError::MissingColumns(_)
                | DiabetesError::InvalidValue { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DiabetesError>;

/// Round to two decimals for display
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
