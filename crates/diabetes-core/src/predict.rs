//! Prediction paths
//!
//! Single-record path: a validated form submission scored on its own, reported
//! as a verdict without probability.
//!
//! Batch path: an uploaded table normalized as a whole, scored with one
//! `predict` and one `predict_proba` call, and returned as the original table
//! with two extra columns. Any failure aborts the whole batch.

use crate::model::{Classifier, FeatureRow};
use crate::normalize::RecordNormalizer;
use crate::record::{ManualInput, PatientRecord};
use crate::schema::Feature;
use crate::table::DisplayTable;
use crate::{round2, DiabetesError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Display column holding the predicted label
pub const PREDICTION_COLUMN: &str = "Prediction";

/// Display column holding the risk percentage
pub const RISK_COLUMN: &str = "Risk Probability (%)";

/// Exported column holding the binary prediction
pub const Y_PRED_COLUMN: &str = "y_pred";

/// Exported column holding the positive-class probability
pub const RISK_PROBABILITY_COLUMN: &str = "risk_probability";

/// Predicted class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiabetesLabel {
    #[serde(rename = "Diabetes")]
    Diabetes,
    #[serde(rename = "Non-diabetes")]
    NonDiabetes,
}

impl DiabetesLabel {
    pub fn from_class(class: u8) -> Self {
        if class == 1 {
            DiabetesLabel::Diabetes
        } else {
            DiabetesLabel::NonDiabetes
        }
    }

    pub fn class(self) -> u8 {
        match self {
            DiabetesLabel::Diabetes => 1,
            DiabetesLabel::NonDiabetes => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiabetesLabel::Diabetes => "Diabetes",
            DiabetesLabel::NonDiabetes => "Non-diabetes",
        }
    }

    /// Accepts `1`/`0` (integral decimals too) or the label text
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("diabetes") {
            return Some(DiabetesLabel::Diabetes);
        }
        if raw.eq_ignore_ascii_case("non-diabetes") {
            return Some(DiabetesLabel::NonDiabetes);
        }
        match raw.parse::<f64>() {
            Ok(v) if v == 1.0 => Some(DiabetesLabel::Diabetes),
            Ok(v) if v == 0.0 => Some(DiabetesLabel::NonDiabetes),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiabetesLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model output for one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: DiabetesLabel,
    /// Positive-class probability in [0, 1]
    pub risk_probability: f64,
}

impl PredictionResult {
    /// Risk as a percentage, rounded to two decimals
    pub fn risk_percent(&self) -> f64 {
        round2(self.risk_probability * 100.0)
    }
}

/// Single-record outcome; carries no probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: DiabetesLabel,
}

impl Verdict {
    pub fn message(&self) -> &'static str {
        match self.label {
            DiabetesLabel::Diabetes => "The model predicts the patient has diabetes.",
            DiabetesLabel::NonDiabetes => "The model predicts the patient does not have diabetes.",
        }
    }

    pub fn is_positive(&self) -> bool {
        self.label == DiabetesLabel::Diabetes
    }
}

/// Score records with one `predict` and one `predict_proba` call
pub fn score_records<C: Classifier + ?Sized>(
    model: &C,
    records: &[PatientRecord],
) -> Result<Vec<PredictionResult>> {
    let rows: Vec<FeatureRow> = records.iter().map(PatientRecord::features).collect();
    let labels = model.predict(&rows)?;
    let probabilities = model.predict_proba(&rows)?;

    if labels.len() != rows.len() || probabilities.len() != rows.len() {
        return Err(DiabetesError::Scoring(format!(
            "model returned {} labels and {} probabilities for {} rows",
            labels.len(),
            probabilities.len(),
            rows.len()
        )));
    }

    labels
        .into_iter()
        .zip(probabilities)
        .map(|(label, proba)| {
            let p = proba[1];
            if !(0.0..=1.0).contains(&p) {
                return Err(DiabetesError::Scoring(format!(
                    "probability {} outside [0, 1]",
                    p
                )));
            }
            Ok(PredictionResult {
                label: DiabetesLabel::from_class(label),
                risk_probability: p,
            })
        })
        .collect()
}

/// Single-record path: validate, encode, predict
pub fn predict_single<C: Classifier + ?Sized>(
    model: &C,
    normalizer: &RecordNormalizer,
    input: &ManualInput,
) -> Result<Verdict> {
    let record = normalizer.normalize_manual(input)?;
    let labels = model.predict(&[record.features()])?;
    let label = labels
        .first()
        .copied()
        .ok_or_else(|| DiabetesError::Scoring("model returned no label".to_string()))?;
    Ok(Verdict {
        label: DiabetesLabel::from_class(label),
    })
}

/// Result of a batch prediction
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Uploaded table plus the prediction and risk columns
    pub table: DisplayTable,
    pub records: Vec<PatientRecord>,
    pub results: Vec<PredictionResult>,
    pub scored_at: DateTime<Utc>,
}

impl BatchOutcome {
    pub fn positive_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.label == DiabetesLabel::Diabetes)
            .count()
    }

    /// Export for the summary report: canonical features, `y_pred`, probability
    pub fn results_table(&self) -> DisplayTable {
        let mut headers: Vec<String> = Feature::ALL
            .iter()
            .map(|f| f.canonical_name().to_string())
            .collect();
        headers.push(Y_PRED_COLUMN.to_string());
        headers.push(RISK_PROBABILITY_COLUMN.to_string());

        let mut table = DisplayTable::new(headers);
        for (record, result) in self.records.iter().zip(&self.results) {
            let mut row: Vec<String> = Feature::ALL
                .iter()
                .map(|f| match f {
                    Feature::Gender => record.gender.as_str().to_string(),
                    Feature::Age => record.age.to_string(),
                    _ => record.value(*f).to_string(),
                })
                .collect();
            row.push(result.label.class().to_string());
            row.push(format!("{:.4}", result.risk_probability));
            table.rows.push(row);
        }
        table
    }
}

/// Batch path over an already parsed table
pub fn predict_batch<C: Classifier + ?Sized>(
    model: &C,
    normalizer: &RecordNormalizer,
    table: DisplayTable,
) -> Result<BatchOutcome> {
    let batch = normalizer.normalize_table(table)?;
    let results = score_records(model, &batch.records)?;

    let mut display = batch.display;
    display.push_column(
        PREDICTION_COLUMN,
        results.iter().map(|r| r.label.as_str().to_string()).collect(),
    )?;
    display.push_column(
        RISK_COLUMN,
        results.iter().map(|r| format!("{:.2}", r.risk_percent())).collect(),
    )?;

    let outcome = BatchOutcome {
        table: display,
        records: batch.records,
        results,
        scored_at: Utc::now(),
    };
    info!(
        rows = outcome.results.len(),
        positive = outcome.positive_count(),
        "scored batch"
    );
    Ok(outcome)
}

/// Batch path over raw `;`-separated upload bytes
pub fn predict_csv<C: Classifier + ?Sized>(
    model: &C,
    normalizer: &RecordNormalizer,
    bytes: &[u8],
) -> Result<BatchOutcome> {
    let table = DisplayTable::from_upload(bytes)?;
    predict_batch(model, normalizer, table)
}
