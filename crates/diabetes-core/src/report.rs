//! Summary Report
//!
//! Descriptive statistics over a previously exported results table. No
//! prediction happens here; the report only compares the rows the model
//! flagged as diabetic against the rest.

use crate::normalize::RecordNormalizer;
use crate::predict::{DiabetesLabel, Y_PRED_COLUMN};
use crate::record::{Gender, PatientRecord};
use crate::schema::Feature;
use crate::table::DisplayTable;
use crate::{round2, DiabetesError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Number of equal-width histogram bins per feature
pub const HISTOGRAM_BINS: usize = 10;

/// Where the report looks for its input, in order of preference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSource {
    pub csv: PathBuf,
    pub xlsx: PathBuf,
}

/// Load the results table: CSV if present, spreadsheet otherwise
pub fn load_results_table(source: &ReportSource) -> Result<(DisplayTable, PathBuf)> {
    if source.csv.exists() {
        debug!(path = %source.csv.display(), "reading report source");
        let table = DisplayTable::from_csv_file(&source.csv).map_err(report_error)?;
        return Ok((table, source.csv.clone()));
    }
    if source.xlsx.exists() {
        debug!(path = %source.xlsx.display(), "reading report source");
        return Ok((DisplayTable::from_spreadsheet(&source.xlsx)?, source.xlsx.clone()));
    }
    Err(DiabetesError::ReportSourceMissing {
        csv: source.csv.clone(),
        xlsx: source.xlsx.clone(),
    })
}

/// Recast table-level errors so they describe the report source, not an upload
fn report_error(err: DiabetesError) -> DiabetesError {
    match err {
        DiabetesError::UploadParse(msg) => DiabetesError::ReportInvalid(msg),
        DiabetesError::MissingColumns(columns) => {
            DiabetesError::ReportInvalid(format!("missing columns: {}", columns.join(", ")))
        }
        other => other,
    }
}

/// Direction of a feature's association with positive predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Higher,
    Lower,
    NoDifference,
}

/// Positive-prediction rate within one gender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenderBreakdown {
    pub gender: Gender,
    pub total: usize,
    pub predicted_diabetic: usize,
    /// Share of this gender predicted diabetic, in percent
    pub percent_diabetic: f64,
}

/// Mean of one measurement in each predicted class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureComparison {
    pub feature: Feature,
    pub mean_diabetic: Option<f64>,
    pub mean_non_diabetic: Option<f64>,
    pub trend: Trend,
    pub conclusion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub diabetic: usize,
    pub non_diabetic: usize,
}

/// Value distribution of one measurement, split by predicted class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub feature: Feature,
    pub bins: Vec<HistogramBin>,
}

impl Distribution {
    pub fn max_count(&self) -> usize {
        self.bins
            .iter()
            .map(|b| b.diabetic.max(b.non_diabetic))
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub total: usize,
    pub predicted_diabetic: usize,
    pub predicted_non_diabetic: usize,
    /// Share of all rows predicted diabetic, in percent
    pub positive_rate: f64,
    pub gender: Vec<GenderBreakdown>,
    pub features: Vec<FeatureComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributions: Option<Vec<Distribution>>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 * 100.0 / whole as f64)
}

fn compare(feature: Feature, diabetic: &[f64], non_diabetic: &[f64]) -> FeatureComparison {
    let mean_diabetic = mean(diabetic);
    let mean_non_diabetic = mean(non_diabetic);
    let label = feature.label();

    let trend = match (mean_diabetic, mean_non_diabetic) {
        (Some(d), Some(n)) if d > n => Trend::Higher,
        (Some(d), Some(n)) if d < n => Trend::Lower,
        _ => Trend::NoDifference,
    };
    let conclusion = match trend {
        Trend::Higher => format!("Higher {} is associated with a positive diabetes prediction.", label),
        Trend::Lower => format!("Lower {} is associated with a positive diabetes prediction.", label),
        Trend::NoDifference => format!("No difference in {} between predicted groups.", label),
    };

    FeatureComparison {
        feature,
        mean_diabetic: mean_diabetic.map(round2),
        mean_non_diabetic: mean_non_diabetic.map(round2),
        trend,
        conclusion,
    }
}

fn histogram(feature: Feature, rows: &[(PatientRecord, DiabetesLabel)]) -> Distribution {
    let values: Vec<f64> = rows.iter().map(|(r, _)| r.value(feature)).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let n_bins = if values.is_empty() || max <= min { 1 } else { HISTOGRAM_BINS };
    let width = if n_bins == 1 { 0.0 } else { (max - min) / n_bins as f64 };
    let (lower_bound, upper_bound) = if values.is_empty() { (0.0, 0.0) } else { (min, max) };

    let mut bins: Vec<HistogramBin> = (0..n_bins)
        .map(|i| HistogramBin {
            lower: lower_bound + width * i as f64,
            upper: if i + 1 == n_bins {
                upper_bound
            } else {
                lower_bound + width * (i + 1) as f64
            },
            diabetic: 0,
            non_diabetic: 0,
        })
        .collect();

    for (value, (_, label)) in values.iter().zip(rows) {
        let idx = if width == 0.0 {
            0
        } else {
            (((value - min) / width).floor() as usize).min(n_bins - 1)
        };
        match label {
            DiabetesLabel::Diabetes => bins[idx].diabetic += 1,
            DiabetesLabel::NonDiabetes => bins[idx].non_diabetic += 1,
        }
    }

    Distribution { feature, bins }
}

/// Compute the report over a results table
///
/// The table needs every feature column (external or canonical spelling)
/// and a `y_pred` column.
pub fn build_report(
    table: DisplayTable,
    normalizer: &RecordNormalizer,
    source: &str,
    with_charts: bool,
) -> Result<SummaryReport> {
    let mut table = table;
    table.normalize_headers();
    let y_idx = table.column_index(Y_PRED_COLUMN).ok_or_else(|| {
        DiabetesError::ReportInvalid(format!("missing prediction column '{}'", Y_PRED_COLUMN))
    })?;

    let labels = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let raw = row.get(y_idx).map(String::as_str).unwrap_or_default();
            DiabetesLabel::parse(raw).ok_or_else(|| DiabetesError::InvalidValue {
                row: Some(i + 1),
                column: Y_PRED_COLUMN.to_string(),
                value: raw.to_string(),
                reason: "expected 0, 1, Diabetes or Non-diabetes".to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let batch = normalizer.normalize_table(table).map_err(report_error)?;
    let rows: Vec<(PatientRecord, DiabetesLabel)> = batch.records.into_iter().zip(labels).collect();

    let total = rows.len();
    let predicted_diabetic = rows
        .iter()
        .filter(|(_, l)| *l == DiabetesLabel::Diabetes)
        .count();

    let gender = [Gender::Male, Gender::Female]
        .into_iter()
        .map(|g| {
            let group: Vec<_> = rows.iter().filter(|(r, _)| r.gender == g).collect();
            let positive = group
                .iter()
                .filter(|(_, l)| *l == DiabetesLabel::Diabetes)
                .count();
            GenderBreakdown {
                gender: g,
                total: group.len(),
                predicted_diabetic: positive,
                percent_diabetic: percent(positive, group.len()),
            }
        })
        .collect();

    let measurements: Vec<Feature> = Feature::ALL
        .iter()
        .copied()
        .filter(|f| f.is_measurement())
        .collect();

    let features = measurements
        .iter()
        .map(|f| {
            let (diabetic, non_diabetic): (Vec<_>, Vec<_>) =
                rows.iter().partition(|(_, l)| *l == DiabetesLabel::Diabetes);
            let diabetic: Vec<f64> = diabetic.iter().map(|(r, _)| r.value(*f)).collect();
            let non_diabetic: Vec<f64> = non_diabetic.iter().map(|(r, _)| r.value(*f)).collect();
            compare(*f, &diabetic, &non_diabetic)
        })
        .collect();

    let distributions =
        with_charts.then(|| measurements.iter().map(|f| histogram(*f, &rows)).collect());

    info!(rows = total, positive = predicted_diabetic, source, "built summary report");
    Ok(SummaryReport {
        generated_at: Utc::now(),
        source: source.to_string(),
        total,
        predicted_diabetic,
        predicted_non_diabetic: total - predicted_diabetic,
        positive_rate: percent(predicted_diabetic, total),
        gender,
        features,
        distributions,
    })
}

/// Load the configured source and build the report in one step
pub fn report_from_source(
    source: &ReportSource,
    normalizer: &RecordNormalizer,
    with_charts: bool,
) -> Result<SummaryReport> {
    let (table, path) = load_results_table(source)?;
    build_report(table, normalizer, &display_path(&path), with_charts)
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
