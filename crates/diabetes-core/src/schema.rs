//! Feature Schema
//!
//! The fixed, ordered set of fields the model artifact was trained on, and
//! the table that maps user-facing column names onto them.

use serde::{Deserialize, Serialize};

/// Number of features the model consumes
pub const FEATURE_COUNT: usize = 11;

/// Canonical name of the optional ground-truth column
pub const CLASS_COLUMN: &str = "CLASS";

/// External lowercase name → internal canonical name
const COLUMN_MAP: [(&str, &str); 12] = [
    ("gender", "Gender"),
    ("age", "AGE"),
    ("urea", "Urea"),
    ("cr", "Cr"),
    ("hba1c", "HbA1c"),
    ("chol", "Chol"),
    ("tg", "TG"),
    ("hdl", "HDL"),
    ("ldl", "LDL"),
    ("vldl", "VLDL"),
    ("bmi", "BMI"),
    ("class", CLASS_COLUMN),
];

/// One model input field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Gender,
    Age,
    Urea,
    Creatinine,
    HbA1c,
    Cholesterol,
    Triglyceride,
    Hdl,
    Ldl,
    Vldl,
    Bmi,
}

impl Feature {
    /// All features in the order the model expects them
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Gender,
        Feature::Age,
        Feature::Urea,
        Feature::Creatinine,
        Feature::HbA1c,
        Feature::Cholesterol,
        Feature::Triglyceride,
        Feature::Hdl,
        Feature::Ldl,
        Feature::Vldl,
        Feature::Bmi,
    ];

    /// Position in the model's input vector
    pub fn index(self) -> usize {
        self as usize
    }

    /// Column name the model artifact was trained with
    pub fn canonical_name(self) -> &'static str {
        COLUMN_MAP[self.index()].1
    }

    /// Lowercase column name expected in uploads
    pub fn external_name(self) -> &'static str {
        COLUMN_MAP[self.index()].0
    }

    pub fn from_canonical(name: &str) -> Option<Feature> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.canonical_name() == name)
    }

    /// Everything except gender is a continuous measurement
    pub fn is_measurement(self) -> bool {
        self != Feature::Gender
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            Feature::Gender => "Gender",
            Feature::Age => "Age",
            Feature::Urea => "Urea",
            Feature::Creatinine => "Creatinine",
            Feature::HbA1c => "HbA1c",
            Feature::Cholesterol => "Cholesterol",
            Feature::Triglyceride => "Triglyceride",
            Feature::Hdl => "HDL",
            Feature::Ldl => "LDL",
            Feature::Vldl => "VLDL",
            Feature::Bmi => "BMI",
        }
    }

    /// Explanation shown next to the input
    pub fn description(self) -> &'static str {
        match self {
            Feature::Gender => "Patient sex: Male or Female.",
            Feature::Age => "Patient age in years.",
            Feature::Urea => "Blood urea level.",
            Feature::Creatinine => "Blood creatinine level (Cr).",
            Feature::HbA1c => "Glycated haemoglobin.",
            Feature::Cholesterol => "Total blood cholesterol.",
            Feature::Triglyceride => "Blood triglycerides (TG).",
            Feature::Hdl => "HDL cholesterol (\"good\" cholesterol).",
            Feature::Ldl => "LDL cholesterol (\"bad\" cholesterol).",
            Feature::Vldl => "VLDL cholesterol.",
            Feature::Bmi => "Body mass index.",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Canonical names of every required feature, in schema order
pub fn canonical_names() -> [&'static str; FEATURE_COUNT] {
    Feature::ALL.map(Feature::canonical_name)
}

/// Map a raw header onto its canonical name, if it is a known column
///
/// Matching trims whitespace (and a leading byte-order mark) and ignores case.
pub fn canonical_column(raw: &str) -> Option<&'static str> {
    let key = raw.trim_start_matches('\u{feff}').trim().to_lowercase();
    COLUMN_MAP
        .iter()
        .find(|(external, _)| *external == key)
        .map(|(_, canonical)| *canonical)
}

/// Normalize a raw header: canonical name when known, trimmed lowercase otherwise
pub fn normalize_header(raw: &str) -> String {
    match canonical_column(raw) {
        Some(canonical) => canonical.to_string(),
        None => raw.trim_start_matches('\u{feff}').trim().to_lowercase(),
    }
}

/// Required canonical names absent from `columns`, in schema order
pub fn missing_features<S: AsRef<str>>(columns: &[S]) -> Vec<&'static str> {
    Feature::ALL
        .iter()
        .map(|f| f.canonical_name())
        .filter(|name| !columns.iter().any(|c| c.as_ref() == *name))
        .collect()
}
