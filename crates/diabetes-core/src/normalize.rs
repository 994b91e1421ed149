//! Record Normalizer
//!
//! Turns heterogeneous external input into [`PatientRecord`]s:
//!
//! - Headers are trimmed, lowercased and mapped onto canonical names
//! - Gender text is encoded according to the [`GenderPolicy`]
//! - A ground-truth `CLASS` column stays in the display table but never
//!   reaches the model
//! - Every required feature must be present; the batch is rejected otherwise
//! - Every cell is coerced and range-checked; the first bad cell rejects the
//!   whole batch

use crate::record::{Gender, GenderPolicy, ManualInput, PatientRecord, MAX_AGE, MIN_AGE};
use crate::schema::{missing_features, Feature, CLASS_COLUMN, FEATURE_COUNT};
use crate::table::DisplayTable;
use crate::{DiabetesError, Result};
use tracing::debug;

/// Output of batch normalization
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    /// Table with canonical headers and the user's original cell text
    pub display: DisplayTable,
    /// One model-ready record per display row
    pub records: Vec<PatientRecord>,
}

/// Validate an age value: integral, 1..=120
pub fn check_age(age: f64) -> std::result::Result<u8, String> {
    if !age.is_finite() || age.fract() != 0.0 {
        return Err("age must be a whole number of years".to_string());
    }
    if age < f64::from(MIN_AGE) || age > f64::from(MAX_AGE) {
        return Err(format!("age must be between {} and {}", MIN_AGE, MAX_AGE));
    }
    Ok(age as u8)
}

/// Validate a clinical measurement: finite and non-negative
pub fn check_measurement(value: f64) -> std::result::Result<f64, String> {
    if !value.is_finite() {
        return Err("must be a finite number".to_string());
    }
    if value < 0.0 {
        return Err("must not be negative".to_string());
    }
    Ok(value)
}

fn parse_number(raw: &str) -> std::result::Result<f64, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("value is missing".to_string());
    }
    raw.parse::<f64>()
        .map_err(|_| "not a number".to_string())
}

/// Maps raw input onto the feature schema
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordNormalizer {
    policy: GenderPolicy,
}

impl RecordNormalizer {
    pub fn new(policy: GenderPolicy) -> Self {
        RecordNormalizer { policy }
    }

    pub fn policy(&self) -> GenderPolicy {
        self.policy
    }

    /// Parse a single cell of the given feature
    pub fn parse_cell(&self, feature: Feature, raw: &str) -> std::result::Result<f64, String> {
        match feature {
            Feature::Gender => Gender::parse(raw, self.policy).map(|g| f64::from(g.encode())),
            Feature::Age => parse_number(raw).and_then(check_age).map(f64::from),
            _ => parse_number(raw).and_then(check_measurement),
        }
    }

    /// Validate a form submission into a record
    ///
    /// No missing-column check applies here: every field is a required form
    /// control.
    pub fn normalize_manual(&self, input: &ManualInput) -> Result<PatientRecord> {
        let invalid = |feature: Feature, value: String, reason: String| DiabetesError::InvalidValue {
            row: None,
            column: feature.canonical_name().to_string(),
            value,
            reason,
        };

        let gender = Gender::parse(&input.gender, self.policy)
            .map_err(|reason| invalid(Feature::Gender, input.gender.clone(), reason))?;

        let mut values = [0.0; FEATURE_COUNT];
        values[Feature::Gender.index()] = f64::from(gender.encode());
        for feature in Feature::ALL.iter().copied().filter(|f| f.is_measurement()) {
            let value = input.measurement(feature).unwrap_or_default();
            let checked = if feature == Feature::Age {
                check_age(value).map(f64::from)
            } else {
                check_measurement(value)
            };
            values[feature.index()] =
                checked.map_err(|reason| invalid(feature, value.to_string(), reason))?;
        }

        Ok(record_from_values(gender, &values))
    }

    /// Normalize an uploaded table into model-ready records
    ///
    /// Headers are canonicalized in place; the returned display table keeps
    /// every column, including `CLASS` and unknown ones, with the original
    /// cell text.
    pub fn normalize_table(&self, mut table: DisplayTable) -> Result<NormalizedBatch> {
        table.normalize_headers();

        // Repeated display-only columns are harmless; repeated schema columns
        // would make the model input ambiguous
        for (i, header) in table.headers.iter().enumerate() {
            let is_schema_column = header == CLASS_COLUMN || Feature::from_canonical(header).is_some();
            if is_schema_column && table.headers[..i].contains(header) {
                return Err(DiabetesError::UploadParse(format!(
                    "column '{}' appears more than once",
                    header
                )));
            }
        }

        let missing = missing_features(&table.headers);
        if !missing.is_empty() {
            return Err(DiabetesError::MissingColumns(
                missing.into_iter().map(str::to_string).collect(),
            ));
        }

        if table.is_empty() {
            return Err(DiabetesError::UploadParse("file has no data rows".to_string()));
        }

        // Model-facing projection: feature columns only, so CLASS and any
        // unknown columns never reach the classifier
        let positions: Vec<(Feature, usize)> = Feature::ALL
            .iter()
            .map(|f| (*f, table.column_index(f.canonical_name()).unwrap_or_default()))
            .collect();

        let mut records = Vec::with_capacity(table.len());
        for (row_idx, row) in table.rows.iter().enumerate() {
            let mut values = [0.0; FEATURE_COUNT];
            for (feature, col) in &positions {
                let raw = row.get(*col).map(String::as_str).unwrap_or_default();
                values[feature.index()] =
                    self.parse_cell(*feature, raw)
                        .map_err(|reason| DiabetesError::InvalidValue {
                            row: Some(row_idx + 1),
                            column: feature.canonical_name().to_string(),
                            value: raw.to_string(),
                            reason,
                        })?;
            }
            let gender = if values[Feature::Gender.index()] == 1.0 {
                Gender::Male
            } else {
                Gender::Female
            };
            records.push(record_from_values(gender, &values));
        }

        debug!(rows = records.len(), "normalized upload");
        Ok(NormalizedBatch {
            display: table,
            records,
        })
    }
}

fn record_from_values(gender: Gender, values: &[f64; FEATURE_COUNT]) -> PatientRecord {
    PatientRecord {
        gender,
        age: values[Feature::Age.index()] as u8,
        urea: values[Feature::Urea.index()],
        creatinine: values[Feature::Creatinine.index()],
        hba1c: values[Feature::HbA1c.index()],
        cholesterol: values[Feature::Cholesterol.index()],
        triglyceride: values[Feature::Triglyceride.index()],
        hdl: values[Feature::Hdl.index()],
        ldl: values[Feature::Ldl.index()],
        vldl: values[Feature::Vldl.index()],
        bmi: values[Feature::Bmi.index()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "gender;age;urea;cr;hba1c;chol;tg;hdl;ldl;vldl;bmi";

    fn table(text: &str) -> DisplayTable {
        DisplayTable::from_upload(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_reference_row_normalizes() {
        let upload = format!("{}\nMale;45;5.2;0.8;6.1;4.5;1.3;1.0;2.9;0.6;27.3\n", HEADER);
        let batch = RecordNormalizer::default().normalize_table(table(&upload)).unwrap();

        assert_eq!(batch.records.len(), 1);
        let record = &batch.records[0];
        assert_eq!(record.gender.encode(), 1);
        assert_eq!(record.age, 45);
        assert_eq!(record.bmi, 27.3);
        assert_eq!(batch.display.headers[0], "Gender");
        assert_eq!(batch.display.rows[0][0], "Male");
    }

    #[test]
    fn test_headers_matched_case_insensitively() {
        let upload = " Gender ;AGE;Urea;CR;HbA1c;Chol;TG;HDL;LDL;VLDL;Bmi\nfemale;30;4;0.7;5;4;1;1;2;0.5;22\n";
        let batch = RecordNormalizer::default().normalize_table(table(upload)).unwrap();
        assert_eq!(batch.records[0].gender, Gender::Female);
        assert_eq!(batch.records[0].age, 30);
    }

    #[test]
    fn test_missing_bmi_reported() {
        let upload = "gender;age;urea;cr;hba1c;chol;tg;hdl;ldl;vldl\nMale;45;5.2;0.8;6.1;4.5;1.3;1.0;2.9;0.6\n";
        let err = RecordNormalizer::default().normalize_table(table(upload)).unwrap_err();
        match err {
            DiabetesError::MissingColumns(cols) => assert_eq!(cols, vec!["BMI".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_class_column_kept_for_display_only() {
        let upload = format!("{};class\nMale;45;5.2;0.8;6.1;4.5;1.3;1.0;2.9;0.6;27.3;1\n", HEADER);
        let batch = RecordNormalizer::default().normalize_table(table(&upload)).unwrap();
        assert_eq!(batch.display.headers.last().map(String::as_str), Some("CLASS"));
        assert_eq!(batch.display.rows[0].last().map(String::as_str), Some("1"));
        assert_eq!(batch.records[0].features().len(), FEATURE_COUNT);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let upload = format!("{};AGE\nMale;45;5.2;0.8;6.1;4.5;1.3;1.0;2.9;0.6;27.3;46\n", HEADER);
        let err = RecordNormalizer::default().normalize_table(table(&upload)).unwrap_err();
        assert!(matches!(err, DiabetesError::UploadParse(_)));
    }

    #[test]
    fn test_duplicate_class_column_rejected() {
        let upload = format!("{};class;CLASS\nMale;45;5.2;0.8;6.1;4.5;1.3;1.0;2.9;0.6;27.3;1;1\n", HEADER);
        let err = RecordNormalizer::default().normalize_table(table(&upload)).unwrap_err();
        assert!(matches!(err, DiabetesError::UploadParse(_)));
    }

    #[test]
    fn test_repeated_display_columns_kept() {
        let upload = format!(
            "{};note;note;;\nMale;45;5.2;0.8;6.1;4.5;1.3;1.0;2.9;0.6;27.3;a;b;;\n",
            HEADER
        );
        let batch = RecordNormalizer::default().normalize_table(table(&upload)).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.display.headers.len(), FEATURE_COUNT + 4);
        assert_eq!(&batch.display.rows[0][FEATURE_COUNT..], ["a", "b", "", ""]);
    }

    #[test]
    fn test_invalid_cell_rejects_batch_with_location() {
        let upload = format!(
            "{}\nMale;45;5.2;0.8;6.1;4.5;1.3;1.0;2.9;0.6;27.3\nFemale;abc;5;1;6;4;1;1;2;0.5;25\n",
            HEADER
        );
        let err = RecordNormalizer::default().normalize_table(table(&upload)).unwrap_err();
        match err {
            DiabetesError::InvalidValue { row, column, value, .. } => {
                assert_eq!(row, Some(2));
                assert_eq!(column, "AGE");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_age_range_and_integrality() {
        assert_eq!(check_age(45.0), Ok(45));
        assert!(check_age(0.0).is_err());
        assert!(check_age(121.0).is_err());
        assert!(check_age(45.5).is_err());
        assert!(check_age(f64::NAN).is_err());
    }

    #[test]
    fn test_measurements_must_be_non_negative() {
        let normalizer = RecordNormalizer::default();
        assert_eq!(normalizer.parse_cell(Feature::Bmi, "27.3"), Ok(27.3));
        assert!(normalizer.parse_cell(Feature::Bmi, "-1").is_err());
        assert!(normalizer.parse_cell(Feature::Bmi, "").is_err());
        assert!(normalizer.parse_cell(Feature::Bmi, "inf").is_err());
        assert_eq!(normalizer.parse_cell(Feature::Age, "45.0"), Ok(45.0));
    }

    #[test]
    fn test_gender_policy_applies_to_uploads() {
        let upload = format!("{}\nunknown;45;5.2;0.8;6.1;4.5;1.3;1.0;2.9;0.6;27.3\n", HEADER);

        let strict = RecordNormalizer::new(GenderPolicy::Strict).normalize_table(table(&upload));
        assert!(matches!(strict, Err(DiabetesError::InvalidValue { .. })));

        let permissive = RecordNormalizer::new(GenderPolicy::Permissive)
            .normalize_table(table(&upload))
            .unwrap();
        assert_eq!(permissive.records[0].gender, Gender::Female);
        assert_eq!(permissive.display.rows[0][0], "unknown");
    }

    #[test]
    fn test_header_only_upload_rejected() {
        let err = RecordNormalizer::default()
            .normalize_table(table(&format!("{}\n", HEADER)))
            .unwrap_err();
        assert!(matches!(err, DiabetesError::UploadParse(_)));
    }

    #[test]
    fn test_manual_input_encodes_gender() {
        let normalizer = RecordNormalizer::default();
        let mut input = ManualInput {
            gender: "Male".to_string(),
            age: 45.0,
            ..ManualInput::default()
        };
        assert_eq!(normalizer.normalize_manual(&input).unwrap().gender.encode(), 1);

        input.gender = "Female".to_string();
        assert_eq!(normalizer.normalize_manual(&input).unwrap().gender.encode(), 0);
    }

    #[test]
    fn test_manual_input_range_checked() {
        let input = ManualInput {
            age: 0.0,
            ..ManualInput::default()
        };
        let err = RecordNormalizer::default().normalize_manual(&input).unwrap_err();
        match err {
            DiabetesError::InvalidValue { row, column, .. } => {
                assert_eq!(row, None);
                assert_eq!(column, "AGE");
            }
            other => panic!("unexpected error: {other}"),
        }

        let input = ManualInput {
            hdl: -0.5,
            ..ManualInput::default()
        };
        assert!(RecordNormalizer::default().normalize_manual(&input).is_err());
    }
}
