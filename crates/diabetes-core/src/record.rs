//! Patient records
//!
//! A [`PatientRecord`] is a fully validated row of clinical input, ready to be
//! turned into a model feature vector. [`ManualInput`] is the unvalidated form
//! submission that becomes one.

use crate::model::FeatureRow;
use crate::schema::Feature;
use serde::{Deserialize, Serialize};

/// Lowest accepted age in years
pub const MIN_AGE: u8 = 1;

/// Highest accepted age in years
pub const MAX_AGE: u8 = 120;

/// How unrecognized gender text is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderPolicy {
    /// Only male/female (or an already encoded 1/0) are accepted
    #[default]
    Strict,
    /// Anything that is not "male" encodes as female
    Permissive,
}

/// Patient gender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// Model encoding: 1 = Male, 0 = Female
    pub fn encode(self) -> u8 {
        match self {
            Gender::Male => 1,
            Gender::Female => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }

    /// Parse gender text under the given policy
    ///
    /// Matching is trimmed and case-insensitive. Returns the rejection reason
    /// on failure.
    pub fn parse(raw: &str, policy: GenderPolicy) -> Result<Gender, String> {
        let value = raw.trim().to_lowercase();
        match value.as_str() {
            "male" | "1" => Ok(Gender::Male),
            "female" | "0" => Ok(Gender::Female),
            _ => match policy {
                GenderPolicy::Permissive => Ok(Gender::Female),
                GenderPolicy::Strict => Err("expected Male or Female".to_string()),
            },
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated row of clinical measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub gender: Gender,
    /// Years, 1..=120
    pub age: u8,
    pub urea: f64,
    pub creatinine: f64,
    pub hba1c: f64,
    pub cholesterol: f64,
    pub triglyceride: f64,
    pub hdl: f64,
    pub ldl: f64,
    pub vldl: f64,
    pub bmi: f64,
}

impl PatientRecord {
    /// Numeric value of a feature as the model sees it
    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Gender => f64::from(self.gender.encode()),
            Feature::Age => f64::from(self.age),
            Feature::Urea => self.urea,
            Feature::Creatinine => self.creatinine,
            Feature::HbA1c => self.hba1c,
            Feature::Cholesterol => self.cholesterol,
            Feature::Triglyceride => self.triglyceride,
            Feature::Hdl => self.hdl,
            Feature::Ldl => self.ldl,
            Feature::Vldl => self.vldl,
            Feature::Bmi => self.bmi,
        }
    }

    /// Feature vector in schema order
    pub fn features(&self) -> FeatureRow {
        Feature::ALL.map(|f| self.value(f))
    }
}

/// Unvalidated single-record input, as submitted by the manual form or the
/// JSON endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualInput {
    pub gender: String,
    pub age: f64,
    pub urea: f64,
    #[serde(alias = "cr")]
    pub creatinine: f64,
    pub hba1c: f64,
    #[serde(alias = "chol")]
    pub cholesterol: f64,
    #[serde(alias = "tg")]
    pub triglyceride: f64,
    pub hdl: f64,
    pub ldl: f64,
    pub vldl: f64,
    pub bmi: f64,
}

impl Default for ManualInput {
    /// Form defaults: the lowest value each control accepts
    fn default() -> Self {
        ManualInput {
            gender: Gender::Female.as_str().to_string(),
            age: f64::from(MIN_AGE),
            urea: 0.0,
            creatinine: 0.0,
            hba1c: 0.0,
            cholesterol: 0.0,
            triglyceride: 0.0,
            hdl: 0.0,
            ldl: 0.0,
            vldl: 0.0,
            bmi: 0.0,
        }
    }
}

impl ManualInput {
    /// Value submitted for a measurement feature (gender excluded)
    pub fn measurement(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Gender => None,
            Feature::Age => Some(self.age),
            Feature::Urea => Some(self.urea),
            Feature::Creatinine => Some(self.creatinine),
            Feature::HbA1c => Some(self.hba1c),
            Feature::Cholesterol => Some(self.cholesterol),
            Feature::Triglyceride => Some(self.triglyceride),
            Feature::Hdl => Some(self.hdl),
            Feature::Ldl => Some(self.ldl),
            Feature::Vldl => Some(self.vldl),
            Feature::Bmi => Some(self.bmi),
        }
    }
}

impl From<&PatientRecord> for ManualInput {
    fn from(record: &PatientRecord) -> Self {
        ManualInput {
            gender: record.gender.as_str().to_string(),
            age: f64::from(record.age),
            urea: record.urea,
            creatinine: record.creatinine,
            hba1c: record.hba1c,
            cholesterol: record.cholesterol,
            triglyceride: record.triglyceride,
            hdl: record.hdl,
            ldl: record.ldl,
            vldl: record.vldl,
            bmi: record.bmi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_encoding() {
        assert_eq!(Gender::Male.encode(), 1);
        assert_eq!(Gender::Female.encode(), 0);
    }

    #[test]
    fn test_gender_parse_case_insensitive() {
        assert_eq!(Gender::parse(" MALE ", GenderPolicy::Strict), Ok(Gender::Male));
        assert_eq!(Gender::parse("Female", GenderPolicy::Strict), Ok(Gender::Female));
        assert_eq!(Gender::parse("1", GenderPolicy::Strict), Ok(Gender::Male));
        assert_eq!(Gender::parse("0", GenderPolicy::Strict), Ok(Gender::Female));
    }

    #[test]
    fn test_gender_policy_on_unrecognized_text() {
        assert!(Gender::parse("unknown", GenderPolicy::Strict).is_err());
        assert_eq!(
            Gender::parse("unknown", GenderPolicy::Permissive),
            Ok(Gender::Female)
        );
        // "M" is not "male" under either policy
        assert_eq!(Gender::parse("M", GenderPolicy::Permissive), Ok(Gender::Female));
    }

    #[test]
    fn test_features_follow_schema_order() {
        let record = PatientRecord {
            gender: Gender::Male,
            age: 45,
            urea: 5.2,
            creatinine: 0.8,
            hba1c: 6.1,
            cholesterol: 4.5,
            triglyceride: 1.3,
            hdl: 1.0,
            ldl: 2.9,
            vldl: 0.6,
            bmi: 27.3,
        };
        assert_eq!(
            record.features(),
            [1.0, 45.0, 5.2, 0.8, 6.1, 4.5, 1.3, 1.0, 2.9, 0.6, 27.3]
        );
    }

    #[test]
    fn test_manual_input_accepts_external_aliases() {
        let json = r#"{"gender":"Male","age":45,"urea":5.2,"cr":0.8,"hba1c":6.1,
            "chol":4.5,"tg":1.3,"hdl":1.0,"ldl":2.9,"vldl":0.6,"bmi":27.3}"#;
        let input: ManualInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.creatinine, 0.8);
        assert_eq!(input.cholesterol, 4.5);
        assert_eq!(input.triglyceride, 1.3);
    }
}
