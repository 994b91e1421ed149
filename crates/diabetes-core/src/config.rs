//! Dashboard configuration
//!
//! Loaded from an optional TOML file; every key has a default so an empty
//! file (or no file) is a valid configuration.
//!
//! ```toml
//! model_path = "model/rfc_diabetes_model.json"
//! report_csv_path = "results/prediction_results.csv"
//! report_xlsx_path = "results/prediction_results.xlsx"
//! listen_addr = "127.0.0.1:8501"
//! max_upload_bytes = 10485760
//! gender_policy = "strict"
//! export_results = false
//! ```

use crate::record::GenderPolicy;
use crate::report::ReportSource;
use crate::{DiabetesError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default model artifact location, relative to the working directory
pub const DEFAULT_MODEL_PATH: &str = "model/rfc_diabetes_model.json";

pub const DEFAULT_REPORT_CSV: &str = "results/prediction_results.csv";

pub const DEFAULT_REPORT_XLSX: &str = "results/prediction_results.xlsx";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8501";

/// 10 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub model_path: PathBuf,
    pub report_csv_path: PathBuf,
    pub report_xlsx_path: PathBuf,
    pub listen_addr: String,
    pub max_upload_bytes: usize,
    pub gender_policy: GenderPolicy,
    /// Write every successful batch to `report_csv_path`
    pub export_results: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            report_csv_path: PathBuf::from(DEFAULT_REPORT_CSV),
            report_xlsx_path: PathBuf::from(DEFAULT_REPORT_XLSX),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            gender_policy: GenderPolicy::Strict,
            export_results: false,
        }
    }
}

impl DashboardConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: DashboardConfig =
            toml::from_str(text).map_err(|e| DiabetesError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; `None` yields the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(DashboardConfig::default()),
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    DiabetesError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&text)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(DiabetesError::Config(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.listen_addr.trim().is_empty() {
            return Err(DiabetesError::Config("listen_addr must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn report_source(&self) -> ReportSource {
        ReportSource {
            csv: self.report_csv_path.clone(),
            xlsx: self.report_xlsx_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(DashboardConfig::from_toml_str("").unwrap(), DashboardConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = DashboardConfig::from_toml_str(
            "gender_policy = \"permissive\"\nexport_results = true\n",
        )
        .unwrap();
        assert_eq!(config.gender_policy, GenderPolicy::Permissive);
        assert!(config.export_results);
        assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = DashboardConfig::from_toml_str("modle_path = \"x\"").unwrap_err();
        assert!(matches!(err, DiabetesError::Config(_)));
    }

    #[test]
    fn test_zero_upload_limit_rejected() {
        assert!(DashboardConfig::from_toml_str("max_upload_bytes = 0").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = DashboardConfig::load(Some(Path::new("no/such/config.toml"))).unwrap_err();
        assert!(matches!(err, DiabetesError::Config(_)));
        assert_eq!(DashboardConfig::load(None).unwrap(), DashboardConfig::default());
    }
}
