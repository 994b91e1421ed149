use diabetes_core::{DashboardConfig, ModelArtifact, RecordNormalizer};
use std::sync::Arc;

/// Shared across all requests; immutable after startup
pub struct AppState {
    pub model: Arc<ModelArtifact>,
    pub config: DashboardConfig,
    pub normalizer: RecordNormalizer,
}

impl AppState {
    pub fn new(model: Arc<ModelArtifact>, config: DashboardConfig) -> Self {
        let normalizer = RecordNormalizer::new(config.gender_policy);
        AppState {
            model,
            config,
            normalizer,
        }
    }
}
