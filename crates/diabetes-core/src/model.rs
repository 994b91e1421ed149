//! Model Artifact
//!
//! The pre-trained binary classifier, deserialized from JSON. Two artifact
//! kinds are understood:
//!
//! - `random_forest`: an ensemble of flat decision trees; the positive-class
//!   probability is the mean of each tree's normalized leaf distribution
//! - `logistic_regression`: optional standardization followed by a linear
//!   model and the logistic function
//!
//! Both expose `predict` and `predict_proba` through [`Classifier`]. The
//! artifact is loaded once per process via [`shared`] and never mutated.

use crate::schema::{canonical_names, FEATURE_COUNT};
use crate::{DiabetesError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Model input: one value per feature, in schema order
pub type FeatureRow = [f64; FEATURE_COUNT];

/// Positive-class probability at or above which the label is Diabetes
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Batched binary inference
pub trait Classifier {
    /// Class probabilities `[p(non-diabetic), p(diabetic)]` per row
    fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<[f64; 2]>>;

    /// Class label per row (1 = diabetic)
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(rows)?
            .iter()
            .map(|p| u8::from(p[1] >= DECISION_THRESHOLD))
            .collect())
    }
}

/// One node of a flattened decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// `row[feature] <= threshold` descends left, otherwise right
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class weights (counts or fractions) for classes 0 and 1
    Leaf { value: [f64; 2] },
}

/// A single decision tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn validate(&self, tree_idx: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err(format!("tree {} has no nodes", tree_idx));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(format!(
                            "tree {} node {} splits on unknown feature {}",
                            tree_idx, idx, feature
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("tree {} node {} has a non-finite threshold", tree_idx, idx));
                    }
                    // Children always follow their parent, which rules out cycles
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return Err(format!(
                                "tree {} node {} has invalid child index {}",
                                tree_idx, idx, child
                            ));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    let total: f64 = value.iter().sum();
                    if value.iter().any(|v| !v.is_finite() || *v < 0.0) || total <= 0.0 {
                        return Err(format!("tree {} leaf {} has invalid class weights", tree_idx, idx));
                    }
                }
            }
        }
        Ok(())
    }

    /// Normalized class distribution of the leaf `row` falls into
    fn leaf_distribution(&self, row: &FeatureRow) -> [f64; 2] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { value } => {
                    let total = value[0] + value[1];
                    return [value[0] / total, value[1] / total];
                }
            }
        }
    }
}

/// Random forest classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub feature_names: Vec<String>,
    pub trees: Vec<DecisionTree>,
}

impl Classifier for RandomForest {
    fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<[f64; 2]>> {
        let n_trees = self.trees.len() as f64;
        Ok(rows
            .iter()
            .map(|row| {
                let mut sum = [0.0, 0.0];
                for tree in &self.trees {
                    let dist = tree.leaf_distribution(row);
                    sum[0] += dist[0];
                    sum[1] += dist[1];
                }
                [sum[0] / n_trees, sum[1] / n_trees]
            })
            .collect())
    }
}

/// Logistic regression classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler_mean: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler_scale: Option<Vec<f64>>,
}

impl LogisticRegression {
    fn validate(&self) -> std::result::Result<(), String> {
        let vectors = [
            ("coefficients", Some(&self.coefficients)),
            ("scaler_mean", self.scaler_mean.as_ref()),
            ("scaler_scale", self.scaler_scale.as_ref()),
        ];
        for (name, vector) in vectors {
            if let Some(v) = vector {
                if v.len() != FEATURE_COUNT {
                    return Err(format!("{} has {} entries, expected {}", name, v.len(), FEATURE_COUNT));
                }
                if v.iter().any(|x| !x.is_finite()) {
                    return Err(format!("{} contains non-finite values", name));
                }
            }
        }
        if self.scaler_scale.iter().flatten().any(|s| *s == 0.0) {
            return Err("scaler_scale contains zero".to_string());
        }
        if !self.intercept.is_finite() {
            return Err("intercept is not finite".to_string());
        }
        Ok(())
    }

    fn positive_probability(&self, row: &FeatureRow) -> f64 {
        let logit = self.intercept
            + row
                .iter()
                .enumerate()
                .map(|(i, x)| {
                    let mean = self.scaler_mean.as_ref().map_or(0.0, |m| m[i]);
                    let scale = self.scaler_scale.as_ref().map_or(1.0, |s| s[i]);
                    self.coefficients[i] * (x - mean) / scale
                })
                .sum::<f64>();
        1.0 / (1.0 + (-logit).exp())
    }
}

impl Classifier for LogisticRegression {
    fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<[f64; 2]>> {
        Ok(rows
            .iter()
            .map(|row| {
                let p = self.positive_probability(row);
                [1.0 - p, p]
            })
            .collect())
    }
}

/// A deserialized classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    RandomForest(RandomForest),
    LogisticRegression(LogisticRegression),
}

/// Short description of a loaded artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub kind: String,
    pub features: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trees: Option<usize>,
}

impl ModelArtifact {
    /// Read and validate an artifact file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DiabetesError::ArtifactNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        let model = Self::from_json(&text)?;
        info!(path = %path.display(), kind = %model.summary().kind, "loaded model artifact");
        Ok(model)
    }

    /// Parse and validate an artifact from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let model: ModelArtifact =
            serde_json::from_str(text).map_err(|e| DiabetesError::ArtifactInvalid(e.to_string()))?;
        model.validate().map_err(DiabetesError::ArtifactInvalid)?;
        Ok(model)
    }

    pub fn feature_names(&self) -> &[String] {
        match self {
            ModelArtifact::RandomForest(m) => &m.feature_names,
            ModelArtifact::LogisticRegression(m) => &m.feature_names,
        }
    }

    /// Structural checks; there is no versioning or integrity check
    pub fn validate(&self) -> std::result::Result<(), String> {
        let expected = canonical_names();
        if self.feature_names() != expected.as_slice() {
            return Err(format!(
                "feature_names {:?} do not match schema {:?}",
                self.feature_names(),
                expected
            ));
        }
        match self {
            ModelArtifact::RandomForest(forest) => {
                if forest.trees.is_empty() {
                    return Err("random forest has no trees".to_string());
                }
                forest
                    .trees
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, tree)| tree.validate(i))
            }
            ModelArtifact::LogisticRegression(model) => model.validate(),
        }
    }

    pub fn summary(&self) -> ModelSummary {
        match self {
            ModelArtifact::RandomForest(m) => ModelSummary {
                kind: "random_forest".to_string(),
                features: m.feature_names.len(),
                trees: Some(m.trees.len()),
            },
            ModelArtifact::LogisticRegression(m) => ModelSummary {
                kind: "logistic_regression".to_string(),
                features: m.feature_names.len(),
                trees: None,
            },
        }
    }
}

impl Classifier for ModelArtifact {
    fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<[f64; 2]>> {
        match self {
            ModelArtifact::RandomForest(m) => m.predict_proba(rows),
            ModelArtifact::LogisticRegression(m) => m.predict_proba(rows),
        }
    }
}

static SHARED_MODEL: OnceLock<(PathBuf, Arc<ModelArtifact>)> = OnceLock::new();

/// Process-wide artifact handle, loaded on first use
///
/// Later calls return the already loaded artifact; there is no reload.
pub fn shared(path: impl AsRef<Path>) -> Result<Arc<ModelArtifact>> {
    let path = path.as_ref();
    if let Some((loaded_from, model)) = SHARED_MODEL.get() {
        if loaded_from != path {
            warn!(
                requested = %path.display(),
                loaded = %loaded_from.display(),
                "model artifact already loaded from a different path"
            );
        }
        return Ok(Arc::clone(model));
    }
    let model = Arc::new(ModelArtifact::load(path)?);
    let (_, model) = SHARED_MODEL.get_or_init(|| (path.to_path_buf(), model));
    Ok(Arc::clone(model))
}
