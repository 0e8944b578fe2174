//! Shot-outcome classifiers and the trained-model artifact.
//!
//! Candidate models implement [`Classifier`] over the fixed six-feature
//! vector. The winner of a training run is persisted as a versioned JSON
//! [`ModelArtifact`] together with its Platt calibration and holdout
//! metrics, and reloaded by the scoring stage.

pub mod calibration;
pub mod logistic;
pub mod metrics;
pub mod tree;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::FEATURE_COLUMNS;
use crate::error::{PipelineError, Result};

pub use calibration::{fit_platt, CalibrationFit, CalibrationMetrics, PlattScaling};
pub use logistic::LogisticRegression;
pub use metrics::{
    classification_report, log_loss, threshold_predictions, ClassificationReport,
    EVAL_PROBABILITY_THRESHOLD,
};
pub use tree::DecisionTree;

pub const FEATURE_COUNT: usize = FEATURE_COLUMNS.len();

/// One row of model input, ordered like [`FEATURE_COLUMNS`].
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Artifact schema revision; bump when the serialized layout changes.
pub const ARTIFACT_VERSION: u32 = 1;

pub const CANDIDATE_LOGISTIC: &str = "logistic_regression";
pub const CANDIDATE_TREE: &str = "decision_tree";

pub trait Classifier {
    /// Train in place on feature rows and 0/1 labels of equal length.
    fn fit(&mut self, features: &[FeatureVector], labels: &[f64]);

    /// Raw positive-class probability for one row.
    fn predict_proba(&self, features: &FeatureVector) -> f64;

    /// Class decision at the 0.5 evaluation cutoff.
    fn predict(&self, features: &FeatureVector) -> i64 {
        i64::from(self.predict_proba(features) >= EVAL_PROBABILITY_THRESHOLD)
    }
}

/// Hyperparameters for one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Seeds the internal calibration split of the training snapshot.
    pub seed: u64,
    /// Fraction of the training rows held aside to fit Platt scaling.
    pub calibration_ratio: f64,
    pub logistic_max_iters: usize,
    pub logistic_learning_rate: f64,
    pub logistic_l2: f64,
    pub tree_max_depth: usize,
    pub tree_min_samples_leaf: usize,
    pub calibration_max_iters: usize,
    pub calibration_learning_rate: f64,
    pub calibration_l2: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            seed: crate::data::split::SPLIT_SEED,
            calibration_ratio: 0.2,
            logistic_max_iters: 300,
            logistic_learning_rate: 0.3,
            logistic_l2: 1e-4,
            tree_max_depth: 8,
            tree_min_samples_leaf: 5,
            calibration_max_iters: 500,
            calibration_learning_rate: 0.05,
            calibration_l2: 1e-4,
        }
    }
}

/// Serializable union of the candidate classifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelKind {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression(_) => CANDIDATE_LOGISTIC,
            ModelKind::DecisionTree(_) => CANDIDATE_TREE,
        }
    }
}

impl Classifier for ModelKind {
    fn fit(&mut self, features: &[FeatureVector], labels: &[f64]) {
        match self {
            ModelKind::LogisticRegression(model) => model.fit(features, labels),
            ModelKind::DecisionTree(model) => model.fit(features, labels),
        }
    }

    fn predict_proba(&self, features: &FeatureVector) -> f64 {
        match self {
            ModelKind::LogisticRegression(model) => model.predict_proba(features),
            ModelKind::DecisionTree(model) => model.predict_proba(features),
        }
    }
}

/// Untrained candidates in fixed evaluation order. When holdout scores
/// tie, selection keeps the earlier entry of this list.
pub fn candidates(config: &TrainConfig) -> Vec<ModelKind> {
    vec![
        ModelKind::LogisticRegression(LogisticRegression::new(
            config.logistic_max_iters,
            config.logistic_learning_rate,
            config.logistic_l2,
        )),
        ModelKind::DecisionTree(DecisionTree::new(
            config.tree_max_depth,
            config.tree_min_samples_leaf,
        )),
    ]
}

/// The winning model as written to and read back from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub trained_at: String,
    pub model_name: String,
    pub feature_names: Vec<String>,
    pub model: ModelKind,
    pub calibration: Option<PlattScaling>,
    pub holdout_log_loss: f64,
    pub holdout_f1: f64,
}

impl ModelArtifact {
    pub fn new(
        model: ModelKind,
        calibration: Option<PlattScaling>,
        holdout_log_loss: f64,
        holdout_f1: f64,
    ) -> Self {
        ModelArtifact {
            version: ARTIFACT_VERSION,
            trained_at: chrono::Utc::now().to_rfc3339(),
            model_name: model.name().to_string(),
            feature_names: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            model,
            calibration,
            holdout_log_loss,
            holdout_f1,
        }
    }

    /// Calibrated positive-class probability for one row.
    pub fn predict_proba(&self, features: &FeatureVector) -> f64 {
        let raw = self.model.predict_proba(features);
        match self.calibration {
            Some(scaling) => scaling.apply(raw),
            None => raw,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<()> {
        if self.version != ARTIFACT_VERSION {
            return Err(PipelineError::InvalidArtifact(format!(
                "unsupported artifact version {} (expected {})",
                self.version, ARTIFACT_VERSION
            )));
        }
        let matches = self.feature_names.len() == FEATURE_COLUMNS.len()
            && self
                .feature_names
                .iter()
                .zip(FEATURE_COLUMNS.iter())
                .all(|(a, b)| a.as_str() == *b);
        if !matches {
            return Err(PipelineError::InvalidArtifact(format!(
                "feature set {:?} does not match the scoring contract {:?}",
                self.feature_names, FEATURE_COLUMNS
            )));
        }
        Ok(())
    }
}
