//! Probabilistic classifiers used by the decision gate.
//!
//! Defines the `Classifier` trait and a random forest implementation.

pub mod forest;
pub mod tree;

use serde::{Deserialize, Serialize};

/// Training matrix with binary labels (`true` = positive class).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<bool>,
}

impl Dataset {
    pub fn push(&mut self, features: Vec<f64>, label: bool) {
        self.features.push(features);
        self.labels.push(label);
    }

    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),
}

/// Abstraction over binary probabilistic classifiers.
///
/// Implementations must be deterministic: the same training set and sample
/// always yield the same probability.
pub trait Classifier: Send + Sync {
    /// Fit on `train` and return the positive-class probability of `sample`.
    fn fit_predict(&self, train: &Dataset, sample: &[f64]) -> Result<f64, ModelError>;

    /// Model identifier for logging.
    fn name(&self) -> &str;
}
