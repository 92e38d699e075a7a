//! Random forest classifier.
//!
//! Bagged CART trees with per-split feature subsampling. Each tree draws
//! its bootstrap sample and feature order from its own seeded RNG, so the
//! fitted forest is identical however rayon schedules the work.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{DecisionTree, TreeParams};
use super::{Classifier, Dataset, ModelError};

/// Random forest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    /// `None` grows every tree until its leaves are pure.
    pub max_depth: Option<usize>,
    /// Features considered per split; `None` means `floor(sqrt(n_features))`.
    pub max_features: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            max_features: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            seed: 0,
        }
    }
}

/// A fitted forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    oob_score: Option<f64>,
}

impl RandomForest {
    /// Fit a forest on `data`.
    pub fn fit(config: &ForestConfig, data: &Dataset) -> Result<Self, ModelError> {
        let n_samples = data.n_samples();
        if n_samples == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if config.n_trees == 0 {
            return Err(ModelError::InvalidConfig("n_trees must be positive".into()));
        }
        let n_features = data.n_features();

        let params = TreeParams {
            max_depth: config.max_depth,
            max_features: config
                .max_features
                .unwrap_or_else(|| ((n_features as f64).sqrt() as usize).max(1)),
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
        };

        let fitted: Vec<(DecisionTree, Vec<bool>)> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let indices: Vec<usize> = if config.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let mut in_bag = vec![false; n_samples];
                for &idx in &indices {
                    in_bag[idx] = true;
                }
                (DecisionTree::fit(data, indices, &params, &mut rng), in_bag)
            })
            .collect();

        let oob_score = if config.bootstrap {
            out_of_bag_accuracy(&fitted, data)
        } else {
            None
        };
        let trees: Vec<DecisionTree> = fitted.into_iter().map(|(tree, _)| tree).collect();

        debug!(
            trees = trees.len(),
            samples = n_samples,
            max_features = params.max_features,
            oob = ?oob_score,
            "Forest fitted"
        );

        Ok(Self {
            trees,
            n_features,
            oob_score,
        })
    }

    /// Mean positive-class probability across trees.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<f64, ModelError> {
        if sample.len() != self.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let total: f64 = self.trees.iter().map(|t| t.predict_proba(sample)).sum();
        Ok(total / self.trees.len() as f64)
    }

    /// Accuracy on samples left out of each tree's bootstrap, if any were.
    pub fn oob_score(&self) -> Option<f64> {
        self.oob_score
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn out_of_bag_accuracy(fitted: &[(DecisionTree, Vec<bool>)], data: &Dataset) -> Option<f64> {
    let mut correct = 0usize;
    let mut scored = 0usize;

    for (i, sample) in data.features.iter().enumerate() {
        let votes: Vec<f64> = fitted
            .iter()
            .filter(|(_, in_bag)| !in_bag[i])
            .map(|(tree, _)| tree.predict_proba(sample))
            .collect();
        if votes.is_empty() {
            continue;
        }
        let p_up = votes.iter().sum::<f64>() / votes.len() as f64;
        if (p_up > 0.5) == data.labels[i] {
            correct += 1;
        }
        scored += 1;
    }

    (scored > 0).then(|| correct as f64 / scored as f64)
}

/// [`Classifier`] backed by a freshly fitted [`RandomForest`] per call.
#[derive(Debug, Clone, Default)]
pub struct ForestClassifier {
    config: ForestConfig,
}

impl ForestClassifier {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }
}

impl Classifier for ForestClassifier {
    fn fit_predict(&self, train: &Dataset, sample: &[f64]) -> Result<f64, ModelError> {
        let forest = RandomForest::fit(&self.config, train)?;
        forest.predict_proba(sample)
    }

    fn name(&self) -> &str {
        "random-forest"
    }
}
