//! Confidence-threshold decision gate.
//!
//! Fits the classifier on every labeled row before the most recent one,
//! scores the most recent (unlabeled) row and only emits a direction when
//! the winning class probability clears the threshold.

use tracing::{debug, info, warn};

use crate::features::{FeatureRow, FEATURE_NAMES};
use crate::model::{Classifier, Dataset};
use crate::types::Decision;

/// Default probability a class must exceed to trade.
pub const DEFAULT_THRESHOLD: f64 = 0.76;

/// Fewest labeled rows the classifier is trained on.
pub const MIN_TRAINING_ROWS: usize = 2;

pub struct DecisionGate {
    classifier: Box<dyn Classifier>,
    threshold: f64,
}

impl DecisionGate {
    pub fn new(classifier: Box<dyn Classifier>, threshold: f64) -> Self {
        Self {
            classifier,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Decide on the last row of `rows`.
    ///
    /// The last row must be unlabeled (its outcome is the one being
    /// predicted). It is never part of the training set.
    pub fn decide(&self, rows: &[FeatureRow]) -> Decision {
        let Some((latest, history)) = rows.split_last() else {
            return Decision::none(0.0);
        };
        if latest.is_labeled() {
            debug!(timestamp = %latest.timestamp, "Latest row already labeled — nothing to predict");
            return Decision::none(0.0);
        }

        let mut train = Dataset::default();
        for row in history {
            if let Some(label) = row.label {
                train.push(row.features().to_vec(), label);
            }
        }

        if train.n_samples() < MIN_TRAINING_ROWS {
            debug!(rows = train.n_samples(), "Not enough labeled rows to train");
            return Decision::none(0.0);
        }
        let positives = train.positives();
        if positives == 0 || positives == train.n_samples() {
            debug!(
                rows = train.n_samples(),
                positives,
                "Training labels are single-class — abstaining"
            );
            return Decision::none(0.0);
        }

        let sample = latest.features();
        debug!(
            timestamp = %latest.timestamp,
            features = ?FEATURE_NAMES.iter().zip(sample).collect::<Vec<_>>(),
            "Scoring latest candle"
        );
        let p_call = match self.classifier.fit_predict(&train, &sample) {
            Ok(p) => p.clamp(0.0, 1.0),
            Err(e) => {
                warn!(model = self.classifier.name(), error = %e, "Classifier failed");
                return Decision::none(0.0);
            }
        };

        let decision = apply_threshold(p_call, self.threshold);
        match decision.action {
            Some(_) => info!(
                model = self.classifier.name(),
                train_rows = train.n_samples(),
                "=== PREDICTED: {decision}"
            ),
            None => info!(
                confidence = format!("{:.2}%", decision.confidence * 100.0),
                "Confidence too low — skipping trade"
            ),
        }
        decision
    }
}

/// Map an up-move probability onto a decision.
///
/// Comparisons are strict, so a probability exactly at the threshold
/// abstains.
pub fn apply_threshold(p_call: f64, threshold: f64) -> Decision {
    let p_put = 1.0 - p_call;
    if p_call > threshold {
        Decision::call(p_call)
    } else if p_put > threshold {
        Decision::put(p_put)
    } else {
        Decision::none(p_call.max(p_put))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
