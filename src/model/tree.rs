//! CART decision tree for binary classification (Gini impurity).

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::Dataset;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    /// Candidate features drawn per split.
    pub max_features: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_features: usize::MAX,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        /// Fraction of positive samples that reached this leaf.
        p_up: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// A fitted classification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Node,
}

impl DecisionTree {
    /// Fit on the samples named by `indices` (duplicates allowed, which is
    /// how bootstrap weights are expressed).
    pub fn fit(data: &Dataset, indices: Vec<usize>, params: &TreeParams, rng: &mut ChaCha8Rng) -> Self {
        let root = grow(data, indices, 0, params, rng);
        Self { root }
    }

    /// Probability that the sample belongs to the positive class.
    pub fn predict_proba(&self, sample: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { p_up, .. } => return *p_up,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }

    pub fn n_leaves(&self) -> usize {
        fn leaves_of(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => leaves_of(left) + leaves_of(right),
            }
        }
        leaves_of(&self.root)
    }

    /// Samples that reached leaves; equals the training sample count.
    pub fn n_samples(&self) -> usize {
        fn samples_of(node: &Node) -> usize {
            match node {
                Node::Leaf { n_samples, .. } => *n_samples,
                Node::Split { left, right, .. } => samples_of(left) + samples_of(right),
            }
        }
        samples_of(&self.root)
    }
}

fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

fn grow(
    data: &Dataset,
    indices: Vec<usize>,
    depth: usize,
    params: &TreeParams,
    rng: &mut ChaCha8Rng,
) -> Node {
    let n = indices.len();
    let positives = indices.iter().filter(|&&i| data.labels[i]).count();
    let leaf = Node::Leaf {
        p_up: if n == 0 { 0.5 } else { positives as f64 / n as f64 },
        n_samples: n,
    };

    let pure = positives == 0 || positives == n;
    let too_deep = params.max_depth.is_some_and(|max| depth >= max);
    if pure || too_deep || n < params.min_samples_split.max(2) {
        return leaf;
    }

    let Some(split) = best_split(data, &indices, positives, params, rng) else {
        return leaf;
    };

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| data.features[i][split.feature] <= split.threshold);

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(grow(data, left, depth + 1, params, rng)),
        right: Box::new(grow(data, right, depth + 1, params, rng)),
    }
}

/// Draw features in random order and keep the lowest weighted impurity.
///
/// At least `max_features` features are evaluated; if none of them admits a
/// split the search continues through the remaining ones.
fn best_split(
    data: &Dataset,
    indices: &[usize],
    positives: usize,
    params: &TreeParams,
    rng: &mut ChaCha8Rng,
) -> Option<SplitCandidate> {
    let mut features: Vec<usize> = (0..data.n_features()).collect();
    features.shuffle(rng);

    let mut best: Option<SplitCandidate> = None;
    for (visited, &feature) in features.iter().enumerate() {
        if visited >= params.max_features.max(1) && best.is_some() {
            break;
        }
        let Some(candidate) = best_threshold(data, indices, feature, positives, params) else {
            continue;
        };
        if best.map_or(true, |b| candidate.impurity < b.impurity) {
            best = Some(candidate);
        }
    }
    best
}

fn best_threshold(
    data: &Dataset,
    indices: &[usize],
    feature: usize,
    positives: usize,
    params: &TreeParams,
) -> Option<SplitCandidate> {
    let mut column: Vec<(f64, bool)> = indices
        .iter()
        .map(|&i| (data.features[i][feature], data.labels[i]))
        .collect();
    column.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = column.len();
    if n < 2 {
        return None;
    }
    let min_leaf = params.min_samples_leaf.max(1);
    let mut best: Option<SplitCandidate> = None;
    let mut left_pos = 0;

    for i in 0..n - 1 {
        if column[i].1 {
            left_pos += 1;
        }
        let (value, next) = (column[i].0, column[i + 1].0);
        if value >= next {
            continue;
        }
        let left_n = i + 1;
        let right_n = n - left_n;
        if left_n < min_leaf || right_n < min_leaf {
            continue;
        }

        let impurity = (left_n as f64 * gini(left_pos, left_n)
            + right_n as f64 * gini(positives - left_pos, right_n))
            / n as f64;

        if best.map_or(true, |b| impurity < b.impurity) {
            let mut threshold = value + (next - value) / 2.0;
            // Adjacent floats can round the midpoint up onto `next`.
            if threshold >= next {
                threshold = value;
            }
            best = Some(SplitCandidate {
                feature,
                threshold,
                impurity,
            });
        }
    }
    best
}
