//! Regression tree used as the forest's base learner

use crate::error::{Result, TofError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node. Children are indices into the tree's node table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
        impurity: f64,
    },
}

/// Split quality criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Variance reduction
    SquaredError,
    /// Variance reduction with Friedman's improvement score
    FriedmanMse,
}

impl Criterion {
    pub fn name(&self) -> &'static str {
        match self {
            Criterion::SquaredError => "squared_error",
            Criterion::FriedmanMse => "friedman_mse",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "squared_error" => Some(Criterion::SquaredError),
            "friedman_mse" => Some(Criterion::FriedmanMse),
            _ => None,
        }
    }

    /// Score a candidate split from left/right sums; larger is better
    fn proxy_improvement(&self, n_left: f64, sum_left: f64, n_right: f64, sum_right: f64) -> f64 {
        match self {
            Criterion::SquaredError => sum_left * sum_left / n_left + sum_right * sum_right / n_right,
            Criterion::FriedmanMse => {
                let diff = n_right * sum_left - n_left * sum_right;
                diff * diff / (n_left * n_right)
            }
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    proxy: f64,
    sse_decrease: f64,
}

/// Decision tree regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    /// Node table; the root is at index 0
    nodes: Vec<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at each split (all when `None`)
    pub max_features: Option<usize>,
    /// Split criterion
    pub criterion: Criterion,
    /// Seed for feature subsampling
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    /// Create a new regressor tree
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::SquaredError,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set number of features drawn per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(TofError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(TofError::TrainingError(format!(
                "cannot fit a tree on {} samples x {} features",
                n_samples, n_features
            )));
        }

        self.n_features = n_features;

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut nodes = Vec::new();
        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.build_tree(x, y, indices, 0, &mut rng, &mut nodes, &mut importances);
        self.nodes = nodes;

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
        nodes: &mut Vec<TreeNode>,
        importances: &mut [f64],
    ) -> usize {
        let n_samples = indices.len();
        let n = n_samples as f64;
        let (sum, sq_sum) = indices
            .iter()
            .fold((0.0, 0.0), |(s, q), &i| (s + y[i], q + y[i] * y[i]));
        let mean = sum / n;
        let impurity = (sq_sum / n - mean * mean).max(0.0);

        let node_id = nodes.len();
        nodes.push(TreeNode::Leaf { value: mean, n_samples });

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure(y, &indices);

        if should_stop {
            return node_id;
        }

        let Some(best) = self.find_best_split(x, y, &indices, sum, sq_sum, rng) else {
            return node_id;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature]] <= best.threshold);

        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf {
            return node_id;
        }

        importances[best.feature] += best.sse_decrease;

        let left = self.build_tree(x, y, left_indices, depth + 1, rng, nodes, importances);
        let right = self.build_tree(x, y, right_indices, depth + 1, rng, nodes, importances);

        nodes[node_id] = TreeNode::Split {
            feature_idx: best.feature,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        };
        node_id
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        total_sum: f64,
        total_sq_sum: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let n_features = x.ncols();
        let n_draw = self.max_features.unwrap_or(n_features).clamp(1, n_features);
        let features: Vec<usize> = if n_draw < n_features {
            let mut drawn = index::sample(rng, n_features, n_draw).into_vec();
            drawn.sort_unstable();
            drawn
        } else {
            (0..n_features).collect()
        };

        let n_samples = indices.len();
        let parent_sse = total_sq_sum - total_sum * total_sum / n_samples as f64;
        let min_leaf = self.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n_samples);

        for feature in features {
            pairs.clear();
            pairs.extend(indices.iter().map(|&i| (x[[i, feature]], y[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            let mut left_sq_sum = 0.0;

            for pos in 0..n_samples - 1 {
                let (value, yi) = pairs[pos];
                left_sum += yi;
                left_sq_sum += yi * yi;

                let n_left = pos + 1;
                let n_right = n_samples - n_left;
                if n_left < min_leaf {
                    continue;
                }
                if n_right < min_leaf {
                    break;
                }

                let next = pairs[pos + 1].0;
                // Equal values cannot be separated by a threshold
                if next <= value {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let (nl, nr) = (n_left as f64, n_right as f64);
                let proxy = self.criterion.proxy_improvement(nl, left_sum, nr, right_sum);

                if best.as_ref().map_or(true, |b| proxy > b.proxy) {
                    let right_sq_sum = total_sq_sum - left_sq_sum;
                    let child_sse = (left_sq_sum - left_sum * left_sum / nl)
                        + (right_sq_sum - right_sum * right_sum / nr);
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        proxy,
                        sse_decrease: parent_sse - child_sse,
                    });
                }
            }
        }

        best.filter(|b| b.sse_decrease > 0.0 && b.proxy > 0.0)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.nodes.is_empty() {
            return Err(TofError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(TofError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }

    fn predict_row(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Node table, root first
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        if self.nodes.is_empty() {
            0
        } else {
            self.node_depth(0)
        }
    }

    fn node_depth(&self, node: usize) -> usize {
        match &self.nodes[node] {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + self.node_depth(*left).max(self.node_depth(*right)),
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }
}

fn is_pure(y: &Array1<f64>, indices: &[usize]) -> bool {
    match indices.first() {
        None => true,
        Some(&first) => indices.iter().all(|&i| (y[i] - y[first]).abs() < 1e-10),
    }
}
