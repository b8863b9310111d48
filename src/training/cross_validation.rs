//! Cross-validation splitters

use crate::error::{Result, TofError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Produces the folds a candidate is evaluated on
pub trait Splitter: Send + Sync {
    /// Generate train/test index splits for `n_samples` rows
    fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>>;

    /// Number of folds produced
    fn n_splits(&self) -> usize;
}

/// K-Fold cross-validation.
///
/// Without shuffling, fold membership depends only on row order: the first
/// `n % k` folds get one extra sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: Option<u64>,
}

impl Default for KFold {
    fn default() -> Self {
        Self::new(5)
    }
}

impl KFold {
    /// Ordered, non-shuffled folds
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    /// Shuffle rows with a seeded generator before assigning folds
    pub fn shuffled(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            shuffle: true,
            random_state: Some(seed),
        }
    }

    fn fold_sizes(&self, n_samples: usize) -> Vec<usize> {
        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;
        (0..self.n_splits)
            .map(|i| if i < remainder { base + 1 } else { base })
            .collect()
    }
}

impl Splitter for KFold {
    fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        if self.n_splits < 2 {
            return Err(TofError::ConfigError(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        if n_samples < self.n_splits {
            return Err(TofError::ConfigError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, self.n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
            indices.shuffle(&mut rng);
        }

        let mut splits = Vec::with_capacity(self.n_splits);
        let mut current = 0;

        for (fold_idx, fold_size) in self.fold_sizes(n_samples).into_iter().enumerate() {
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });

            current += fold_size;
        }

        Ok(splits)
    }

    fn n_splits(&self) -> usize {
        self.n_splits
    }
}
