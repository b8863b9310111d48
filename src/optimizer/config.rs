//! Search configuration

use crate::training::Scoring;
use serde::{Deserialize, Serialize};

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizeDirection {
    Minimize,
    Maximize,
}

impl OptimizeDirection {
    /// Whether `a` is strictly better than `b`
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self {
            OptimizeDirection::Minimize => a < b,
            OptimizeDirection::Maximize => a > b,
        }
    }
}

/// Configuration for a randomized cross-validated search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of parameter settings that are sampled
    pub n_iter: usize,

    /// Number of worker threads; 0 uses every core
    pub n_jobs: usize,

    /// Rule used to score held-out folds
    pub scoring: Scoring,

    /// Seed for the parameter draw
    pub random_state: u64,

    /// Also score the training part of each fold
    pub return_train_score: bool,

    /// Refit the best configuration on the whole training set
    pub refit: bool,

    /// 0 = quiet, 1 = summary, 2 = one line per fit
    pub verbose: u8,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_iter: 100,
            n_jobs: 1,
            scoring: Scoring::NegMeanAbsoluteError,
            random_state: 17,
            return_train_score: false,
            refit: true,
            verbose: 1,
        }
    }
}

impl SearchConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of sampled settings
    pub fn with_n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    /// Builder method to set parallelism
    pub fn with_n_jobs(mut self, n: usize) -> Self {
        self.n_jobs = n;
        self
    }

    /// Builder method to set the scoring rule
    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    /// Builder method to set the seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to record training scores
    pub fn with_train_score(mut self, keep: bool) -> Self {
        self.return_train_score = keep;
        self
    }

    /// Builder method to toggle the final refit
    pub fn with_refit(mut self, refit: bool) -> Self {
        self.refit = refit;
        self
    }

    /// Builder method to set verbosity
    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }
}
