//! Run configuration
//!
//! Defaults reproduce the production steady-state run: both `op` and `rc`
//! variants, a 10% hold-out, 10 ordered folds and 5000 sampled forests.

use crate::cache::{ArtifactKeys, CachePolicy};
use crate::error::{Result, TofError};
use crate::optimizer::{ParameterValue, SearchConfig, SearchSpace};
use crate::preprocessing::{RowFilter, SplitConfig, TargetEncoding};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Seed shared by the partitioner, the sampler and the forest
pub const DEFAULT_SEED: u64 = 17;

/// Everything needed to run the search for a set of variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Variant tags, e.g. `op` and `rc`
    pub tags: Vec<String>,
    /// Directory holding `ml_data_<tag>_steady.csv`
    pub data_dir: PathBuf,
    /// Root of the per-variant result directories
    pub save_dir: PathBuf,
    /// Raw target column
    pub target: String,
    /// Name of the encoded target column
    pub encoded_target: String,
    /// Columns that are neither features nor targets
    pub non_features: Vec<String>,
    pub filter: RowFilter,
    pub encoding: TargetEncoding,
    pub split: SplitConfig,
    pub search: SearchConfig,
    /// Number of ordered, non-shuffled folds
    pub cv_folds: usize,
    pub space: SearchSpace,
    pub cache: CachePolicy,
    /// Continue with the next variant when one fails
    pub keep_going: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tags: vec!["op".to_string(), "rc".to_string()],
            data_dir: PathBuf::from("..").join("training-data"),
            save_dir: PathBuf::from("..").join("grid-search-results"),
            target: "loop-tof".to_string(),
            encoded_target: "log-loop-tof".to_string(),
            non_features: vec!["steady-state-condition".to_string()],
            filter: RowFilter::steady_state("loop-tof"),
            encoding: TargetEncoding::LogAbs,
            split: SplitConfig::new(0.10, DEFAULT_SEED),
            search: SearchConfig::new()
                .with_n_iter(5000)
                .with_n_jobs(128)
                .with_train_score(true)
                .with_random_state(DEFAULT_SEED),
            cv_folds: 10,
            space: forest_space(),
            cache: CachePolicy::default(),
            keep_going: false,
        }
    }
}

/// Random-forest space used by the steady-state run.
///
/// `n_estimators` follows a shifted discrete uniform, so draws land in
/// `[200, 1600)`.
pub fn forest_space() -> SearchSpace {
    SearchSpace::new()
        .randint("n_estimators", 200, 1600)
        .choice("criterion", vec!["squared_error", "friedman_mse"])
        .int_range("max_depth", 1, 50)
        .int_range("min_samples_split", 2, 20)
        .int_range("min_samples_leaf", 1, 20)
        .choice_values(
            "max_features",
            vec!["sqrt".into(), "log2".into(), ParameterValue::None],
        )
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config; absent fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| TofError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| {
            TofError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Use one seed for the split, the parameter draw and the estimator
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.split.random_state = seed;
        self.search.random_state = seed;
        self
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.search.n_iter = n_iter;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.search.n_jobs = n_jobs;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_space(mut self, space: SearchSpace) -> Self {
        self.space = space;
        self
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// The seed threaded through every random component
    pub fn seed(&self) -> u64 {
        self.search.random_state
    }

    /// `ml_data_<tag>_steady.csv`
    pub fn data_file(&self, tag: &str) -> String {
        format!("ml_data_{}_steady.csv", tag)
    }

    /// `<save_dir>/<tag>_steady`
    pub fn results_dir(&self, tag: &str) -> PathBuf {
        self.save_dir.join(format!("{}_steady", tag))
    }

    /// Reject configurations that would fail mid-run
    pub fn validate(&self) -> Result<()> {
        if self.tags.is_empty() {
            return Err(TofError::ConfigError("no variant tags given".to_string()));
        }
        for tag in &self.tags {
            if tag.is_empty() || ArtifactKeys::for_tag(tag).validate().is_err() {
                return Err(TofError::ConfigError(format!(
                    "tag '{}' cannot name a result artifact; tags must be plain file name parts",
                    tag
                )));
            }
        }
        if self.target.is_empty() || self.encoded_target.is_empty() {
            return Err(TofError::ConfigError("target names must not be empty".to_string()));
        }
        if !(self.split.test_size > 0.0 && self.split.test_size < 1.0) {
            return Err(TofError::ConfigError(format!(
                "test_size must lie strictly between 0 and 1, got {}",
                self.split.test_size
            )));
        }
        if self.cv_folds < 2 {
            return Err(TofError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.search.n_iter == 0 {
            return Err(TofError::ConfigError("n_iter must be at least 1".to_string()));
        }
        if self.cache.save_best && !self.search.refit {
            return Err(TofError::ConfigError(
                "save_best needs refit enabled to have a best estimator".to_string(),
            ));
        }
        self.filter.validate()?;
        self.space.validate()
    }
}
