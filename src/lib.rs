//! tof-search - Cached randomized hyperparameter search
//!
//! Fits random-forest regressors to the log-magnitude of steady-state loop
//! turnover frequencies. Each variant table goes through:
//! - Row filtering of degenerate near-zero targets
//! - Target encoding (`ln|x|`)
//! - A seeded train/test partition
//! - A randomized, cross-validated parameter search guarded by an on-disk cache
//!
//! # Modules
//!
//! ## Data
//! - [`utils`] - Tabular loading with polars
//! - [`preprocessing`] - Filtering, target encoding, partitioning
//!
//! ## Search
//! - [`training`] - Regressors, k-fold splitting, scoring
//! - [`optimizer`] - Parameter spaces, samplers, the search driver
//! - [`cache`] - Artifact stores and the search cache
//!
//! ## Orchestration
//! - [`config`] - Run configuration
//! - [`pipeline`] - Per-variant runner
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod preprocessing;
pub mod utils;

// Search
pub mod cache;
pub mod optimizer;
pub mod training;

// Orchestration
pub mod cli;
pub mod config;
pub mod pipeline;

pub use error::{Result, TofError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, TofError};

    // Data
    pub use crate::preprocessing::{
        filter_rows, map_target_values, train_test_split, RowFilter, SplitConfig, SplitResult, TargetEncoding,
    };
    pub use crate::utils::{DataLoader, TabularSource};

    // Training
    pub use crate::training::{Estimator, KFold, ModelMetrics, RandomForestRegressor, Scoring, Splitter};

    // Optimization
    pub use crate::optimizer::{
        ParameterValue, RandomSampler, RandomizedSearch, SearchAlgorithm, SearchConfig, SearchResult, SearchSpace,
        TrialParams,
    };

    // Caching
    pub use crate::cache::{ArtifactKeys, ArtifactStore, CachePolicy, FileStore, MemoryStore, SearchCache};

    // Orchestration
    pub use crate::config::RunConfig;
    pub use crate::pipeline::{Pipeline, RunReport};
}
