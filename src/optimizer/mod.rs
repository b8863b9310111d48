//! Hyperparameter search module
//!
//! Provides:
//! - Parameter spaces mixing finite lists and continuous distributions
//! - Random and grid samplers
//! - A randomized cross-validated search driver

mod config;
mod samplers;
mod search;
mod search_space;

pub use config::{OptimizeDirection, SearchConfig};
pub use samplers::{GridSampler, RandomSampler, SearchAlgorithm};
pub use search::{CandidateResult, RandomizedSearch, SearchResult};
pub use search_space::{format_params, ParamDistribution, Parameter, ParameterValue, SearchSpace, TrialParams};
