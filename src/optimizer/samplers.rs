//! Sampling strategies for hyperparameter search

use super::search_space::{SearchSpace, TrialParams};
use crate::error::Result;
use rand::prelude::*;
use rand::seq::index;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::warn;

/// Produces the candidate configurations for a search
pub trait SearchAlgorithm: Send + Sync {
    /// Draw up to `n_iter` configurations; the same seed gives the same sequence
    fn sample_configs(&self, space: &SearchSpace, n_iter: usize, seed: u64) -> Result<Vec<TrialParams>>;
}

/// Random sampler.
///
/// When every parameter is a finite list the grid is sampled without
/// replacement and `n_iter` is capped at the grid size. Otherwise each
/// configuration is drawn independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSampler;

impl RandomSampler {
    pub fn new() -> Self {
        Self
    }
}

impl SearchAlgorithm for RandomSampler {
    fn sample_configs(&self, space: &SearchSpace, n_iter: usize, seed: u64) -> Result<Vec<TrialParams>> {
        space.validate()?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        match space.grid_size() {
            Some(grid_size) => {
                let n = if n_iter > grid_size {
                    warn!(
                        n_iter,
                        grid_size,
                        "The total space of parameters is smaller than n_iter; running {} candidates",
                        grid_size
                    );
                    grid_size
                } else {
                    n_iter
                };

                Ok(index::sample(&mut rng, grid_size, n)
                    .into_iter()
                    .filter_map(|i| space.grid_point(i))
                    .collect())
            }
            None => Ok((0..n_iter).map(|_| space.sample(&mut rng)).collect()),
        }
    }
}

/// Every point of a fully discrete space, in grid order
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSampler;

impl SearchAlgorithm for GridSampler {
    fn sample_configs(&self, space: &SearchSpace, n_iter: usize, _seed: u64) -> Result<Vec<TrialParams>> {
        space.validate()?;
        let grid_size = space.grid_size().ok_or_else(|| {
            crate::error::TofError::ConfigError(
                "grid sampling needs every parameter to be a finite list".to_string(),
            )
        })?;
        Ok((0..grid_size.min(n_iter)).filter_map(|i| space.grid_point(i)).collect())
    }
}
