//! Randomized cross-validated search

use super::config::SearchConfig;
use super::samplers::SearchAlgorithm;
use super::search_space::{format_params, SearchSpace, TrialParams};
use crate::error::{Result, TofError};
use crate::training::{CVSplit, Estimator, Scoring, Splitter};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cross-validation record of one sampled configuration.
///
/// Scores are `None` for folds whose fit failed. A candidate with any failed
/// fold has no mean score and ranks after every successful one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Parameters applied to the base estimator
    pub params: TrialParams,
    /// Held-out score per fold
    pub split_test_scores: Vec<Option<f64>>,
    pub mean_test_score: Option<f64>,
    /// Population standard deviation across folds
    pub std_test_score: Option<f64>,
    /// Training score per fold, when requested
    pub split_train_scores: Option<Vec<Option<f64>>>,
    pub mean_train_score: Option<f64>,
    pub std_train_score: Option<f64>,
    /// Mean fit time in seconds over successful folds
    pub mean_fit_time: f64,
    /// Mean scoring time in seconds over successful folds
    pub mean_score_time: f64,
    /// 1-based rank; tied scores share the lowest rank
    pub rank_test_score: usize,
    /// First fit error, if any fold failed
    pub error: Option<String>,
}

impl CandidateResult {
    pub fn failed(&self) -> bool {
        self.mean_test_score.is_none()
    }
}

/// Full outcome of a search, persisted by the cache layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult<E> {
    /// Every evaluated candidate, in sampling order
    pub candidates: Vec<CandidateResult>,
    pub best_index: usize,
    pub best_params: TrialParams,
    pub best_score: f64,
    pub scoring: Scoring,
    pub n_splits: usize,
    /// Rows the search was run on
    pub n_samples: usize,
    pub n_features: usize,
    /// Seconds spent refitting the best configuration
    pub refit_time: Option<f64>,
    /// Wall-clock seconds for the whole search
    pub total_time: f64,
    /// Best configuration fitted on all rows, when refit was requested
    pub best_estimator: Option<E>,
}

impl<E> SearchResult<E> {
    /// Refit best estimator
    pub fn best_estimator(&self) -> Option<&E> {
        self.best_estimator.as_ref()
    }

    pub fn best_candidate(&self) -> &CandidateResult {
        &self.candidates[self.best_index]
    }

    pub fn n_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn n_failed(&self) -> usize {
        self.candidates.iter().filter(|c| c.failed()).count()
    }

    /// Candidates ordered by rank, ties broken by sampling order
    pub fn sorted_by_rank(&self) -> Vec<(usize, &CandidateResult)> {
        let mut ranked: Vec<(usize, &CandidateResult)> = self.candidates.iter().enumerate().collect();
        ranked.sort_by_key(|(idx, c)| (c.rank_test_score, *idx));
        ranked
    }

    /// The `n` best candidates
    pub fn top_n(&self, n: usize) -> Vec<(usize, &CandidateResult)> {
        let mut ranked = self.sorted_by_rank();
        ranked.truncate(n);
        ranked
    }
}

/// Scores and timings from one (candidate, fold) fit
struct FoldOutcome {
    test_score: f64,
    train_score: Option<f64>,
    fit_time: f64,
    score_time: f64,
}

/// Randomized search over a parameter space with cross-validation
#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    config: SearchConfig,
}

impl RandomizedSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run the search and return every candidate's cross-validation record.
    ///
    /// Candidates are sampled and checked against the estimator before any
    /// fit starts. Fits run on a dedicated pool of `n_jobs` threads; results
    /// are collected in (candidate, fold) order so they do not depend on
    /// scheduling.
    pub fn fit<E, S, A>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        base_estimator: &E,
        space: &SearchSpace,
        splitter: &S,
        sampler: &A,
    ) -> Result<SearchResult<E>>
    where
        E: Estimator,
        S: Splitter + ?Sized,
        A: SearchAlgorithm + ?Sized,
    {
        let start = Instant::now();
        validate_inputs(x, y)?;
        space.validate()?;
        if self.config.n_iter == 0 {
            return Err(TofError::ConfigError("n_iter must be at least 1".to_string()));
        }

        let configs = sampler.sample_configs(space, self.config.n_iter, self.config.random_state)?;
        if configs.is_empty() {
            return Err(TofError::ConfigError("sampler produced no candidates".to_string()));
        }

        let estimators = configs
            .iter()
            .map(|params| {
                let mut estimator = base_estimator.clone();
                estimator.set_params(params)?;
                Ok(estimator)
            })
            .collect::<Result<Vec<E>>>()?;

        let splits = splitter.split(x.nrows())?;
        let n_candidates = estimators.len();
        let n_splits = splits.len();

        if self.config.verbose > 0 {
            info!(
                estimator = base_estimator.name(),
                scoring = %self.config.scoring,
                "Fitting {} folds for each of {} candidates, totalling {} fits",
                n_splits,
                n_candidates,
                n_candidates * n_splits
            );
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.n_jobs)
            .build()
            .map_err(|e| TofError::ConfigError(format!("cannot build a pool of {} threads: {}", self.config.n_jobs, e)))?;

        let jobs: Vec<(usize, usize)> = (0..n_candidates)
            .flat_map(|c| (0..n_splits).map(move |f| (c, f)))
            .collect();

        let outcomes: Vec<std::result::Result<FoldOutcome, String>> = pool.install(|| {
            jobs.par_iter()
                .map(|&(c, f)| {
                    let outcome = self.fit_and_score(&estimators[c], x, y, &splits[f]);
                    match &outcome {
                        Ok(o) if self.config.verbose > 1 => info!(
                            candidate = c,
                            fold = f,
                            score = o.test_score,
                            "[CV {}/{}] {}",
                            f + 1,
                            n_splits,
                            format_params(&configs[c])
                        ),
                        Ok(o) => debug!(candidate = c, fold = f, score = o.test_score, "fold fitted"),
                        Err(e) => debug!(candidate = c, fold = f, error = %e, "fold failed"),
                    }
                    outcome.map_err(|e| e.to_string())
                })
                .collect()
        });

        let mut candidates: Vec<CandidateResult> = configs
            .into_iter()
            .enumerate()
            .map(|(c, params)| {
                let folds = &outcomes[c * n_splits..(c + 1) * n_splits];
                self.summarize(c, params, folds)
            })
            .collect();

        let means: Vec<Option<f64>> = candidates.iter().map(|c| c.mean_test_score).collect();
        for (candidate, rank) in candidates.iter_mut().zip(rank_scores(&means, self.config.scoring)) {
            candidate.rank_test_score = rank;
        }

        let best_index = candidates
            .iter()
            .position(|c| c.rank_test_score == 1 && !c.failed())
            .ok_or_else(|| {
                let first_error = candidates
                    .iter()
                    .find_map(|c| c.error.clone())
                    .unwrap_or_default();
                TofError::TrainingError(format!(
                    "all {} candidates failed to fit; first error: {}",
                    n_candidates, first_error
                ))
            })?;

        let best = &candidates[best_index];
        let best_params = best.params.clone();
        let best_score = best.mean_test_score.unwrap_or(f64::NAN);

        let (best_estimator, refit_time) = if self.config.refit {
            let refit_start = Instant::now();
            let mut estimator = estimators[best_index].clone();
            estimator
                .fit(x, y)
                .map_err(|e| TofError::TrainingError(format!("refit of the best candidate failed: {}", e)))?;
            (Some(estimator), Some(refit_start.elapsed().as_secs_f64()))
        } else {
            (None, None)
        };

        let result = SearchResult {
            n_samples: x.nrows(),
            n_features: x.ncols(),
            candidates,
            best_index,
            best_params,
            best_score,
            scoring: self.config.scoring,
            n_splits,
            refit_time,
            total_time: start.elapsed().as_secs_f64(),
            best_estimator,
        };

        if self.config.verbose > 0 {
            info!(
                best_index,
                best_score,
                failed = result.n_failed(),
                elapsed_secs = result.total_time,
                "Best parameters: {}",
                format_params(&result.best_params)
            );
        }

        Ok(result)
    }

    fn fit_and_score<E: Estimator>(
        &self,
        estimator: &E,
        x: &Array2<f64>,
        y: &Array1<f64>,
        split: &CVSplit,
    ) -> Result<FoldOutcome> {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut model = estimator.clone();
        let fit_start = Instant::now();
        model.fit(&x_train, &y_train)?;
        let fit_time = fit_start.elapsed().as_secs_f64();

        let score_start = Instant::now();
        let test_score = finite_score(self.config.scoring.score(&y_test, &model.predict(&x_test)?))?;
        let train_score = if self.config.return_train_score {
            Some(finite_score(self.config.scoring.score(&y_train, &model.predict(&x_train)?))?)
        } else {
            None
        };
        let score_time = score_start.elapsed().as_secs_f64();

        Ok(FoldOutcome {
            test_score,
            train_score,
            fit_time,
            score_time,
        })
    }

    fn summarize(
        &self,
        index: usize,
        params: TrialParams,
        folds: &[std::result::Result<FoldOutcome, String>],
    ) -> CandidateResult {
        let split_test_scores: Vec<Option<f64>> =
            folds.iter().map(|o| o.as_ref().ok().map(|f| f.test_score)).collect();
        let (mean_test_score, std_test_score) = mean_std(&split_test_scores);

        let split_train_scores: Option<Vec<Option<f64>>> = self.config.return_train_score.then(|| {
            folds
                .iter()
                .map(|o| o.as_ref().ok().and_then(|f| f.train_score))
                .collect()
        });
        let (mean_train_score, std_train_score) = split_train_scores
            .as_deref()
            .map_or((None, None), mean_std);

        let fitted: Vec<&FoldOutcome> = folds.iter().filter_map(|o| o.as_ref().ok()).collect();
        let n_fitted = fitted.len().max(1) as f64;
        let mean_fit_time = fitted.iter().map(|f| f.fit_time).sum::<f64>() / n_fitted;
        let mean_score_time = fitted.iter().map(|f| f.score_time).sum::<f64>() / n_fitted;

        let error = folds.iter().find_map(|o| o.as_ref().err().cloned());
        if let Some(e) = &error {
            warn!(
                candidate = index,
                failed_folds = folds.len() - fitted.len(),
                "Candidate failed to fit and will rank last: {}",
                e
            );
        }

        CandidateResult {
            params,
            split_test_scores,
            mean_test_score,
            std_test_score,
            split_train_scores,
            mean_train_score,
            std_train_score,
            mean_fit_time,
            mean_score_time,
            rank_test_score: 0,
            error,
        }
    }
}

fn validate_inputs(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(TofError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(TofError::DataIntegrityError(format!(
            "cannot search on {} samples x {} features",
            x.nrows(),
            x.ncols()
        )));
    }
    if let Some(pos) = y.iter().position(|v| !v.is_finite()) {
        return Err(TofError::DataIntegrityError(format!(
            "target value at row {} is not finite ({})",
            pos, y[pos]
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(TofError::DataIntegrityError(
            "feature matrix contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

fn finite_score(score: f64) -> Result<f64> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(TofError::TrainingError(format!("score is not finite ({})", score)))
    }
}

/// Mean and population std, or `None` if any fold is missing
fn mean_std(scores: &[Option<f64>]) -> (Option<f64>, Option<f64>) {
    let values: Option<Vec<f64>> = scores.iter().copied().collect();
    match values {
        Some(v) if !v.is_empty() => {
            let n = v.len() as f64;
            let mean = v.iter().sum::<f64>() / n;
            let variance = v.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
            (Some(mean), Some(variance.sqrt()))
        }
        _ => (None, None),
    }
}

/// Min-rank of each score under the rule's direction; missing scores rank last
fn rank_scores(scores: &[Option<f64>], scoring: Scoring) -> Vec<usize> {
    let n_ok = scores.iter().filter(|s| s.is_some()).count();
    scores
        .iter()
        .map(|score| match score {
            Some(s) => {
                1 + scores
                    .iter()
                    .flatten()
                    .filter(|other| scoring.is_better(**other, *s))
                    .count()
            }
            None => n_ok + 1,
        })
        .collect()
}
