//! Variant runner

use crate::cache::{ArtifactKeys, ArtifactStore, FileStore, SearchCache};
use crate::config::RunConfig;
use crate::error::Result;
use crate::optimizer::{RandomSampler, RandomizedSearch, SearchResult, TrialParams};
use crate::preprocessing::{feature_columns, map_target_values, train_test_split, SplitResult};
use crate::training::{Estimator, KFold, ModelMetrics, RandomForestRegressor, Scoring};
use crate::utils::{require_columns, TabularSource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, warn};

/// A variant's data after filtering, encoding and partitioning
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Rows in the raw table
    pub n_raw: usize,
    /// Rows surviving the filter
    pub n_filtered: usize,
    pub split: SplitResult,
}

/// What happened to one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub tag: String,
    pub n_raw: usize,
    pub n_filtered: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub feature_names: Vec<String>,
    /// The result came from the store without searching
    pub cache_hit: bool,
    pub n_candidates: usize,
    pub n_failed: usize,
    pub best_index: usize,
    pub best_score: f64,
    pub best_params: TrialParams,
    pub scoring: Scoring,
    /// Best estimator scored on the held-out rows
    pub test_metrics: Option<ModelMetrics>,
    /// Where the full result is stored
    pub location: String,
    pub elapsed_secs: f64,
}

/// Summary plus the full search result
#[derive(Debug, Clone)]
pub struct VariantRun<E> {
    pub summary: VariantSummary,
    pub result: SearchResult<E>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantFailure {
    pub tag: String,
    pub error: String,
}

/// Outcome of a multi-variant run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub completed: Vec<VariantSummary>,
    pub failed: Vec<VariantFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs the configured variants against a tabular source
#[derive(Debug, Clone)]
pub struct Pipeline<D> {
    source: D,
    config: RunConfig,
}

impl<D: TabularSource> Pipeline<D> {
    pub fn new(source: D, config: RunConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Forest seeded with the run seed
    pub fn base_estimator(&self) -> RandomForestRegressor {
        RandomForestRegressor::default().with_random_state(self.config.seed())
    }

    /// Load, filter, encode and partition one variant.
    ///
    /// Features are every raw column other than the target and the
    /// non-features, taken before the encoded column is added.
    pub fn prepare(&self, tag: &str) -> Result<PreparedData> {
        let config = &self.config;
        let raw = self.source.load(&config.data_file(tag))?;
        require_columns(&raw, &[config.target.as_str()])?;

        let features = feature_columns(&raw, &[config.target.clone()], &config.non_features);
        let filtered = config.filter.apply(&raw)?;
        let encoding = config.encoding;
        let encoded = map_target_values(&filtered, &config.target, &config.encoded_target, |v| {
            encoding.apply(v)
        })?;
        let split = train_test_split(&encoded, &config.encoded_target, &features, &config.split)?;

        info!(
            tag,
            raw = raw.height(),
            kept = filtered.height(),
            features = features.len(),
            "Prepared variant data"
        );

        Ok(PreparedData {
            n_raw: raw.height(),
            n_filtered: filtered.height(),
            split,
        })
    }

    /// Prepare one variant and run its cached search
    pub fn run_variant<E, S>(&self, tag: &str, base_estimator: &E, cache: &SearchCache<S>) -> Result<VariantRun<E>>
    where
        E: Estimator + Serialize + DeserializeOwned,
        S: ArtifactStore,
    {
        let start = Instant::now();
        let prepared = self.prepare(tag)?;
        let split = &prepared.split;

        let keys = ArtifactKeys::for_tag(tag);
        let search = RandomizedSearch::new(self.config.search.clone());
        let splitter = KFold::new(self.config.cv_folds);

        let outcome = cache.get_or_search(&keys, self.config.cache, || {
            search.fit(
                &split.x_train,
                &split.y_train,
                base_estimator,
                &self.config.space,
                &splitter,
                &RandomSampler,
            )
        })?;
        let cache_hit = outcome.is_hit();
        let result = outcome.result;

        let test_metrics = match result.best_estimator() {
            Some(best) if result.n_features == split.x_test.ncols() => {
                let predictions = best.predict(&split.x_test)?;
                Some(ModelMetrics::compute_regression(&split.y_test, &predictions))
            }
            Some(_) => {
                warn!(
                    tag,
                    stored = result.n_features,
                    current = split.x_test.ncols(),
                    "Stored estimator was fitted on a different feature set; skipping held-out metrics"
                );
                None
            }
            None => None,
        };

        let summary = VariantSummary {
            tag: tag.to_string(),
            n_raw: prepared.n_raw,
            n_filtered: prepared.n_filtered,
            n_train: split.x_train.nrows(),
            n_test: split.x_test.nrows(),
            feature_names: split.feature_names.clone(),
            cache_hit,
            n_candidates: result.n_candidates(),
            n_failed: result.n_failed(),
            best_index: result.best_index,
            best_score: result.best_score,
            best_params: result.best_params.clone(),
            scoring: result.scoring,
            test_metrics,
            location: cache.store().location(&keys.key),
            elapsed_secs: start.elapsed().as_secs_f64(),
        };

        if let Some(metrics) = &summary.test_metrics {
            info!(
                tag,
                best_score = summary.best_score,
                test_mae = metrics.mae,
                test_r2 = metrics.r2,
                "Variant complete"
            );
        }

        Ok(VariantRun { summary, result })
    }

    /// Run every configured tag with a file store under `<save_dir>/<tag>_steady`.
    ///
    /// The first failure aborts the run unless `keep_going` is set, in which
    /// case failures are collected in the report.
    pub fn run_all(&self) -> Result<RunReport> {
        self.config.validate()?;
        let base = self.base_estimator();
        let mut report = RunReport::default();

        for tag in &self.config.tags {
            info!(tag = %tag, "Running variant");
            let cache = SearchCache::new(FileStore::new(self.config.results_dir(tag)));
            match self.run_variant(tag, &base, &cache) {
                Ok(run) => report.completed.push(run.summary),
                Err(e) if self.config.keep_going => {
                    error!(tag = %tag, error = %e, "Variant failed; continuing");
                    report.failed.push(VariantFailure {
                        tag: tag.clone(),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachePolicy, MemoryStore};
    use crate::error::TofError;
    use crate::optimizer::SearchSpace;
    use polars::prelude::*;
    use std::collections::HashMap;

    struct FrameSource(HashMap<String, DataFrame>);

    impl TabularSource for FrameSource {
        fn load(&self, filename: &str) -> Result<DataFrame> {
            self.0.get(filename).cloned().ok_or_else(|| {
                TofError::io(
                    filename,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such frame"),
                )
            })
        }
    }

    fn frame(n: usize) -> DataFrame {
        let x1: Vec<f64> = (0..n).map(|i| i as f64 / n as f64).collect();
        let x2: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64).collect();
        let tof: Vec<f64> = (0..n)
            .map(|i| if i % 10 == 0 { 0.0 } else { (x1[i] * 3.0).exp() * if i % 2 == 0 { 1.0 } else { -1.0 } })
            .collect();
        let cond: Vec<i64> = (0..n).map(|i| (i % 3) as i64).collect();
        DataFrame::new(vec![
            Column::new("x1".into(), x1),
            Column::new("x2".into(), x2),
            Column::new("steady-state-condition".into(), cond),
            Column::new("loop-tof".into(), tof),
        ])
        .unwrap()
    }

    fn pipeline(n: usize) -> Pipeline<FrameSource> {
        let mut frames = HashMap::new();
        frames.insert("ml_data_op_steady.csv".to_string(), frame(n));
        let config = RunConfig::default()
            .with_tags(["op"])
            .with_n_iter(2)
            .with_n_jobs(2)
            .with_cv_folds(3)
            .with_space(
                SearchSpace::new()
                    .choice("n_estimators", vec![5])
                    .choice("max_depth", vec![2, 4]),
            );
        Pipeline::new(FrameSource(frames), config)
    }

    #[test]
    fn test_prepare_filters_and_splits() {
        let prepared = pipeline(100).prepare("op").unwrap();
        assert_eq!(prepared.n_raw, 100);
        assert_eq!(prepared.n_filtered, 90);
        assert_eq!(prepared.split.x_train.nrows(), 81);
        assert_eq!(prepared.split.x_test.nrows(), 9);
        assert_eq!(prepared.split.feature_names, vec!["x1", "x2"]);
    }

    #[test]
    fn test_run_variant_then_hit() {
        let pipeline = pipeline(100);
        let cache = SearchCache::new(MemoryStore::new());
        let base = pipeline.base_estimator();

        let first = pipeline.run_variant("op", &base, &cache).unwrap();
        assert!(!first.summary.cache_hit);
        assert_eq!(first.summary.n_candidates, 2);
        assert!(first.summary.test_metrics.is_some());
        assert_eq!(first.summary.location, "memory://rf_reg_op.json");

        let reuse = Pipeline::new(
            FrameSource(pipeline.source.0.clone()),
            pipeline.config().clone().with_cache(CachePolicy::reuse()),
        );
        let second = reuse.run_variant("op", &base, &cache).unwrap();
        assert!(second.summary.cache_hit);
        assert_eq!(second.result, first.result);
        assert_eq!(second.summary.test_metrics, first.summary.test_metrics);
    }

    #[test]
    fn test_missing_target_column() {
        let mut frames = HashMap::new();
        frames.insert("ml_data_op_steady.csv".to_string(), frame(20).drop("loop-tof").unwrap());
        let pipeline = Pipeline::new(FrameSource(frames), RunConfig::default());
        assert!(matches!(pipeline.prepare("op"), Err(TofError::FeatureNotFound(_))));
    }
}
