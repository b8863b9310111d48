//! End-to-end tests: CSV on disk → filter → encode → split → cached search → artifacts

use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::path::Path;
use tempfile::TempDir;
use tof_search::cache::{ArtifactKeys, ArtifactStore, CachePolicy, FileStore, MemoryStore, SearchCache};
use tof_search::config::RunConfig;
use tof_search::optimizer::{ParameterValue, SearchSpace};
use tof_search::pipeline::Pipeline;
use tof_search::training::{Estimator, RandomForestRegressor};
use tof_search::utils::DataLoader;
use tof_search::TofError;

// ============================================================================
// Fixtures
// ============================================================================

/// 1000 rows; every tenth has a turnover frequency inside the excluded band
fn steady_state_frame(n: usize, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut x1 = Vec::with_capacity(n);
    let mut x2 = Vec::with_capacity(n);
    let mut x3 = Vec::with_capacity(n);
    let mut condition = Vec::with_capacity(n);
    let mut tof = Vec::with_capacity(n);

    for i in 0..n {
        let a: f64 = rng.gen();
        let b: f64 = rng.gen();
        let c: f64 = rng.gen();
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        let value = if i % 10 == 0 {
            sign * 5e-5
        } else {
            sign * (4.0 * a - 2.0 * b + 0.1 * c).exp()
        };
        x1.push(a);
        x2.push(b);
        x3.push(c);
        condition.push((i % 4) as i64);
        tof.push(value);
    }

    df!(
        "x1" => x1,
        "x2" => x2,
        "x3" => x3,
        "steady-state-condition" => condition,
        "loop-tof" => tof
    )
    .unwrap()
}

fn write_csv(dir: &Path, name: &str, df: &mut DataFrame) {
    let mut file = File::create(dir.join(name)).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
}

fn grid_2x3() -> SearchSpace {
    SearchSpace::new()
        .choice("criterion", vec!["squared_error", "friedman_mse"])
        .choice("max_depth", vec![1, 3, 6])
}

fn small_run(data_dir: &Path, save_dir: &Path) -> RunConfig {
    RunConfig::default()
        .with_tags(["op"])
        .with_data_dir(data_dir)
        .with_save_dir(save_dir)
        .with_n_iter(5)
        .with_n_jobs(2)
        .with_space(grid_2x3())
}

// ============================================================================
// Scenario
// ============================================================================

#[test]
fn test_steady_state_scenario() {
    let data = TempDir::new().unwrap();
    write_csv(data.path(), "ml_data_op_steady.csv", &mut steady_state_frame(1000, 1));

    let config = small_run(data.path(), data.path());
    let pipeline = Pipeline::new(DataLoader::new(data.path()), config);

    let prepared = pipeline.prepare("op").unwrap();
    assert_eq!(prepared.n_raw, 1000);
    assert_eq!(prepared.n_filtered, 900);
    assert_eq!(prepared.split.x_train.dim(), (810, 3));
    assert_eq!(prepared.split.x_test.dim(), (90, 3));
    assert_eq!(prepared.split.y_train.len(), 810);
    assert_eq!(prepared.split.feature_names, vec!["x1", "x2", "x3"]);

    let cache = SearchCache::new(MemoryStore::new());
    let base = RandomForestRegressor::new(10).with_random_state(17);
    let run = pipeline.run_variant("op", &base, &cache).unwrap();
    let result = &run.result;

    // 5 distinct grid points out of 6, each scored on 10 ordered folds
    assert_eq!(result.n_candidates(), 5);
    assert_eq!(result.n_splits, 10);
    for i in 0..5 {
        for j in (i + 1)..5 {
            assert_ne!(result.candidates[i].params, result.candidates[j].params);
        }
    }

    // Best candidate has the lowest mean absolute error
    let best_mae = -result.best_score;
    for candidate in &result.candidates {
        let mae = -candidate.mean_test_score.unwrap();
        assert!(best_mae <= mae + 1e-12);
        assert_eq!(candidate.split_train_scores.as_ref().map(Vec::len), Some(10));
    }
    assert_eq!(result.best_candidate().rank_test_score, 1);

    let best = result.best_estimator().unwrap();
    assert_eq!(best.get_params()["max_depth"], result.best_params["max_depth"]);
    assert_eq!(best.n_trees(), 10);

    let metrics = run.summary.test_metrics.unwrap();
    assert_eq!(metrics.n_samples, 90);
    assert!(metrics.r2 > 0.0);
}

#[test]
fn test_run_all_writes_artifacts_then_reuses_them() {
    let data = TempDir::new().unwrap();
    let results = TempDir::new().unwrap();
    write_csv(data.path(), "ml_data_op_steady.csv", &mut steady_state_frame(200, 2));

    let space = grid_2x3().choice("n_estimators", vec![5]);
    let config = small_run(data.path(), results.path())
        .with_cv_folds(3)
        .with_space(space);

    let report = Pipeline::new(DataLoader::new(data.path()), config.clone()).run_all().unwrap();
    assert!(report.is_success());
    assert!(!report.completed[0].cache_hit);

    let variant_dir = results.path().join("op_steady");
    assert!(variant_dir.join("rf_reg_op.json").is_file());
    assert!(variant_dir.join("rf_reg_op-best-estm.json").is_file());

    let store = FileStore::new(&variant_dir);
    let stored_best: RandomForestRegressor = store.load("rf_reg_op-best-estm.json").unwrap();
    assert_eq!(stored_best.n_trees(), 5);

    let reuse = config.with_cache(CachePolicy::reuse());
    let again = Pipeline::new(DataLoader::new(data.path()), reuse).run_all().unwrap();
    assert!(again.completed[0].cache_hit);
    assert_eq!(again.completed[0].best_params, report.completed[0].best_params);
    assert_eq!(again.completed[0].best_score, report.completed[0].best_score);
}

#[test]
fn test_missing_variant_aborts_or_is_isolated() {
    let data = TempDir::new().unwrap();
    let results = TempDir::new().unwrap();
    write_csv(data.path(), "ml_data_op_steady.csv", &mut steady_state_frame(120, 3));

    let space = SearchSpace::new()
        .choice("n_estimators", vec![3])
        .choice("max_depth", vec![2]);
    let config = small_run(data.path(), results.path())
        .with_tags(["rc", "op"])
        .with_cv_folds(2)
        .with_space(space);

    let err = Pipeline::new(DataLoader::new(data.path()), config.clone())
        .run_all()
        .unwrap_err();
    assert!(matches!(err, TofError::Io { .. }));
    assert!(!results.path().join("op_steady").exists());

    let report = Pipeline::new(DataLoader::new(data.path()), config.with_keep_going(true))
        .run_all()
        .unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed[0].tag, "rc");
    assert_eq!(report.completed[0].tag, "op");
}

#[test]
fn test_tag_with_path_separator_fails_before_searching() {
    let data = TempDir::new().unwrap();
    let results = TempDir::new().unwrap();
    std::fs::create_dir(data.path().join("ml_data_sub")).unwrap();
    write_csv(data.path(), "ml_data_sub/op_steady.csv", &mut steady_state_frame(120, 5));

    let config = small_run(data.path(), results.path())
        .with_tags(["sub/op"])
        .with_cv_folds(2);
    let pipeline = Pipeline::new(DataLoader::new(data.path()), config);

    // The data itself loads fine; only the artifact keys are unusable
    assert!(pipeline.prepare("sub/op").is_ok());

    let err = pipeline.run_all().unwrap_err();
    assert!(matches!(err, TofError::ConfigError(_)));
    assert_eq!(std::fs::read_dir(results.path()).unwrap().count(), 0);

    // Going through the cache directly stops before the search as well
    let cache = SearchCache::new(MemoryStore::new());
    let base = RandomForestRegressor::new(3).with_random_state(17);
    assert!(matches!(
        pipeline.run_variant("sub/op", &base, &cache),
        Err(TofError::ConfigError(_))
    ));
    assert!(cache.store().is_empty());
}

#[test]
fn test_empty_feature_set_is_config_error() {
    let data = TempDir::new().unwrap();
    let mut df = df!(
        "steady-state-condition" => &[1i64, 2, 3, 4],
        "loop-tof" => &[1.0, 2.0, 3.0, 4.0]
    )
    .unwrap();
    write_csv(data.path(), "ml_data_op_steady.csv", &mut df);

    let pipeline = Pipeline::new(DataLoader::new(data.path()), small_run(data.path(), data.path()));
    assert!(matches!(pipeline.prepare("op"), Err(TofError::ConfigError(_))));
}

#[test]
fn test_best_params_apply_to_fresh_estimator() {
    let data = TempDir::new().unwrap();
    write_csv(data.path(), "ml_data_op_steady.csv", &mut steady_state_frame(150, 4));
    let config = small_run(data.path(), data.path()).with_cv_folds(3);
    let pipeline = Pipeline::new(DataLoader::new(data.path()), config);

    let cache = SearchCache::new(MemoryStore::new());
    let run = pipeline
        .run_variant("op", &RandomForestRegressor::new(4).with_random_state(17), &cache)
        .unwrap();

    let mut fresh = RandomForestRegressor::new(4).with_random_state(17);
    fresh.set_params(&run.result.best_params).unwrap();
    assert_eq!(
        fresh.get_params()["criterion"],
        run.result.best_params["criterion"]
    );
    assert!(matches!(run.result.best_params["max_depth"], ParameterValue::Int(_)));
    assert!(cache.store().exists(&ArtifactKeys::for_tag("op").best_key));
}
