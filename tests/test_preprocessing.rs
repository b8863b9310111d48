//! Integration tests for filtering, target encoding and partitioning

use polars::prelude::*;
use tof_search::preprocessing::{
    feature_columns, filter_rows, map_target_values, train_test_split, RowFilter, SplitConfig, TargetEncoding,
};
use tof_search::TofError;

fn tof_frame() -> DataFrame {
    df!(
        "temperature" => &[400.0, 450.0, 500.0, 550.0, 600.0, 650.0, 700.0, 750.0, 800.0, 850.0],
        "pressure" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        "steady-state-condition" => &[0i64, 1, 0, 1, 0, 1, 0, 1, 0, 1],
        "loop-tof" => &[2.0, -2.0, 0.0, 1e-4, -1e-4, 5e-5, -5e-5, 3.0, -0.5, 1e3]
    )
    .unwrap()
}

#[test]
fn test_band_filter_then_log_encoding() {
    let df = tof_frame();
    let filtered = RowFilter::default().apply(&df).unwrap();

    // 0.0 and the two ±5e-5 rows fall inside the open band; the ±1e-4 edges stay
    assert_eq!(filtered.height(), 7);
    let kept: Vec<f64> = filtered.column("loop-tof").unwrap().f64().unwrap().into_no_null_iter().collect();
    assert_eq!(kept, vec![2.0, -2.0, 1e-4, -1e-4, 3.0, -0.5, 1e3]);

    let encoded = map_target_values(&filtered, "loop-tof", "log-loop-tof", |v| TargetEncoding::LogAbs.apply(v)).unwrap();
    let logs: Vec<f64> = encoded.column("log-loop-tof").unwrap().f64().unwrap().into_no_null_iter().collect();
    assert!((logs[0] - 2f64.ln()).abs() < 1e-12);
    assert!((logs[1] - 2f64.ln()).abs() < 1e-12);
    assert!(logs.iter().all(|v| v.is_finite()));

    // The source frames are untouched
    assert_eq!(df.height(), 10);
    assert!(filtered.column("log-loop-tof").is_err());
}

#[test]
fn test_log_of_unfiltered_zero_is_not_finite() {
    let encoded = map_target_values(&tof_frame(), "loop-tof", "log-loop-tof", |v| v.abs().ln()).unwrap();
    let value = encoded.column("log-loop-tof").unwrap().f64().unwrap().get(2).unwrap();
    assert!(!value.is_finite());
}

#[test]
fn test_custom_predicate_preserves_order() {
    let filtered = filter_rows(&tof_frame(), "pressure", |p| p % 2.0 == 0.0).unwrap();
    let kept: Vec<f64> = filtered.column("pressure").unwrap().f64().unwrap().into_no_null_iter().collect();
    assert_eq!(kept, vec![2.0, 4.0, 6.0, 8.0, 10.0]);
}

#[test]
fn test_split_over_encoded_frame() {
    let df = tof_frame();
    let features = feature_columns(&df, &["loop-tof".to_string()], &["steady-state-condition".to_string()]);
    assert_eq!(features, vec!["temperature", "pressure"]);

    let filtered = RowFilter::default().apply(&df).unwrap();
    let encoded = map_target_values(&filtered, "loop-tof", "log-loop-tof", |v| v.abs().ln()).unwrap();
    let split = train_test_split(&encoded, "log-loop-tof", &features, &SplitConfig::new(0.3, 17)).unwrap();

    // ceil(0.3 * 7) = 3 held out
    assert_eq!(split.x_test.nrows(), 3);
    assert_eq!(split.x_train.nrows(), 4);
    assert_eq!(split.y_train.len(), 4);

    let mut all: Vec<usize> = split.train_indices.iter().chain(&split.test_indices).copied().collect();
    all.sort_unstable();
    assert_eq!(all, (0..7).collect::<Vec<_>>());

    // Rows stay aligned: pressure identifies each row
    for (row, &idx) in split.test_indices.iter().enumerate() {
        let pressure = encoded.column("pressure").unwrap().f64().unwrap().get(idx).unwrap();
        assert_eq!(split.x_test[[row, 1]], pressure);
    }

    let again = train_test_split(&encoded, "log-loop-tof", &features, &SplitConfig::new(0.3, 17)).unwrap();
    assert_eq!(again.test_indices, split.test_indices);
    assert_eq!(again.x_train, split.x_train);
}

#[test]
fn test_precondition_errors() {
    let df = tof_frame();
    let features = vec!["temperature".to_string()];

    assert!(matches!(
        train_test_split(&df, "loop-tof", &[], &SplitConfig::default()),
        Err(TofError::ConfigError(_))
    ));
    assert!(matches!(
        train_test_split(&df, "loop-tof", &features, &SplitConfig::new(1.0, 17)),
        Err(TofError::ConfigError(_))
    ));
    assert!(matches!(
        train_test_split(&df, "missing", &features, &SplitConfig::default()),
        Err(TofError::FeatureNotFound(_))
    ));
    assert!(matches!(
        map_target_values(&df, "missing", "out", |v| v),
        Err(TofError::FeatureNotFound(_))
    ));
}
