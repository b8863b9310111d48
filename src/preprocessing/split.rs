//! Seeded train/test partitioning

use crate::error::{Result, TofError};
use crate::utils::column_f64;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Output of [`train_test_split`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitResult {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    /// Row positions in the input frame that went to training
    pub train_indices: Vec<usize>,
    /// Row positions in the input frame that went to testing
    pub test_indices: Vec<usize>,
    /// Feature columns, in matrix column order
    pub feature_names: Vec<String>,
}

impl SplitResult {
    /// Total number of samples across both sides
    pub fn n_samples(&self) -> usize {
        self.x_train.nrows() + self.x_test.nrows()
    }

    /// Verify that features and targets agree on both sides
    pub fn check_shapes(&self) -> Result<()> {
        if self.x_train.nrows() != self.y_train.len() {
            return Err(TofError::DataIntegrityError(format!(
                "X_train and Y_train have different number of samples ({} vs {})",
                self.x_train.nrows(),
                self.y_train.len()
            )));
        }
        if self.x_test.nrows() != self.y_test.len() {
            return Err(TofError::DataIntegrityError(format!(
                "X_test and Y_test have different number of samples ({} vs {})",
                self.x_test.nrows(),
                self.y_test.len()
            )));
        }
        Ok(())
    }
}

/// Partition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out, strictly inside (0, 1)
    pub test_size: f64,
    pub random_state: u64,
    /// Log the resulting shapes
    pub check_shape: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.10,
            random_state: 17,
            check_shape: true,
        }
    }
}

impl SplitConfig {
    pub fn new(test_size: f64, random_state: u64) -> Self {
        Self {
            test_size,
            random_state,
            ..Default::default()
        }
    }

    pub fn with_check_shape(mut self, check_shape: bool) -> Self {
        self.check_shape = check_shape;
        self
    }
}

/// Every column that is neither a target nor listed as a non-feature, in frame order
pub fn feature_columns(df: &DataFrame, targets: &[String], non_features: &[String]) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .filter(|name| !targets.contains(name) && !non_features.contains(name))
        .collect()
}

/// Extract named columns into a row-major matrix. Nulls are rejected.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| dense_column(df, name))
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, col_names.len()), |(r, c)| col_data[c][r]))
}

fn dense_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    column_f64(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| TofError::DataError(format!("column '{}' has a null at row {}", name, row)))
        })
        .collect()
}

/// Number of test rows for `n` samples: `ceil(test_size * n)`
pub fn n_test_samples(n: usize, test_size: f64) -> usize {
    (test_size * n as f64).ceil() as usize
}

/// Shuffle rows with a seeded generator and hold out `test_size` of them.
///
/// The same frame, seed and fraction always give the same partition.
pub fn train_test_split(
    df: &DataFrame,
    target: &str,
    features: &[String],
    config: &SplitConfig,
) -> Result<SplitResult> {
    if features.is_empty() {
        return Err(TofError::ConfigError("No feature columns provided".to_string()));
    }
    if !(config.test_size > 0.0 && config.test_size < 1.0) {
        return Err(TofError::ConfigError(format!(
            "test_size must lie strictly between 0 and 1, got {}",
            config.test_size
        )));
    }

    let x = columns_to_array2(df, features)?;
    let y = Array1::from_vec(dense_column(df, target)?);

    let n = x.nrows();
    let n_test = n_test_samples(n, config.test_size);
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(TofError::DataIntegrityError(format!(
            "cannot split {} samples with test_size={}: one side would be empty",
            n, config.test_size
        )));
    }

    let mut permutation: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.random_state);
    permutation.shuffle(&mut rng);

    let test_indices = permutation[..n_test].to_vec();
    let train_indices = permutation[n_test..].to_vec();

    let split = SplitResult {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train: y.select(Axis(0), &train_indices),
        y_test: y.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
        feature_names: features.to_vec(),
    };

    if config.check_shape {
        info!(
            x_train = ?split.x_train.shape(),
            x_test = ?split.x_test.shape(),
            y_train = split.y_train.len(),
            y_test = split.y_test.len(),
            "Split shapes"
        );
    }
    split.check_shapes()?;

    Ok(split)
}
