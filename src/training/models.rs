//! Estimator contract and evaluation metrics

use super::scoring::{mean_absolute_error, mean_squared_error, r2_score};
use crate::error::{Result, TofError};
use crate::optimizer::{ParameterValue, TrialParams};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Regression metrics for a held-out set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    /// Number of samples scored
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute regression metrics
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mse = mean_squared_error(y_true, y_pred);
        Self {
            mse,
            rmse: mse.sqrt(),
            mae: mean_absolute_error(y_true, y_pred),
            r2: r2_score(y_true, y_pred),
            n_samples: y_true.len(),
        }
    }
}

/// A configurable regression model.
///
/// The search clones a base estimator, applies a sampled configuration with
/// [`Estimator::set_params`], then fits and scores it on each fold.
pub trait Estimator: Clone + Send + Sync {
    /// Short model name used in logs
    fn name(&self) -> &'static str;

    /// Apply hyperparameters. Unknown names or ill-typed values are configuration errors.
    fn set_params(&mut self, params: &TrialParams) -> Result<()>;

    /// Current hyperparameters
    fn get_params(&self) -> TrialParams;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<&Array1<f64>> {
        None
    }
}

fn invalid(estimator: &str, name: &str, value: &ParameterValue, expected: &str) -> TofError {
    TofError::ConfigError(format!(
        "invalid value {} for parameter '{}' of {}: expected {}",
        value, name, estimator, expected
    ))
}

/// Read an integer parameter that must be at least `min`
pub(crate) fn param_usize(estimator: &str, name: &str, value: &ParameterValue, min: usize) -> Result<usize> {
    match value.as_int() {
        Some(v) if v >= min as i64 => Ok(v as usize),
        _ => Err(invalid(estimator, name, value, &format!("an integer >= {}", min))),
    }
}

/// Read an optional integer parameter, where `None` means unlimited
pub(crate) fn param_opt_usize(
    estimator: &str,
    name: &str,
    value: &ParameterValue,
    min: usize,
) -> Result<Option<usize>> {
    if value.is_none() {
        return Ok(None);
    }
    param_usize(estimator, name, value, min)
        .map(Some)
        .map_err(|_| invalid(estimator, name, value, &format!("None or an integer >= {}", min)))
}

pub(crate) fn param_bool(estimator: &str, name: &str, value: &ParameterValue) -> Result<bool> {
    value.as_bool().ok_or_else(|| invalid(estimator, name, value, "a boolean"))
}

pub(crate) fn unknown_param(estimator: &str, name: &str) -> TofError {
    TofError::ConfigError(format!("invalid parameter '{}' for estimator {}", name, estimator))
}
