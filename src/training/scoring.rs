//! Scoring rules for cross-validation

use crate::optimizer::OptimizeDirection;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scoring rule applied to held-out predictions.
///
/// The `Neg*` rules negate an error so that larger is better; the plain
/// error rule is minimized. Callers must go through [`Scoring::direction`]
/// rather than assume a sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    NegMeanAbsoluteError,
    NegMeanSquaredError,
    NegRootMeanSquaredError,
    MeanAbsoluteError,
    R2,
}

impl Scoring {
    /// Score predictions against ground truth
    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        match self {
            Scoring::NegMeanAbsoluteError => -mean_absolute_error(y_true, y_pred),
            Scoring::NegMeanSquaredError => -mean_squared_error(y_true, y_pred),
            Scoring::NegRootMeanSquaredError => -mean_squared_error(y_true, y_pred).sqrt(),
            Scoring::MeanAbsoluteError => mean_absolute_error(y_true, y_pred),
            Scoring::R2 => r2_score(y_true, y_pred),
        }
    }

    /// Which way is better for this rule
    pub fn direction(&self) -> OptimizeDirection {
        match self {
            Scoring::MeanAbsoluteError => OptimizeDirection::Minimize,
            _ => OptimizeDirection::Maximize,
        }
    }

    /// Whether score `a` beats score `b`
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        self.direction().is_better(a, b)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scoring::NegMeanAbsoluteError => "neg_mean_absolute_error",
            Scoring::NegMeanSquaredError => "neg_mean_squared_error",
            Scoring::NegRootMeanSquaredError => "neg_root_mean_squared_error",
            Scoring::MeanAbsoluteError => "mean_absolute_error",
            Scoring::R2 => "r2",
        }
    }

    /// Parse a scoring name as written in configs and on the command line
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Scoring::NegMeanAbsoluteError,
            Scoring::NegMeanSquaredError,
            Scoring::NegRootMeanSquaredError,
            Scoring::MeanAbsoluteError,
            Scoring::R2,
        ]
        .into_iter()
        .find(|s| s.name() == name)
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / n
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n
}

/// Coefficient of determination; 0 when the truth is constant
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    let y_mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_neg_mae_is_negated() {
        let y_true = array![1.0, 2.0, 3.0];
        let y_pred = array![2.0, 2.0, 1.0];
        assert_eq!(Scoring::MeanAbsoluteError.score(&y_true, &y_pred), 1.0);
        assert_eq!(Scoring::NegMeanAbsoluteError.score(&y_true, &y_pred), -1.0);
    }

    #[test]
    fn test_directions_pick_lower_error() {
        // Prediction A has the lower absolute error under both conventions
        let y_true = array![0.0, 0.0];
        let a = Scoring::NegMeanAbsoluteError.score(&y_true, &array![0.1, 0.1]);
        let b = Scoring::NegMeanAbsoluteError.score(&y_true, &array![1.0, 1.0]);
        assert!(Scoring::NegMeanAbsoluteError.is_better(a, b));

        let a = Scoring::MeanAbsoluteError.score(&y_true, &array![0.1, 0.1]);
        let b = Scoring::MeanAbsoluteError.score(&y_true, &array![1.0, 1.0]);
        assert!(Scoring::MeanAbsoluteError.is_better(a, b));
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        assert!(r2_score(&y_true, &y_pred) > 0.9);
        assert!((mean_squared_error(&y_true, &y_pred) - 0.006).abs() < 1e-9);
        assert!(
            (Scoring::NegRootMeanSquaredError.score(&y_true, &y_pred) + 0.006f64.sqrt()).abs() < 1e-9
        );
    }

    #[test]
    fn test_names_round_trip() {
        for s in [Scoring::NegMeanAbsoluteError, Scoring::R2, Scoring::MeanAbsoluteError] {
            assert_eq!(Scoring::from_name(s.name()), Some(s));
        }
        assert_eq!(Scoring::from_name("accuracy"), None);
    }

    #[test]
    fn test_serde_uses_snake_case_names() {
        let json = serde_json::to_string(&Scoring::NegMeanAbsoluteError).unwrap();
        assert_eq!(json, "\"neg_mean_absolute_error\"");
    }
}
