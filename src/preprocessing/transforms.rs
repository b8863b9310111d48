//! Target encoding
//!
//! Turnover frequencies span many decades and change sign, so the regression
//! target is the log of their magnitude rather than the raw value.

use crate::error::Result;
use crate::utils::column_f64;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Named scalar transforms usable from a run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TargetEncoding {
    /// Natural log of the absolute value: ln|x|
    #[default]
    LogAbs,
    /// Base-10 log of the absolute value
    Log10Abs,
    /// Negation: -x
    Negate,
    /// No transformation
    Identity,
}

impl TargetEncoding {
    /// Apply the transform to one value. Zero maps to `-inf` for the log variants.
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            TargetEncoding::LogAbs => x.abs().ln(),
            TargetEncoding::Log10Abs => x.abs().log10(),
            TargetEncoding::Negate => -x,
            TargetEncoding::Identity => x,
        }
    }
}

/// Append `new_target_name`, computed by mapping `encoding` over `target`.
///
/// Returns a new frame; the input is left untouched. If `new_target_name`
/// already exists it is replaced. Nulls stay null. Values outside the mapping's
/// domain come out non-finite and are reported with a warning, not an error.
pub fn map_target_values<F>(
    df: &DataFrame,
    target: &str,
    new_target_name: &str,
    encoding: F,
) -> Result<DataFrame>
where
    F: Fn(f64) -> f64,
{
    let values = column_f64(df, target)?;
    let mapped: Vec<Option<f64>> = values.iter().map(|v| v.map(&encoding)).collect();

    let non_finite = mapped
        .iter()
        .filter(|v| matches!(v, Some(x) if !x.is_finite()))
        .count();
    if non_finite > 0 {
        warn!(
            column = new_target_name,
            source = target,
            count = non_finite,
            "Target encoding produced non-finite values; filter the source column first"
        );
    }

    let mut out = df.clone();
    out.with_column(Series::new(new_target_name.into(), mapped))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_abs_is_sign_symmetric() {
        let df = df!("loop-tof" => &[-2.0, 2.0]).unwrap();
        let out = map_target_values(&df, "loop-tof", "log-loop-tof", |x| TargetEncoding::LogAbs.apply(x))
            .unwrap();

        let encoded: Vec<f64> = column_f64(&out, "log-loop-tof")
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(encoded, vec![2.0f64.ln(), 2.0f64.ln()]);
    }

    #[test]
    fn test_zero_is_not_real_valued() {
        assert!(!TargetEncoding::LogAbs.apply(0.0).is_finite());
        assert!(!TargetEncoding::Log10Abs.apply(0.0).is_finite());
    }

    #[test]
    fn test_input_frame_is_untouched() {
        let df = df!("t" => &[1.0, 10.0]).unwrap();
        let out = map_target_values(&df, "t", "t2", |x| x * 2.0).unwrap();
        assert_eq!(df.width(), 1);
        assert_eq!(out.width(), 2);
    }

    #[test]
    fn test_existing_column_is_replaced() {
        let df = df!("t" => &[1.0, 10.0]).unwrap();
        let out = map_target_values(&df, "t", "t", |x| TargetEncoding::Log10Abs.apply(x)).unwrap();
        assert_eq!(out.width(), 1);
        let values: Vec<f64> = column_f64(&out, "t").unwrap().into_iter().flatten().collect();
        assert_eq!(values, vec![0.0, 1.0]);
    }

    #[test]
    fn test_missing_target_column() {
        let df = df!("t" => &[1.0]).unwrap();
        assert!(map_target_values(&df, "loop-tof", "log", |x| x).is_err());
    }
}
