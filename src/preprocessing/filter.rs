//! Row filtering ahead of target encoding
//!
//! Near-zero turnover frequencies describe a degenerate steady state and
//! would blow up under a log transform, so they are dropped first.

use crate::error::{Result, TofError};
use crate::utils::column_f64;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Serializable description of a row inclusion predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowFilter {
    /// Keep `v <= -threshold || v >= threshold`, dropping the open band around zero
    OutsideBand { column: String, threshold: f64 },
    /// Keep `min <= v <= max`
    Range { column: String, min: f64, max: f64 },
}

impl Default for RowFilter {
    fn default() -> Self {
        RowFilter::steady_state("loop-tof")
    }
}

impl RowFilter {
    /// The steady-state condition: drop targets inside `(-1e-4, 1e-4)`
    pub fn steady_state(column: impl Into<String>) -> Self {
        RowFilter::OutsideBand {
            column: column.into(),
            threshold: 1e-4,
        }
    }

    /// Column the predicate reads
    pub fn column(&self) -> &str {
        match self {
            RowFilter::OutsideBand { column, .. } | RowFilter::Range { column, .. } => column,
        }
    }

    /// Evaluate the predicate on a single value
    pub fn keeps(&self, value: f64) -> bool {
        match self {
            RowFilter::OutsideBand { threshold, .. } => value <= -threshold || value >= *threshold,
            RowFilter::Range { min, max, .. } => value >= *min && value <= *max,
        }
    }

    /// Check the predicate parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            RowFilter::OutsideBand { threshold, .. } if !(threshold.is_finite() && *threshold >= 0.0) => {
                Err(TofError::ConfigError(format!(
                    "band threshold must be finite and non-negative, got {}",
                    threshold
                )))
            }
            RowFilter::Range { min, max, .. } if !(min <= max) => Err(TofError::ConfigError(
                format!("range filter needs min <= max, got [{}, {}]", min, max),
            )),
            _ => Ok(()),
        }
    }

    /// Apply the predicate to a frame
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        self.validate()?;
        filter_rows(df, self.column(), |v| self.keeps(v))
    }
}

/// Keep rows whose `column` value satisfies `predicate`, preserving order.
/// Null values never satisfy the predicate.
pub fn filter_rows<F>(df: &DataFrame, column: &str, predicate: F) -> Result<DataFrame>
where
    F: Fn(f64) -> bool,
{
    let values = column_f64(df, column)?;
    let mask: BooleanChunked = values
        .iter()
        .map(|v| v.map_or(false, |x| predicate(x)))
        .collect();

    let filtered = df.filter(&mask)?;
    debug!(
        column,
        before = df.height(),
        after = filtered.height(),
        "Filtered rows"
    );
    Ok(filtered)
}
