//! Search space definition for hyperparameters

use crate::error::{Result, TofError};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A concrete hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Float(f64),
    Int(i64),
    String(String),
    Bool(bool),
    /// Explicit "unset", e.g. `max_depth=None`
    None,
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int. Floats are only accepted when integral.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ParameterValue::None)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "'{}'", v),
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::None => write!(f, "None"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::Int(v as i64)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_string())
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

/// One sampled configuration, keyed by parameter name
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// Render a configuration as `a=1, b='x'`
pub fn format_params(params: &TrialParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where a parameter's values come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamDistribution {
    /// Uniform pick from a finite list
    Choice(Vec<ParameterValue>),
    /// Uniform integer in `[low, high)`
    IntUniform { low: i64, high: i64 },
    /// Uniform float in `[low, high)`
    Uniform { low: f64, high: f64 },
    /// Log-uniform float in `[low, high)`, `low > 0`
    LogUniform { low: f64, high: f64 },
}

impl ParamDistribution {
    /// Number of distinct values, if the distribution is a finite list
    pub fn n_choices(&self) -> Option<usize> {
        match self {
            ParamDistribution::Choice(values) => Some(values.len()),
            _ => None,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let bad = |reason: String| {
            Err(TofError::ConfigError(format!(
                "invalid distribution for '{}': {}",
                name, reason
            )))
        };
        match self {
            ParamDistribution::Choice(values) if values.is_empty() => bad("empty choice list".into()),
            ParamDistribution::IntUniform { low, high } if low >= high => {
                bad(format!("need low < high, got [{}, {})", low, high))
            }
            ParamDistribution::Uniform { low, high }
                if !(low.is_finite() && high.is_finite() && low < high) =>
            {
                bad(format!("need finite low < high, got [{}, {})", low, high))
            }
            ParamDistribution::LogUniform { low, high }
                if !(low.is_finite() && high.is_finite() && *low > 0.0 && low < high) =>
            {
                bad(format!("need 0 < low < high, got [{}, {})", low, high))
            }
            _ => Ok(()),
        }
    }

    /// Draw one value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match self {
            ParamDistribution::Choice(values) => values[rng.gen_range(0..values.len())].clone(),
            ParamDistribution::IntUniform { low, high } => ParameterValue::Int(rng.gen_range(*low..*high)),
            ParamDistribution::Uniform { low, high } => {
                ParameterValue::Float(rng.gen::<f64>() * (high - low) + low)
            }
            ParamDistribution::LogUniform { low, high } => {
                let (log_low, log_high) = (low.ln(), high.ln());
                ParameterValue::Float((rng.gen::<f64>() * (log_high - log_low) + log_low).exp())
            }
        }
    }
}

/// A single named hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub distribution: ParamDistribution,
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing any earlier one with the same name
    pub fn add(mut self, name: impl Into<String>, distribution: ParamDistribution) -> Self {
        let name = name.into();
        self.parameters.retain(|p| p.name != name);
        self.parameters.push(Parameter { name, distribution });
        self
    }

    /// Add a finite list of values
    pub fn choice<V: Into<ParameterValue>>(self, name: impl Into<String>, values: Vec<V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.add(name, ParamDistribution::Choice(values))
    }

    /// Add a finite list of values that may include `None`
    pub fn choice_values(self, name: impl Into<String>, values: Vec<ParameterValue>) -> Self {
        self.add(name, ParamDistribution::Choice(values))
    }

    /// Add every integer in `[low, high)` as a finite list
    pub fn int_range(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        let values = (low..high).map(ParameterValue::Int).collect();
        self.add(name, ParamDistribution::Choice(values))
    }

    /// Add a uniform integer distribution over `[low, high)`
    pub fn randint(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(name, ParamDistribution::IntUniform { low, high })
    }

    /// Add a uniform float distribution
    pub fn uniform(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(name, ParamDistribution::Uniform { low, high })
    }

    /// Add a log-uniform float distribution
    pub fn log_uniform(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(name, ParamDistribution::LogUniform { low, high })
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// Reject empty spaces and malformed distributions
    pub fn validate(&self) -> Result<()> {
        if self.parameters.is_empty() {
            return Err(TofError::ConfigError("parameter distribution space is empty".to_string()));
        }
        for p in &self.parameters {
            p.distribution.validate(&p.name)?;
        }
        Ok(())
    }

    /// Size of the full grid when every parameter is a finite list.
    ///
    /// `None` when any parameter is a continuous or integer distribution, or
    /// when the product overflows.
    pub fn grid_size(&self) -> Option<usize> {
        self.parameters
            .iter()
            .try_fold(1usize, |acc, p| p.distribution.n_choices().and_then(|n| acc.checked_mul(n)))
    }

    /// The `index`-th grid point; the last parameter varies fastest
    pub fn grid_point(&self, mut index: usize) -> Option<TrialParams> {
        let mut params = TrialParams::new();
        for p in self.parameters.iter().rev() {
            let values = match &p.distribution {
                ParamDistribution::Choice(values) if !values.is_empty() => values,
                _ => return None,
            };
            params.insert(p.name.clone(), values[index % values.len()].clone());
            index /= values.len();
        }
        if index == 0 {
            Some(params)
        } else {
            None
        }
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.distribution.sample(rng)))
            .collect()
    }
}
