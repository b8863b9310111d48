//! Random forest regression

use super::decision_tree::{Criterion, DecisionTreeRegressor};
use super::models::{param_bool, param_opt_usize, param_usize, unknown_param, Estimator};
use crate::error::{Result, TofError};
use crate::optimizer::{ParameterValue, TrialParams};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const NAME: &str = "RandomForestRegressor";

/// Random forest regressor: bagged regression trees averaged at prediction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    /// Individual trees
    trees: Vec<DecisionTreeRegressor>,
    /// Number of trees
    pub n_estimators: usize,
    /// Split criterion
    pub criterion: Criterion,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered at each split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random state
    pub random_state: Option<u64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    /// Number of features drawn per split, never less than one
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        match *self {
            MaxFeatures::Sqrt => n.sqrt().floor() as usize,
            MaxFeatures::Log2 => n.log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n * f).floor() as usize,
            MaxFeatures::Fixed(k) => k.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }

    fn to_value(self) -> ParameterValue {
        match self {
            MaxFeatures::Sqrt => ParameterValue::String("sqrt".to_string()),
            MaxFeatures::Log2 => ParameterValue::String("log2".to_string()),
            MaxFeatures::Fraction(f) => ParameterValue::Float(f),
            MaxFeatures::Fixed(k) => ParameterValue::Int(k as i64),
            MaxFeatures::All => ParameterValue::None,
        }
    }

    fn from_value(value: &ParameterValue) -> Result<Self> {
        match value {
            ParameterValue::None => Ok(MaxFeatures::All),
            ParameterValue::String(s) if s == "sqrt" => Ok(MaxFeatures::Sqrt),
            ParameterValue::String(s) if s == "log2" => Ok(MaxFeatures::Log2),
            ParameterValue::Int(k) if *k >= 1 => Ok(MaxFeatures::Fixed(*k as usize)),
            ParameterValue::Float(f) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
            other => Err(TofError::ConfigError(format!(
                "invalid value {} for parameter 'max_features' of {}: expected \"sqrt\", \"log2\", None, an integer >= 1 or a fraction in (0, 1]",
                other, NAME
            ))),
        }
    }
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    /// Create a new regressor forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            criterion: Criterion::SquaredError,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            random_state: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(TofError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(TofError::TrainingError("cannot fit a forest on zero samples".to_string()));
        }
        if self.n_estimators == 0 {
            return Err(TofError::ConfigError("n_estimators must be at least 1".to_string()));
        }

        self.n_features = n_features;
        let max_features = self.max_features.resolve(n_features);
        let base_seed = self.random_state.unwrap_or(0);

        // Each tree owns a seed derived from its index, so the fitted forest
        // does not depend on how rayon schedules the work
        let trees: Vec<DecisionTreeRegressor> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTreeRegressor> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let mut tree = DecisionTreeRegressor::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion)
                    .with_max_features(max_features)
                    .with_random_state(rng.next_u64());
                tree.max_depth = self.max_depth;

                if self.bootstrap {
                    let sample_indices: Vec<usize> =
                        (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    let x_boot = x.select(Axis(0), &sample_indices);
                    let y_boot = y.select(Axis(0), &sample_indices);
                    tree.fit(&x_boot, &y_boot)?;
                } else {
                    tree.fit(x, y)?;
                }

                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];

        for imp in self.trees.iter().filter_map(|t| t.feature_importances()) {
            for (total, &val) in total_importances.iter_mut().zip(imp.iter()) {
                *total += val;
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Make predictions: the mean over all trees
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(TofError::ModelNotFitted);
        }

        let all_predictions = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut sum = Array1::<f64>::zeros(x.nrows());
        for preds in &all_predictions {
            sum += preds;
        }
        Ok(sum / all_predictions.len() as f64)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fitted trees
    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }
}

impl Estimator for RandomForestRegressor {
    fn name(&self) -> &'static str {
        NAME
    }

    fn set_params(&mut self, params: &TrialParams) -> Result<()> {
        for (name, value) in params {
            match name.as_str() {
                "n_estimators" => self.n_estimators = param_usize(NAME, name, value, 1)?,
                "criterion" => {
                    self.criterion = value
                        .as_string()
                        .and_then(Criterion::from_name)
                        .ok_or_else(|| {
                            TofError::ConfigError(format!(
                                "invalid value {} for parameter 'criterion' of {}: expected \"squared_error\" or \"friedman_mse\"",
                                value, NAME
                            ))
                        })?;
                }
                "max_depth" => self.max_depth = param_opt_usize(NAME, name, value, 1)?,
                "min_samples_split" => self.min_samples_split = param_usize(NAME, name, value, 2)?,
                "min_samples_leaf" => self.min_samples_leaf = param_usize(NAME, name, value, 1)?,
                "max_features" => self.max_features = MaxFeatures::from_value(value)?,
                "bootstrap" => self.bootstrap = param_bool(NAME, name, value)?,
                "random_state" => {
                    self.random_state = param_opt_usize(NAME, name, value, 0)?.map(|s| s as u64)
                }
                _ => return Err(unknown_param(NAME, name)),
            }
        }
        Ok(())
    }

    fn get_params(&self) -> TrialParams {
        let mut params = TrialParams::new();
        params.insert("n_estimators".into(), ParameterValue::Int(self.n_estimators as i64));
        params.insert("criterion".into(), self.criterion.name().into());
        params.insert(
            "max_depth".into(),
            self.max_depth
                .map_or(ParameterValue::None, |d| ParameterValue::Int(d as i64)),
        );
        params.insert("min_samples_split".into(), ParameterValue::Int(self.min_samples_split as i64));
        params.insert("min_samples_leaf".into(), ParameterValue::Int(self.min_samples_leaf as i64));
        params.insert("max_features".into(), self.max_features.to_value());
        params.insert("bootstrap".into(), self.bootstrap.into());
        params.insert(
            "random_state".into(),
            self.random_state
                .map_or(ParameterValue::None, |s| ParameterValue::Int(s as i64)),
        );
        params
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForestRegressor::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForestRegressor::predict(self, x)
    }

    fn feature_importances(&self) -> Option<&Array1<f64>> {
        RandomForestRegressor::feature_importances(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 3), |(r, c)| (r as f64) * 0.1 + c as f64);
        let y = Array1::from_shape_fn(60, |r| if r < 30 { 1.0 } else { 5.0 });
        (x, y)
    }

    #[test]
    fn test_regressor() {
        let (x, y) = step_data();
        let mut rf = RandomForestRegressor::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        assert_eq!(rf.n_trees(), 10);
        let predictions = rf.predict(&x).unwrap();
        assert!(predictions[0] < 2.0);
        assert!(predictions[59] > 4.0);
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let (x, y) = step_data();
        let mut a = RandomForestRegressor::new(8)
            .with_max_features(MaxFeatures::Sqrt)
            .with_random_state(17);
        let mut b = a.clone();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_feature_importances_normalized() {
        let (x, y) = step_data();
        let mut rf = RandomForestRegressor::new(5).with_random_state(1);
        rf.fit(&x, &y).unwrap();
        let total: f64 = rf.feature_importances().unwrap().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(10), 3);
        assert_eq!(MaxFeatures::Log2.resolve(10), 3);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(10), 5);
        assert_eq!(MaxFeatures::Fixed(20).resolve(10), 10);
        assert_eq!(MaxFeatures::All.resolve(10), 10);
    }

    #[test]
    fn test_set_params() {
        let mut rf = RandomForestRegressor::default();
        let mut params = TrialParams::new();
        params.insert("n_estimators".into(), ParameterValue::Int(300));
        params.insert("criterion".into(), "friedman_mse".into());
        params.insert("max_depth".into(), ParameterValue::Int(12));
        params.insert("min_samples_split".into(), ParameterValue::Int(4));
        params.insert("min_samples_leaf".into(), ParameterValue::Int(2));
        params.insert("max_features".into(), ParameterValue::None);
        rf.set_params(&params).unwrap();

        assert_eq!(rf.n_estimators, 300);
        assert_eq!(rf.criterion, Criterion::FriedmanMse);
        assert_eq!(rf.max_depth, Some(12));
        assert_eq!(rf.min_samples_split, 4);
        assert_eq!(rf.min_samples_leaf, 2);
        assert_eq!(rf.max_features, MaxFeatures::All);

        let got = rf.get_params();
        for (name, value) in &params {
            assert_eq!(&got[name], value);
        }

        params.insert("max_features".into(), "log2".into());
        rf.set_params(&params).unwrap();
        assert_eq!(rf.max_features, MaxFeatures::Log2);
    }

    #[test]
    fn test_set_params_rejects_bad_input() {
        let mut rf = RandomForestRegressor::default();

        let mut params = TrialParams::new();
        params.insert("learning_rate".into(), ParameterValue::Float(0.1));
        assert!(matches!(rf.set_params(&params), Err(TofError::ConfigError(_))));

        let mut params = TrialParams::new();
        params.insert("criterion".into(), "gini".into());
        assert!(matches!(rf.set_params(&params), Err(TofError::ConfigError(_))));

        let mut params = TrialParams::new();
        params.insert("min_samples_split".into(), ParameterValue::Int(1));
        assert!(matches!(rf.set_params(&params), Err(TofError::ConfigError(_))));

        let mut params = TrialParams::new();
        params.insert("max_features".into(), "auto".into());
        assert!(matches!(rf.set_params(&params), Err(TofError::ConfigError(_))));
    }

    #[test]
    fn test_not_fitted() {
        let rf = RandomForestRegressor::new(3);
        assert!(matches!(rf.predict(&array![[1.0]]), Err(TofError::ModelNotFitted)));
    }

    #[test]
    fn test_survives_json() {
        let (x, y) = step_data();
        let mut rf = RandomForestRegressor::new(3).with_random_state(5);
        rf.fit(&x, &y).unwrap();

        let json = serde_json::to_string(&rf).unwrap();
        let restored: RandomForestRegressor = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), rf.predict(&x).unwrap());
    }
}
