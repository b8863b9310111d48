//! Model training module
//!
//! Provides the regression side of the search:
//! - Random forest and decision tree regressors
//! - The [`Estimator`] contract the search drives
//! - K-fold cross-validation splitters
//! - Scoring rules and held-out metrics

mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod random_forest;
pub mod scoring;

pub use cross_validation::{CVSplit, KFold, Splitter};
pub use decision_tree::{Criterion, DecisionTreeRegressor, TreeNode};
pub use models::{Estimator, ModelMetrics};
pub use random_forest::{MaxFeatures, RandomForestRegressor};
pub use scoring::{mean_absolute_error, mean_squared_error, r2_score, Scoring};
