//! Data preprocessing module
//!
//! The stages that run before the search, in pipeline order:
//! - Row filtering (steady-state condition)
//! - Target encoding (log of the absolute turnover frequency)
//! - Seeded train/test partitioning

pub mod filter;
pub mod split;
pub mod transforms;

pub use filter::{filter_rows, RowFilter};
pub use split::{
    columns_to_array2, feature_columns, n_test_samples, train_test_split, SplitConfig, SplitResult,
};
pub use transforms::{map_target_values, TargetEncoding};
