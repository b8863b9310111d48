//! Per-variant search pipeline
//!
//! Chains loading, filtering, target encoding, partitioning and the cached
//! search for each configured variant tag.

mod runner;

pub use runner::{Pipeline, PreparedData, RunReport, VariantFailure, VariantRun, VariantSummary};
