//! Data loading utilities

use crate::error::{Result, TofError};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// A source of tabular datasets addressed by file name
pub trait TabularSource {
    /// Load the named dataset
    fn load(&self, filename: &str) -> Result<DataFrame>;
}

/// Loads CSV and Parquet files from a fixed directory
#[derive(Debug, Clone)]
pub struct DataLoader {
    data_dir: PathBuf,
    infer_schema_length: usize,
}

impl DataLoader {
    /// Create a loader rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            infer_schema_length: 1000,
        }
    }

    /// Set how many rows polars inspects when inferring column types
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Directory files are resolved against
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| TofError::io(path, e))?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| TofError::DataError(format!("{}: {}", path.display(), e)))
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| TofError::io(path, e))?;

        ParquetReader::new(file)
            .finish()
            .map_err(|e| TofError::DataError(format!("{}: {}", path.display(), e)))
    }

    /// Detect file format from extension and load
    pub fn load_path(&self, path: &Path) -> Result<DataFrame> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "parquet" | "pq" => self.load_parquet(path),
            // Everything else is read as CSV
            _ => self.load_csv(path),
        }
    }
}

impl TabularSource for DataLoader {
    fn load(&self, filename: &str) -> Result<DataFrame> {
        let path = self.data_dir.join(filename);
        let start = Instant::now();
        let df = self.load_path(&path)?;
        debug!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded dataset"
        );
        Ok(df)
    }
}

/// Require that every named column exists in the frame
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    for name in columns {
        if df.column(name).is_err() {
            return Err(TofError::FeatureNotFound(name.to_string()));
        }
    }
    Ok(())
}

/// Read a column as f64 values, keeping nulls
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| TofError::FeatureNotFound(name.to_string()))?;
    let cast = column
        .cast(&DataType::Float64)
        .map_err(|e| TofError::DataError(e.to_string()))?;
    let values = cast
        .f64()
        .map_err(|e| TofError::DataError(e.to_string()))?
        .into_iter()
        .collect();
    Ok(values)
}
