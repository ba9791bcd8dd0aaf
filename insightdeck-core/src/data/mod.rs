//! Profile extraction: spreadsheet/CSV loading, per-column summaries and the
//! deeper statistical profile.

pub mod profile;
pub mod summary;
pub mod workbook;

use crate::config::ProfileConfig;
use crate::error::DataError;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, error, info};

pub use profile::{DatasetProfile, TableStats, VariableKind, VariableStats};
pub use summary::{ColumnSummary, DatasetSummary};

/// Input formats accepted by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    /// `.xlsx` / `.xls`, one dataset per sheet.
    Workbook,
}

impl SourceFormat {
    /// Classify a path by its extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xlsx" | "xls" => Some(SourceFormat::Workbook),
            _ => None,
        }
    }
}

/// One dataset with its summary and profile, as produced by [`extract`].
#[derive(Debug, Clone)]
pub struct ExtractedSheet {
    pub sheet_name: String,
    pub summary: DatasetSummary,
    pub profile: DatasetProfile,
    pub dataset: DataFrame,
}

/// Load every dataset in `path` and compute its summary and profile.
///
/// A file that cannot be parsed yields an empty list; only an unsupported
/// extension is an error.
pub fn extract(path: &Path, config: &ProfileConfig) -> Result<Vec<ExtractedSheet>, DataError> {
    let tables = match read_tables(path) {
        Ok(tables) => tables,
        Err(e @ DataError::UnsupportedExtension { .. }) => return Err(e),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to parse input file");
            return Ok(Vec::new());
        }
    };

    let mut sheets = Vec::with_capacity(tables.len());
    for (sheet_name, dataset) in tables {
        let summary = summary::summarize(&dataset, config.sample_values)?;
        let profile = profile::profile(&dataset, config)?;
        debug!(
            sheet = %sheet_name,
            rows = summary.n_rows,
            cols = summary.n_cols,
            "Profiled dataset"
        );
        sheets.push(ExtractedSheet {
            sheet_name,
            summary,
            profile,
            dataset,
        });
    }
    info!(path = %path.display(), sheets = sheets.len(), "Extraction complete");
    Ok(sheets)
}

/// Parse `path` into named datasets without profiling them.
pub fn read_tables(path: &Path) -> Result<Vec<(String, DataFrame)>, DataError> {
    match SourceFormat::from_path(path) {
        Some(SourceFormat::Csv) => {
            let file = File::open(path).map_err(|e| DataError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            let df = CsvReader::new(file).finish()?;
            Ok(vec![(random_dataset_id(), df)])
        }
        Some(SourceFormat::Workbook) => workbook::read_workbook(path),
        None => Err(DataError::UnsupportedExtension {
            path: path.to_path_buf(),
        }),
    }
}

/// A fresh 16-hex-character identifier for a CSV dataset.
pub fn random_dataset_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

/// Whether `dtype` is a primitive integer or float type.
pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Values of a numeric series as `f64`, `None` for missing cells.
///
/// Returns `None` when the series is not numeric.
pub fn numeric_values(series: &Series) -> Result<Option<Vec<Option<f64>>>, DataError> {
    if !is_numeric(series.dtype()) {
        return Ok(None);
    }
    let cast = series.cast(&DataType::Float64)?;
    let values = cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(Some(values))
}

/// Values of any series rendered as text, `None` for missing cells.
pub fn text_values(series: &Series) -> Result<Vec<Option<String>>, DataError> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Values of any series as JSON scalars, `None` for missing cells.
pub fn json_values(series: &Series) -> Result<Vec<Option<serde_json::Value>>, DataError> {
    let dtype = series.dtype();
    if matches!(dtype, DataType::Float32 | DataType::Float64) {
        let cast = series.cast(&DataType::Float64)?;
        return Ok(cast
            .f64()?
            .into_iter()
            .map(|v| v.and_then(serde_json::Number::from_f64).map(Into::into))
            .collect());
    }
    if is_numeric(dtype) {
        let cast = series.cast(&DataType::Int64)?;
        return Ok(cast.i64()?.into_iter().map(|v| v.map(Into::into)).collect());
    }
    if matches!(dtype, DataType::Boolean) {
        return Ok(series.bool()?.into_iter().map(|v| v.map(Into::into)).collect());
    }
    Ok(text_values(series)?
        .into_iter()
        .map(|v| v.map(serde_json::Value::String))
        .collect())
}
