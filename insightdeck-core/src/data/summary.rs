//! Basic per-column summary sent to the insight generator.

use super::json_values;
use crate::error::DataError;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
    pub n_missing: usize,
    /// Distinct non-missing values.
    pub n_unique: usize,
    /// Up to N distinct non-missing values in first-seen order.
    pub sample: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnSummary>,
}

/// Summarize every column of `df`, keeping up to `sample_values` samples each.
pub fn summarize(df: &DataFrame, sample_values: usize) -> Result<DatasetSummary, DataError> {
    let columns = df
        .get_columns()
        .iter()
        .map(|column| summarize_column(column.as_materialized_series(), sample_values))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DatasetSummary {
        n_rows: df.height(),
        n_cols: df.width(),
        columns,
    })
}

fn summarize_column(series: &Series, sample_values: usize) -> Result<ColumnSummary, DataError> {
    let non_null = series.drop_nulls();
    let n_unique = if non_null.is_empty() {
        0
    } else {
        non_null.n_unique()?
    };

    let mut sample: Vec<serde_json::Value> = Vec::with_capacity(sample_values);
    for value in json_values(&non_null)?.into_iter().flatten() {
        if sample.len() >= sample_values {
            break;
        }
        if !sample.contains(&value) {
            sample.push(value);
        }
    }

    Ok(ColumnSummary {
        name: series.name().to_string(),
        dtype: series.dtype().to_string(),
        n_missing: series.null_count(),
        n_unique,
        sample,
    })
}
