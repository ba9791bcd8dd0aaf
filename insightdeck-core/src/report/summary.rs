//! Rows of the dataset-statistics and per-variable tables.

use crate::data::{TableStats, VariableKind, VariableStats};
use crate::error::DataError;
use polars::prelude::DataFrame;

/// Background of a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShade {
    /// Bold text on light grey.
    Header,
    /// Whitesmoke.
    Light,
    /// Light grey.
    Dark,
}

impl RowShade {
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            RowShade::Light => (245, 245, 245),
            RowShade::Header | RowShade::Dark => (211, 211, 211),
        }
    }
}

/// A titled grid of text cells.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub title: String,
    pub column_weights: Vec<usize>,
    pub rows: Vec<Vec<String>>,
    pub header_rows: Vec<usize>,
}

impl SummaryTable {
    /// Row 0 and any listed header rows are headers; the rest alternate light/dark.
    pub fn shade(&self, row: usize) -> RowShade {
        if row == 0 || self.header_rows.contains(&row) {
            RowShade::Header
        } else if (row - 1) % 2 == 0 {
            RowShade::Light
        } else {
            RowShade::Dark
        }
    }
}

fn kib(bytes: f64) -> String {
    format!("{:.1} KiB", bytes / 1024.0)
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Dataset-level statistics followed by the variable type breakdown.
pub fn dataset_table(stats: &TableStats) -> SummaryTable {
    let mut rows = vec![
        vec!["Dataset statistics".to_string(), String::new()],
        vec!["Number of variables".to_string(), stats.n_vars.to_string()],
        vec!["Number of observations".to_string(), stats.n_obs.to_string()],
        vec!["Missing cells".to_string(), stats.n_cells_missing.to_string()],
        vec!["Missing cells (%)".to_string(), percent(stats.p_cells_missing)],
        vec!["Duplicate rows".to_string(), stats.n_duplicates.to_string()],
        vec!["Duplicate rows (%)".to_string(), percent(stats.p_duplicates)],
        vec!["Total size in memory".to_string(), kib(stats.memory_size as f64)],
        vec![
            "Average record size in memory".to_string(),
            kib(stats.record_size),
        ],
        vec![String::new(), String::new()],
        vec!["Variable types".to_string(), String::new()],
    ];
    let types_header = rows.len() - 1;
    for kind in VariableKind::ALL {
        let count = stats.types.get(&kind).copied().unwrap_or(0);
        rows.push(vec![kind.to_string(), count.to_string()]);
    }
    SummaryTable {
        title: "Dataset Summary".to_string(),
        column_weights: vec![9, 5],
        rows,
        header_rows: vec![0, types_header],
    }
}

/// One row per variable: distinct, missing, memory and declared type.
pub fn variable_table(variables: &[VariableStats]) -> SummaryTable {
    let mut rows = vec![
        [
            "Variable",
            "Distinct",
            "Distinct (%)",
            "Missing",
            "Missing (%)",
            "Memory",
            "Type",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>(),
    ];
    rows.extend(variables.iter().map(|v| {
        vec![
            v.name.clone(),
            v.n_distinct.to_string(),
            percent(v.p_distinct),
            v.n_missing.to_string(),
            percent(v.p_missing),
            kib(v.memory_size as f64),
            v.dtype.clone(),
        ]
    }));
    SummaryTable {
        title: "Variable Summary".to_string(),
        column_weights: vec![8, 4, 5, 4, 5, 6, 6],
        rows,
        header_rows: vec![0],
    }
}

/// Both summary tables, computed over the full dataset.
pub fn summary_tables(df: &DataFrame) -> Result<[SummaryTable; 2], DataError> {
    let stats = TableStats::compute(df)?;
    let variables = df
        .get_columns()
        .iter()
        .map(|c| VariableStats::compute(c.as_materialized_series()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok([dataset_table(&stats), variable_table(&variables)])
}
