//! Excel workbook loading via `calamine`.
//!
//! The first row of each sheet is the header. Each column is typed from its
//! non-empty cells: all numbers become `f64` (or `i64` when every cell is an
//! integer), all booleans become `bool`, all dates become millisecond
//! datetimes, and anything mixed falls back to text.

use crate::error::DataError;
use calamine::{Data, Reader, Sheets, open_workbook_auto};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Serial number of 1970-01-01 in the 1900 date system.
const UNIX_EPOCH_SERIAL: f64 = 25_569.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Read every sheet of the workbook at `path`, keyed by sheet name.
///
/// Sheets without a header row are skipped with a warning.
pub fn read_workbook(path: &Path) -> Result<Vec<(String, DataFrame)>, DataError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| DataError::Workbook {
        message: format!("Failed to open {}: {}", path.display(), e),
    })?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    let mut tables = Vec::with_capacity(sheet_names.len());
    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| DataError::Workbook {
                message: format!("Failed to read sheet '{}': {}", sheet_name, e),
            })?;
        let rows: Vec<&[Data]> = range.rows().collect();
        match frame_from_rows(sheet_name, &rows) {
            Ok(df) => tables.push((sheet_name.clone(), df)),
            Err(e @ DataError::EmptySheet { .. }) => warn!("{}", e),
            Err(e) => return Err(e),
        }
    }
    Ok(tables)
}

/// Build a frame from raw rows; the first row supplies column names.
pub(crate) fn frame_from_rows(sheet: &str, rows: &[&[Data]]) -> Result<DataFrame, DataError> {
    let Some((header, body)) = rows.split_first() else {
        return Err(DataError::EmptySheet {
            sheet: sheet.to_string(),
        });
    };

    let names = column_names(header);
    let mut columns = Vec::with_capacity(names.len());
    for (idx, name) in names.into_iter().enumerate() {
        let cells: Vec<&Data> = body
            .iter()
            .map(|row| row.get(idx).unwrap_or(&Data::Empty))
            .collect();
        columns.push(column_from_cells(&name, &cells)?);
    }
    Ok(DataFrame::new(columns)?)
}

/// Header labels with blanks replaced by `column_<n>` and repeats suffixed.
fn column_names(header: &[Data]) -> Vec<String> {
    let mut seen = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let raw = cell_text(cell)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("column_{}", idx + 1));
            let mut name = raw.clone();
            let mut n = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}.{}", raw, n);
                n += 1;
            }
            name
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Bool,
    DateTime,
    Text,
}

fn cell_kind(cell: &Data) -> Option<CellKind> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::Int(_) => Some(CellKind::Int),
        Data::Float(_) => Some(CellKind::Float),
        Data::Bool(_) => Some(CellKind::Bool),
        Data::DateTime(_) => Some(CellKind::DateTime),
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(_) | Data::DateTimeIso(_) | Data::DurationIso(_) => Some(CellKind::Text),
    }
}

/// The narrowest kind that holds every non-empty cell.
fn column_kind(cells: &[&Data]) -> CellKind {
    cells
        .iter()
        .filter_map(|c| cell_kind(c))
        .reduce(|acc, kind| match (acc, kind) {
            (a, b) if a == b => a,
            (CellKind::Int, CellKind::Float) | (CellKind::Float, CellKind::Int) => CellKind::Float,
            _ => CellKind::Text,
        })
        .unwrap_or(CellKind::Text)
}

fn column_from_cells(name: &str, cells: &[&Data]) -> Result<Column, DataError> {
    let series = match column_kind(cells) {
        CellKind::Int => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| match c {
                    Data::Int(i) => Some(*i),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::Float => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|c| match c {
                    Data::Int(i) => Some(*i as f64),
                    Data::Float(f) => Some(*f),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::Bool => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|c| match c {
                    Data::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::DateTime => {
            let millis: Vec<Option<i64>> = cells
                .iter()
                .map(|c| match c {
                    Data::DateTime(dt) => Some(serial_to_unix_millis(dt.as_f64())),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), millis)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        }
        CellKind::Text => {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|c| cell_kind(c).and(cell_text(c)))
                .collect();
            Series::new(name.into(), values)
        }
    };
    Ok(series.into())
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::DateTime(dt) => Some(dt.as_f64().to_string()),
        other => Some(other.to_string()),
    }
}

/// Convert an Excel serial date (1900 system) to Unix milliseconds.
pub(crate) fn serial_to_unix_millis(serial: f64) -> i64 {
    ((serial - UNIX_EPOCH_SERIAL) * MILLIS_PER_DAY).round() as i64
}
