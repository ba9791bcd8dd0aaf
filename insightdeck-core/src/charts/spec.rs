//! Declarative chart specifications proposed by the chart planner.
//!
//! A spec names columns of the dataset; nothing in it is executed. Specs are
//! checked against the real columns before any drawing happens.

use crate::data::is_numeric;
use crate::error::ChartError;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Histogram,
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartKind::Bar => write!(f, "bar"),
            ChartKind::Line => write!(f, "line"),
            ChartKind::Scatter => write!(f, "scatter"),
            ChartKind::Histogram => write!(f, "histogram"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Count,
    Sum,
    Mean,
}

/// What to draw and from which columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSpec {
    pub kind: ChartKind,
    pub x: String,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub aggregation: Option<Aggregation>,
    #[serde(default)]
    pub title: Option<String>,
}

impl PlotSpec {
    /// Aggregation applied to bar charts: explicit, else sum of `y`, else row count.
    pub fn bar_aggregation(&self) -> Aggregation {
        match (self.aggregation, &self.y) {
            (Some(agg), Some(_)) => agg,
            (_, None) => Aggregation::Count,
            (None, Some(_)) => Aggregation::Sum,
        }
    }
}

/// One planned chart. `id` is the key the planner used for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(skip)]
    pub id: String,
    pub plot: PlotSpec,
    #[serde(default)]
    pub description: String,
}

impl ChartSpec {
    /// Check that every referenced column exists and has a usable type.
    pub fn validate(&self, df: &DataFrame) -> Result<(), ChartError> {
        let x_dtype = self.column_dtype(df, &self.plot.x)?;
        let y_dtype = match &self.plot.y {
            Some(y) => Some((y.as_str(), self.column_dtype(df, y)?)),
            None => None,
        };

        match self.plot.kind {
            ChartKind::Histogram => self.require_numeric(&self.plot.x, &x_dtype),
            ChartKind::Line | ChartKind::Scatter => match &y_dtype {
                Some((y, dtype)) => self.require_numeric(y, dtype),
                None => Err(ChartError::MissingAxis {
                    chart: self.id.clone(),
                    axis: "y".to_string(),
                }),
            },
            ChartKind::Bar => match (&y_dtype, self.plot.bar_aggregation()) {
                (Some((y, dtype)), Aggregation::Sum | Aggregation::Mean) => {
                    self.require_numeric(y, dtype)
                }
                _ => Ok(()),
            },
        }
    }

    fn column_dtype(&self, df: &DataFrame, column: &str) -> Result<DataType, ChartError> {
        df.column(column)
            .map(|c| c.dtype().clone())
            .map_err(|_| ChartError::UnknownColumn {
                chart: self.id.clone(),
                column: column.to_string(),
            })
    }

    fn require_numeric(&self, column: &str, dtype: &DataType) -> Result<(), ChartError> {
        if is_numeric(dtype) {
            Ok(())
        } else {
            Err(ChartError::NonNumericColumn {
                chart: self.id.clone(),
                column: column.to_string(),
            })
        }
    }
}
