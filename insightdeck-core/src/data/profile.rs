//! Deeper statistical profile of a dataset.
//!
//! Computed on a random sample of at most `sample_limit` rows. The table-level
//! and per-variable base statistics are also reused by the report's summary
//! tables, which compute them over the full dataset.

use super::{is_numeric, numeric_values, text_values};
use crate::config::ProfileConfig;
use crate::error::DataError;
use indexmap::IndexMap;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Broad variable categories used for type breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    Numeric,
    Categorical,
    Boolean,
    Text,
    DateTime,
}

impl VariableKind {
    pub const ALL: [VariableKind; 5] = [
        VariableKind::Numeric,
        VariableKind::Categorical,
        VariableKind::Boolean,
        VariableKind::Text,
        VariableKind::DateTime,
    ];

    pub fn of(dtype: &DataType) -> Self {
        if is_numeric(dtype) {
            return VariableKind::Numeric;
        }
        match dtype {
            DataType::Boolean => VariableKind::Boolean,
            DataType::Categorical(..) | DataType::Enum(..) => VariableKind::Categorical,
            DataType::Date | DataType::Datetime(..) => VariableKind::DateTime,
            _ => VariableKind::Text,
        }
    }
}

impl std::fmt::Display for VariableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableKind::Numeric => write!(f, "Numeric"),
            VariableKind::Categorical => write!(f, "Categorical"),
            VariableKind::Boolean => write!(f, "Boolean"),
            VariableKind::Text => write!(f, "Text"),
            VariableKind::DateTime => write!(f, "DateTime"),
        }
    }
}

/// Dataset-level statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub n_vars: usize,
    pub n_obs: usize,
    pub n_cells_missing: usize,
    pub p_cells_missing: f64,
    pub n_duplicates: usize,
    pub p_duplicates: f64,
    pub memory_size: usize,
    pub record_size: f64,
    pub types: IndexMap<VariableKind, usize>,
}

impl TableStats {
    pub fn compute(df: &DataFrame) -> Result<Self, DataError> {
        let n_obs = df.height();
        let n_vars = df.width();
        let n_cells = n_obs * n_vars;
        let n_cells_missing: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
        let n_duplicates = count_duplicate_rows(df)?;
        let memory_size = df.estimated_size();

        let mut types: IndexMap<VariableKind, usize> =
            VariableKind::ALL.iter().map(|k| (*k, 0)).collect();
        for dtype in df.dtypes() {
            *types.entry(VariableKind::of(&dtype)).or_insert(0) += 1;
        }

        Ok(Self {
            n_vars,
            n_obs,
            n_cells_missing,
            p_cells_missing: ratio(n_cells_missing, n_cells),
            n_duplicates,
            p_duplicates: ratio(n_duplicates, n_obs),
            memory_size,
            record_size: if n_obs > 0 {
                memory_size as f64 / n_obs as f64
            } else {
                0.0
            },
            types,
        })
    }
}

/// Base statistics shared by every variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableStats {
    pub name: String,
    pub dtype: String,
    pub kind: VariableKind,
    pub n_distinct: usize,
    pub p_distinct: f64,
    pub n_missing: usize,
    pub p_missing: f64,
    pub memory_size: usize,
}

impl VariableStats {
    pub fn compute(series: &Series) -> Result<Self, DataError> {
        let len = series.len();
        let non_null = series.drop_nulls();
        let n_distinct = if non_null.is_empty() {
            0
        } else {
            non_null.n_unique()?
        };
        let n_missing = series.null_count();
        Ok(Self {
            name: series.name().to_string(),
            dtype: series.dtype().to_string(),
            kind: VariableKind::of(series.dtype()),
            n_distinct,
            p_distinct: ratio(n_distinct, len),
            n_missing,
            p_missing: ratio(n_missing, len),
            memory_size: series.estimated_size(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub n_zeros: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableProfile {
    #[serde(flatten)]
    pub stats: VariableStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericStats>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_values: Vec<ValueCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub left: String,
    pub right: String,
    pub pearson: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    /// Row count of the dataset before sampling.
    pub source_rows: usize,
    /// Rows the profile was computed on.
    pub profiled_rows: usize,
    pub table: TableStats,
    pub variables: IndexMap<String, VariableProfile>,
    /// Pearson correlations between numeric variables, strongest first.
    pub correlations: Vec<Correlation>,
}

/// Profile `df`, sampling down to `config.sample_limit` rows first.
pub fn profile(df: &DataFrame, config: &ProfileConfig) -> Result<DatasetProfile, DataError> {
    let sampled;
    let frame = if df.height() > config.sample_limit {
        sampled = df.sample_n_literal(config.sample_limit, false, false, None)?;
        &sampled
    } else {
        df
    };

    let table = TableStats::compute(frame)?;

    let mut variables = IndexMap::with_capacity(frame.width());
    let mut numeric_columns: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for column in frame.get_columns() {
        let series = column.as_materialized_series();
        let stats = VariableStats::compute(series)?;
        let (numeric, top_values) = match numeric_values(series)? {
            Some(values) => {
                let numeric = numeric_stats(&values)?;
                numeric_columns.push((stats.name.clone(), values));
                (Some(numeric), Vec::new())
            }
            None if stats.kind == VariableKind::DateTime => (None, Vec::new()),
            None => (None, top_values(series, config.max_top_values)?),
        };
        variables.insert(
            stats.name.clone(),
            VariableProfile {
                stats,
                numeric,
                top_values,
            },
        );
    }

    Ok(DatasetProfile {
        source_rows: df.height(),
        profiled_rows: frame.height(),
        table,
        variables,
        correlations: correlations(&numeric_columns),
    })
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Rows identical to an earlier row, compared on their text rendering.
fn count_duplicate_rows(df: &DataFrame) -> Result<usize, DataError> {
    let columns = df
        .get_columns()
        .iter()
        .map(|c| text_values(c.as_materialized_series()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen: HashSet<Vec<Option<&str>>> = HashSet::with_capacity(df.height());
    let mut duplicates = 0;
    for row in 0..df.height() {
        let key: Vec<Option<&str>> = columns.iter().map(|col| col[row].as_deref()).collect();
        if !seen.insert(key) {
            duplicates += 1;
        }
    }
    Ok(duplicates)
}

fn numeric_stats(values: &[Option<f64>]) -> Result<NumericStats, DataError> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let ca = Float64Chunked::from_vec("values".into(), present.clone());

    let (skewness, kurtosis) = moments(&present);
    Ok(NumericStats {
        mean: ca.mean(),
        std: ca.std(1),
        min: ca.min(),
        q25: ca.quantile(0.25, QuantileMethod::Linear)?,
        median: ca.median(),
        q75: ca.quantile(0.75, QuantileMethod::Linear)?,
        max: ca.max(),
        skewness,
        kurtosis,
        n_zeros: present.iter().filter(|v| **v == 0.0).count(),
    })
}

/// Sample skewness and excess kurtosis from central moments.
fn moments(values: &[f64]) -> (Option<f64>, Option<f64>) {
    if values.len() < 2 {
        return (None, None);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - mean;
        m2 += d * d;
        m3 += d * d * d;
        m4 += d * d * d * d;
    }
    m2 /= n;
    m3 /= n;
    m4 /= n;
    if m2 <= f64::EPSILON {
        return (None, None);
    }
    (Some(m3 / m2.powf(1.5)), Some(m4 / (m2 * m2) - 3.0))
}

/// Most frequent non-missing values, ties in first-seen order.
fn top_values(series: &Series, limit: usize) -> Result<Vec<ValueCount>, DataError> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for value in text_values(series)?.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut ranked: Vec<ValueCount> = counts
        .into_iter()
        .map(|(value, count)| ValueCount { value, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    Ok(ranked)
}

fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    r.is_finite().then_some(r)
}

fn correlations(columns: &[(String, Vec<Option<f64>>)]) -> Vec<Correlation> {
    let mut out = Vec::new();
    for (i, (left, xs)) in columns.iter().enumerate() {
        for (right, ys) in &columns[i + 1..] {
            if let Some(r) = pearson(xs, ys) {
                out.push(Correlation {
                    left: left.clone(),
                    right: right.clone(),
                    pearson: r,
                });
            }
        }
    }
    out.sort_by(|a, b| b.pearson.abs().total_cmp(&a.pearson.abs()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_frame() -> DataFrame {
        df![
            "units" => [1i64, 2, 3, 4, 4],
            "revenue" => [10.0, 20.0, 30.0, 40.0, 40.0],
            "region" => ["N", "S", "N", "E", "E"],
            "active" => [true, false, true, true, true],
        ]
        .unwrap()
    }

    #[test]
    fn test_variable_kind_of() {
        assert_eq!(VariableKind::of(&DataType::Int64), VariableKind::Numeric);
        assert_eq!(VariableKind::of(&DataType::Float32), VariableKind::Numeric);
        assert_eq!(VariableKind::of(&DataType::Boolean), VariableKind::Boolean);
        assert_eq!(VariableKind::of(&DataType::String), VariableKind::Text);
        assert_eq!(
            VariableKind::of(&DataType::Datetime(TimeUnit::Milliseconds, None)),
            VariableKind::DateTime
        );
    }

    #[test]
    fn test_table_stats() {
        let df = sample_frame();
        let stats = TableStats::compute(&df).unwrap();
        assert_eq!(stats.n_vars, 4);
        assert_eq!(stats.n_obs, 5);
        assert_eq!(stats.n_cells_missing, 0);
        // The last row repeats the fourth
        assert_eq!(stats.n_duplicates, 1);
        assert!((stats.p_duplicates - 0.2).abs() < 1e-12);
        assert_eq!(stats.types[&VariableKind::Numeric], 2);
        assert_eq!(stats.types[&VariableKind::Text], 1);
        assert_eq!(stats.types[&VariableKind::Boolean], 1);
        assert_eq!(stats.types[&VariableKind::DateTime], 0);
        assert!(stats.memory_size > 0);
    }

    #[test]
    fn test_type_breakdown_keeps_fixed_order() {
        let df = df!["t" => ["a"]].unwrap();
        let stats = TableStats::compute(&df).unwrap();
        let order: Vec<VariableKind> = stats.types.keys().copied().collect();
        assert_eq!(order, VariableKind::ALL.to_vec());
    }

    #[test]
    fn test_variable_stats_missing_and_distinct() {
        let s = Series::new("score".into(), &[Some(1.0), None, Some(1.0), Some(2.0)]);
        let stats = VariableStats::compute(&s).unwrap();
        assert_eq!(stats.n_missing, 1);
        assert_eq!(stats.n_distinct, 2);
        assert!((stats.p_missing - 0.25).abs() < 1e-12);
        assert!((stats.p_distinct - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_profile_numeric_and_top_values() {
        let df = sample_frame();
        let profile = profile(&df, &ProfileConfig::default()).unwrap();
        assert_eq!(profile.source_rows, 5);
        assert_eq!(profile.profiled_rows, 5);

        let units = &profile.variables["units"];
        let numeric = units.numeric.as_ref().unwrap();
        assert_eq!(numeric.min, Some(1.0));
        assert_eq!(numeric.max, Some(4.0));
        assert_eq!(numeric.median, Some(3.0));
        assert!(units.top_values.is_empty());

        let region = &profile.variables["region"];
        assert!(region.numeric.is_none());
        assert_eq!(
            region.top_values[0],
            ValueCount {
                value: "N".into(),
                count: 2
            }
        );
        assert_eq!(region.top_values.len(), 3);
    }

    #[test]
    fn test_profile_samples_large_frames() {
        let df = df!["n" => (0..50i64).collect::<Vec<_>>()].unwrap();
        let config = ProfileConfig {
            sample_limit: 10,
            ..ProfileConfig::default()
        };
        let profile = profile(&df, &config).unwrap();
        assert_eq!(profile.source_rows, 50);
        assert_eq!(profile.profiled_rows, 10);
        assert_eq!(profile.table.n_obs, 10);
    }

    #[test]
    fn test_correlations_sorted_by_strength() {
        let df = df![
            "x" => [1.0, 2.0, 3.0, 4.0],
            "y" => [2.0, 4.0, 6.0, 8.0],
            "z" => [1.0, 3.0, 2.0, 1.0],
        ]
        .unwrap();
        let profile = profile(&df, &ProfileConfig::default()).unwrap();
        let first = &profile.correlations[0];
        assert_eq!((first.left.as_str(), first.right.as_str()), ("x", "y"));
        assert!((first.pearson - 1.0).abs() < 1e-9);
        assert_eq!(profile.correlations.len(), 3);
    }

    #[test]
    fn test_constant_column_has_no_correlation() {
        let df = df![
            "x" => [1.0, 2.0, 3.0],
            "c" => [5.0, 5.0, 5.0],
        ]
        .unwrap();
        let profile = profile(&df, &ProfileConfig::default()).unwrap();
        assert!(profile.correlations.is_empty());
        assert!(profile.variables["c"].numeric.as_ref().unwrap().skewness.is_none());
    }

    #[test]
    fn test_profile_serializes_to_json() {
        let df = sample_frame();
        let profile = profile(&df, &ProfileConfig::default()).unwrap();
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["table"]["n_obs"], 5);
        assert_eq!(json["variables"]["region"]["kind"], "Text");
        assert_eq!(json["table"]["types"]["Numeric"], 2);
    }
}
