//! Chart materialization with `plotters`.
//!
//! Each chart is drawn into its own [`Figure`], an owned pixel buffer that is
//! acquired for that chart alone and consumed when turned into an image, so no
//! drawing state outlives a single chart.

use super::spec::{Aggregation, ChartKind, ChartSpec};
use crate::config::ChartConfig;
use crate::data::{numeric_values, text_values};
use crate::error::ChartError;
use image::RgbImage;
use indexmap::IndexMap;
use plotters::coord::Shift;
use plotters::prelude::*;
use polars::prelude::DataFrame;
use std::ops::Range;
use tracing::{debug, warn};

const SERIES_COLOR: RGBColor = RGBColor(31, 119, 180);
const HISTOGRAM_BINS: usize = 10;

/// A chart image paired with the planner's description of it.
#[derive(Debug, Clone)]
pub struct RenderedChart {
    pub id: String,
    pub image: RgbImage,
    pub description: String,
}

/// Owned RGB canvas for exactly one chart.
pub struct Figure {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Figure {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![255; width as usize * height as usize * 3],
        }
    }

    /// Run `draw` against a drawing area backed by this figure's pixels.
    pub fn draw<F>(&mut self, draw: F) -> Result<(), ChartError>
    where
        F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<(), ChartError>,
    {
        let root =
            BitMapBackend::with_buffer(&mut self.pixels, (self.width, self.height)).into_drawing_area();
        draw(&root)?;
        root.present().map_err(|e| ChartError::Draw {
            chart: String::new(),
            message: e.to_string(),
        })
    }

    /// Release the canvas as an image.
    pub fn into_image(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels)
    }
}

/// Data ready to draw, after validation and aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Bars {
        labels: Vec<String>,
        values: Vec<f64>,
    },
    Points {
        points: Vec<(f64, f64)>,
        /// Category names when `x` is not numeric; point `i` sits at `x = i`.
        x_labels: Option<Vec<String>>,
        connect: bool,
    },
    Histogram {
        edges: Vec<f64>,
        counts: Vec<usize>,
    },
}

/// Validate `spec` against `df` and compute what to draw.
pub fn prepare(spec: &ChartSpec, df: &DataFrame, max_categories: usize) -> Result<ChartData, ChartError> {
    spec.validate(df)?;
    let no_data = || ChartError::NoData {
        chart: spec.id.clone(),
    };
    let column = |name: &str| {
        df.column(name)
            .map(|c| c.as_materialized_series().clone())
            .map_err(|_| ChartError::UnknownColumn {
                chart: spec.id.clone(),
                column: name.to_string(),
            })
    };
    let numeric = |name: &str| -> Result<Vec<Option<f64>>, ChartError> {
        numeric_values(&column(name)?)
            .map_err(|e| ChartError::Draw {
                chart: spec.id.clone(),
                message: e.to_string(),
            })?
            .ok_or_else(|| ChartError::NonNumericColumn {
                chart: spec.id.clone(),
                column: name.to_string(),
            })
    };
    let text = |name: &str| -> Result<Vec<Option<String>>, ChartError> {
        text_values(&column(name)?).map_err(|e| ChartError::Draw {
            chart: spec.id.clone(),
            message: e.to_string(),
        })
    };

    let plot = &spec.plot;
    let data = match plot.kind {
        ChartKind::Bar => {
            let keys = text(&plot.x)?;
            let aggregation = plot.bar_aggregation();
            let ys = match (&plot.y, aggregation) {
                (Some(y), Aggregation::Sum | Aggregation::Mean) => Some(numeric(y)?),
                _ => None,
            };
            let mut groups: IndexMap<String, (f64, usize)> = IndexMap::new();
            for (row, key) in keys.into_iter().enumerate() {
                let Some(key) = key else { continue };
                let value = match &ys {
                    Some(ys) => match ys[row] {
                        Some(v) => v,
                        None => continue,
                    },
                    None => 0.0,
                };
                if !groups.contains_key(&key) && groups.len() >= max_categories {
                    continue;
                }
                let entry = groups.entry(key).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
            let (labels, values) = groups
                .into_iter()
                .map(|(label, (sum, count))| {
                    let value = match aggregation {
                        Aggregation::Count => count as f64,
                        Aggregation::Sum => sum,
                        Aggregation::Mean => sum / count as f64,
                    };
                    (label, value)
                })
                .unzip();
            ChartData::Bars { labels, values }
        }
        ChartKind::Line | ChartKind::Scatter => {
            let y_name = plot.y.as_deref().ok_or_else(|| ChartError::MissingAxis {
                chart: spec.id.clone(),
                axis: "y".to_string(),
            })?;
            let ys = numeric(y_name)?;
            let connect = plot.kind == ChartKind::Line;
            match numeric_values(&column(&plot.x)?).ok().flatten() {
                Some(xs) => {
                    let mut points: Vec<(f64, f64)> = xs
                        .into_iter()
                        .zip(ys)
                        .filter_map(|(x, y)| Some((x?, y?)))
                        .collect();
                    if connect {
                        points.sort_by(|a, b| a.0.total_cmp(&b.0));
                    }
                    ChartData::Points {
                        points,
                        x_labels: None,
                        connect,
                    }
                }
                None => {
                    let mut labels = Vec::new();
                    let mut points = Vec::new();
                    for (x, y) in text(&plot.x)?.into_iter().zip(ys) {
                        if let (Some(x), Some(y)) = (x, y) {
                            points.push((labels.len() as f64, y));
                            labels.push(x);
                        }
                    }
                    ChartData::Points {
                        points,
                        x_labels: Some(labels),
                        connect,
                    }
                }
            }
        }
        ChartKind::Histogram => {
            let values: Vec<f64> = numeric(&plot.x)?.into_iter().flatten().collect();
            if values.is_empty() {
                return Err(no_data());
            }
            let (edges, counts) = histogram(&values, HISTOGRAM_BINS);
            ChartData::Histogram { edges, counts }
        }
    };

    let empty = match &data {
        ChartData::Bars { values, .. } => values.is_empty(),
        ChartData::Points { points, .. } => points.is_empty(),
        ChartData::Histogram { counts, .. } => counts.is_empty(),
    };
    if empty {
        return Err(no_data());
    }
    Ok(data)
}

/// Equal-width bins over the value range; the top edge is inclusive.
pub fn histogram(values: &[f64], bins: usize) -> (Vec<f64>, Vec<usize>) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if (max - min).abs() < f64::EPSILON {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };
    let width = (hi - lo) / bins as f64;
    let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0; bins];
    for v in values {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    (edges, counts)
}

/// Draw one chart into a fresh figure.
///
/// Falls back to a text-free drawing when captions or labels cannot be
/// rendered, e.g. when no system fonts are installed.
pub fn render_chart(spec: &ChartSpec, df: &DataFrame, config: &ChartConfig) -> Result<RgbImage, ChartError> {
    let data = prepare(spec, df, config.max_categories)?;

    let mut figure = Figure::new(config.width_px, config.height_px);
    let labelled = figure.draw(|root| draw_chart(root, spec, &data, true));
    let figure = match labelled {
        Ok(()) => figure,
        Err(e) => {
            warn!(chart = %spec.id, error = %e, "Chart text failed to render; retrying without labels");
            let mut plain = Figure::new(config.width_px, config.height_px);
            plain.draw(|root| draw_chart(root, spec, &data, false))?;
            plain
        }
    };

    figure.into_image().ok_or_else(|| ChartError::Draw {
        chart: spec.id.clone(),
        message: "figure buffer has the wrong size".to_string(),
    })
}

/// Render every planned chart, skipping the ones that fail.
pub fn render_all(
    visuals: &IndexMap<String, ChartSpec>,
    df: &DataFrame,
    config: &ChartConfig,
) -> Vec<RenderedChart> {
    let mut rendered = Vec::with_capacity(visuals.len());
    for (id, spec) in visuals {
        match render_chart(spec, df, config) {
            Ok(image) => {
                debug!(chart = %id, kind = %spec.plot.kind, "Chart rendered");
                rendered.push(RenderedChart {
                    id: id.clone(),
                    image,
                    description: spec.description.clone(),
                });
            }
            Err(e) => warn!(chart = %id, error = %e, "Skipping chart"),
        }
    }
    rendered
}

fn draw_error(chart: &str, e: impl std::fmt::Display) -> ChartError {
    ChartError::Draw {
        chart: chart.to_string(),
        message: e.to_string(),
    }
}

/// Axis range around `lo..hi` with a 5% margin.
fn padded(lo: f64, hi: f64) -> Range<f64> {
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 1.0)..(hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad)..(hi + pad)
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn draw_chart(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    spec: &ChartSpec,
    data: &ChartData,
    with_text: bool,
) -> Result<(), ChartError> {
    let id = spec.id.as_str();
    root.fill(&WHITE).map_err(|e| draw_error(id, e))?;

    let title = spec
        .plot
        .title
        .clone()
        .unwrap_or_else(|| format!("{} of {}", spec.plot.kind, spec.plot.x));
    let y_desc = spec.plot.y.clone().unwrap_or_else(|| "count".to_string());

    let mut builder = ChartBuilder::on(root);
    builder.margin(16);
    if with_text {
        builder
            .caption(&title, ("sans-serif", 24))
            .x_label_area_size(48)
            .y_label_area_size(64);
    }

    match data {
        ChartData::Bars { labels, values } => {
            let (lo, hi) = extent(values.iter().copied().chain([0.0]));
            let mut chart = builder
                .build_cartesian_2d((0u32..labels.len() as u32).into_segmented(), padded(lo, hi))
                .map_err(|e| draw_error(id, e))?;
            if with_text {
                let label_of = |v: &SegmentValue<u32>| match v {
                    SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
                    _ => String::new(),
                };
                chart
                    .configure_mesh()
                    .disable_x_mesh()
                    .x_labels(labels.len())
                    .x_label_formatter(&label_of)
                    .x_desc(spec.plot.x.as_str())
                    .y_desc(y_desc.as_str())
                    .draw()
                    .map_err(|e| draw_error(id, e))?;
            }
            chart
                .draw_series(
                    Histogram::vertical(&chart)
                        .style(SERIES_COLOR.filled())
                        .margin(8)
                        .data(values.iter().enumerate().map(|(i, v)| (i as u32, *v))),
                )
                .map_err(|e| draw_error(id, e))?;
        }
        ChartData::Points {
            points,
            x_labels,
            connect,
        } => {
            let (x_lo, x_hi) = extent(points.iter().map(|p| p.0));
            let (y_lo, y_hi) = extent(points.iter().map(|p| p.1));
            let mut chart = builder
                .build_cartesian_2d(padded(x_lo, x_hi), padded(y_lo, y_hi))
                .map_err(|e| draw_error(id, e))?;
            if with_text {
                let category_of = |x: &f64| match x_labels {
                    Some(labels) if x.fract().abs() < 1e-9 && *x >= 0.0 => {
                        labels.get(*x as usize).cloned().unwrap_or_default()
                    }
                    Some(_) => String::new(),
                    None => format!("{}", x),
                };
                let mut mesh = chart.configure_mesh();
                mesh.x_desc(spec.plot.x.as_str()).y_desc(y_desc.as_str());
                if x_labels.is_some() {
                    mesh.x_label_formatter(&category_of);
                }
                mesh.draw().map_err(|e| draw_error(id, e))?;
            }
            if *connect {
                chart
                    .draw_series(LineSeries::new(points.iter().copied(), SERIES_COLOR.stroke_width(2)))
                    .map_err(|e| draw_error(id, e))?;
            }
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 3, SERIES_COLOR.filled())),
                )
                .map_err(|e| draw_error(id, e))?;
        }
        ChartData::Histogram { edges, counts } => {
            let max_count = counts.iter().copied().max().unwrap_or(0) as f64;
            let x_range = edges[0]..edges[edges.len() - 1];
            let mut chart = builder
                .build_cartesian_2d(x_range, 0.0..(max_count * 1.1).max(1.0))
                .map_err(|e| draw_error(id, e))?;
            if with_text {
                chart
                    .configure_mesh()
                    .x_desc(spec.plot.x.as_str())
                    .y_desc("count")
                    .draw()
                    .map_err(|e| draw_error(id, e))?;
            }
            chart
                .draw_series(counts.iter().enumerate().map(|(i, &count)| {
                    Rectangle::new(
                        [(edges[i], 0.0), (edges[i + 1], count as f64)],
                        SERIES_COLOR.mix(0.85).filled(),
                    )
                }))
                .map_err(|e| draw_error(id, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::spec::PlotSpec;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn frame() -> DataFrame {
        df![
            "region" => ["N", "S", "N", "E"],
            "units" => [3i64, 5, 2, 7],
            "price" => [Some(1.5), Some(2.0), None, Some(4.0)],
        ]
        .unwrap()
    }

    fn spec(kind: ChartKind, x: &str, y: Option<&str>, aggregation: Option<Aggregation>) -> ChartSpec {
        ChartSpec {
            id: "c".into(),
            plot: PlotSpec {
                kind,
                x: x.into(),
                y: y.map(Into::into),
                aggregation,
                title: Some("Test".into()),
            },
            description: "desc".into(),
        }
    }

    #[test]
    fn test_prepare_bar_sum_first_seen_order() {
        let data = prepare(&spec(ChartKind::Bar, "region", Some("units"), None), &frame(), 25).unwrap();
        assert_eq!(
            data,
            ChartData::Bars {
                labels: vec!["N".into(), "S".into(), "E".into()],
                values: vec![5.0, 5.0, 7.0],
            }
        );
    }

    #[test]
    fn test_prepare_bar_mean_skips_missing() {
        let data = prepare(
            &spec(ChartKind::Bar, "region", Some("price"), Some(Aggregation::Mean)),
            &frame(),
            25,
        )
        .unwrap();
        assert_eq!(
            data,
            ChartData::Bars {
                labels: vec!["N".into(), "S".into(), "E".into()],
                values: vec![1.5, 2.0, 4.0],
            }
        );
    }

    #[test]
    fn test_prepare_bar_count_caps_categories() {
        let data = prepare(&spec(ChartKind::Bar, "region", None, None), &frame(), 2).unwrap();
        assert_eq!(
            data,
            ChartData::Bars {
                labels: vec!["N".into(), "S".into()],
                values: vec![2.0, 1.0],
            }
        );
    }

    #[test]
    fn test_prepare_line_sorts_numeric_x() {
        let data = prepare(&spec(ChartKind::Line, "units", Some("price"), None), &frame(), 25).unwrap();
        assert_eq!(
            data,
            ChartData::Points {
                points: vec![(3.0, 1.5), (5.0, 2.0), (7.0, 4.0)],
                x_labels: None,
                connect: true,
            }
        );
    }

    #[test]
    fn test_prepare_scatter_categorical_x() {
        let data = prepare(&spec(ChartKind::Scatter, "region", Some("units"), None), &frame(), 25).unwrap();
        match data {
            ChartData::Points {
                points, x_labels, ..
            } => {
                assert_eq!(points[3], (3.0, 7.0));
                assert_eq!(x_labels.unwrap()[3], "E");
            }
            other => panic!("Expected points, got {other:?}"),
        }
    }

    #[test]
    fn test_prepare_rejects_unknown_column() {
        let err = prepare(&spec(ChartKind::Histogram, "ghost", None, None), &frame(), 25).unwrap_err();
        assert!(matches!(err, ChartError::UnknownColumn { .. }));
    }

    #[test]
    fn test_prepare_all_missing_is_no_data() {
        let df = df!["v" => [None::<f64>, None]].unwrap();
        let err = prepare(&spec(ChartKind::Histogram, "v", None, None), &df, 25).unwrap_err();
        assert!(matches!(err, ChartError::NoData { .. }));
    }

    #[test]
    fn test_histogram_bins() {
        let (edges, counts) = histogram(&[0.0, 1.0, 2.0, 10.0], 10);
        assert_eq!(edges.len(), 11);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[10], 10.0);
        assert_eq!(counts.iter().sum::<usize>(), 4);
        assert_eq!(counts[0], 1);
        assert_eq!(counts[9], 1);
    }

    #[test]
    fn test_histogram_constant_values() {
        let (edges, counts) = histogram(&[4.0, 4.0], 10);
        assert_eq!(edges[0], 3.5);
        assert_eq!(counts.iter().sum::<usize>(), 2);
    }

    #[test]
    fn test_render_chart_produces_sized_image() {
        let config = ChartConfig {
            width_px: 320,
            height_px: 240,
            ..ChartConfig::default()
        };
        let image = render_chart(&spec(ChartKind::Histogram, "units", None, None), &frame(), &config).unwrap();
        assert_eq!(image.dimensions(), (320, 240));
    }

    #[test]
    fn test_render_all_skips_invalid_specs() {
        let mut visuals = IndexMap::new();
        visuals.insert("good".to_string(), spec(ChartKind::Bar, "region", None, None));
        visuals.insert("bad".to_string(), spec(ChartKind::Bar, "nope", None, None));
        visuals.insert("also_good".to_string(), spec(ChartKind::Scatter, "units", Some("price"), None));
        let config = ChartConfig {
            width_px: 200,
            height_px: 150,
            ..ChartConfig::default()
        };
        let rendered = render_all(&visuals, &frame(), &config);
        let ids: Vec<&str> = rendered.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "also_good"]);
        assert_eq!(rendered[0].description, "desc");
    }
}
