//! Chart rendering to PNG.

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::register_font;
use serde_json::{Map, Value};
use std::ops::Range;
use std::sync::OnceLock;

use crate::{AnalysisError, Dataset};

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 600;
const DEFAULT_BINS: usize = 10;
/// One bin per horizontal pixel at most.
const MAX_BINS: u64 = WIDTH as u64;
const BAR_WIDTH: f64 = 0.8;

const FONT_FAMILY: &str = "sans-serif";
const FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// A chart to draw, parsed from sub-task parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotRequest {
    Line { x: String, y: String },
    Bar { x: String, y: String },
    Scatter { x: String, y: String },
    Histogram { column: String, bins: usize },
}

impl PlotRequest {
    /// Parse `plot_type` and the fields that chart kind needs.
    pub fn from_params(params: &Map<String, Value>) -> Result<Self, AnalysisError> {
        let plot_type = params
            .get("plot_type")
            .and_then(Value::as_str)
            .ok_or(AnalysisError::MissingParameter {
                task: "plot",
                param: "plot_type",
            })?;

        match plot_type {
            "line" => Ok(Self::Line {
                x: required(params, "x")?,
                y: required(params, "y")?,
            }),
            "bar" => Ok(Self::Bar {
                x: required(params, "x")?,
                y: required(params, "y")?,
            }),
            "scatter" => Ok(Self::Scatter {
                x: required(params, "x")?,
                y: required(params, "y")?,
            }),
            "histogram" => Ok(Self::Histogram {
                column: required(params, "column")?,
                bins: bins(params)?,
            }),
            other => Err(AnalysisError::UnsupportedPlotType(other.to_string())),
        }
    }

    /// Chart title.
    pub fn title(&self) -> String {
        match self {
            Self::Line { x, y } => format!("Line Plot of {y} vs {x}"),
            Self::Bar { x, y } => format!("Bar Chart of {y} vs {x}"),
            Self::Scatter { x, y } => format!("Scatter Plot of {y} vs {x}"),
            Self::Histogram { column, .. } => format!("Histogram of {column}"),
        }
    }
}

fn required(params: &Map<String, Value>, key: &'static str) -> Result<String, AnalysisError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(AnalysisError::MissingParameter {
            task: "plot",
            param: key,
        })
}

fn bins(params: &Map<String, Value>) -> Result<usize, AnalysisError> {
    let invalid = |reason: &str| AnalysisError::InvalidParameter {
        param: "bins",
        reason: reason.to_string(),
    };

    match params.get("bins") {
        None | Some(Value::Null) => Ok(DEFAULT_BINS),
        Some(Value::Number(n)) => {
            let bins = match n.as_u64() {
                Some(bins) => bins,
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f > 0.0 => f as u64,
                    _ => return Err(invalid("must be a positive integer")),
                },
            };
            if bins == 0 {
                return Err(invalid("must be a positive integer"));
            }
            if bins > MAX_BINS {
                return Err(invalid(&format!("must be at most {MAX_BINS}")));
            }
            usize::try_from(bins).map_err(|_| invalid("too large"))
        }
        Some(_) => Err(invalid("must be a positive integer")),
    }
}

/// Render the requested chart and return PNG bytes.
pub fn render(dataset: &Dataset, request: &PlotRequest) -> Result<Vec<u8>, AnalysisError> {
    load_font()?;

    let mut pixels = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let title = request.title();
        match request {
            PlotRequest::Line { x, y } => {
                let points = xy_points(dataset, x, y)?;
                draw_line(&root, &title, x, y, &points)?;
            }
            PlotRequest::Bar { x, y } => {
                let points = xy_points(dataset, x, y)?;
                draw_bars(&root, &title, x, y, &points)?;
            }
            PlotRequest::Scatter { x, y } => {
                let points = xy_points(dataset, x, y)?;
                draw_scatter(&root, &title, x, y, &points)?;
            }
            PlotRequest::Histogram { column, bins } => {
                let values = numeric_values(dataset, column)?;
                draw_histogram(&root, &title, column, &values, *bins)?;
            }
        }

        root.present().map_err(render_error)?;
    }

    encode_png(&pixels)
}

/// Register the embedded chart font with plotters, once per process.
fn load_font() -> Result<(), AnalysisError> {
    static LOADED: OnceLock<bool> = OnceLock::new();

    let loaded = LOADED.get_or_init(|| {
        register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES).is_ok()
    });
    if *loaded {
        Ok(())
    } else {
        Err(AnalysisError::Render("embedded font is invalid".to_string()))
    }
}

/// Points with both coordinates present. A text x axis uses row positions.
fn xy_points(dataset: &Dataset, x: &str, y: &str) -> Result<Vec<(f64, f64)>, AnalysisError> {
    let x_column = dataset.require_column(x)?;
    let y_column = dataset.require_column(y)?;
    let y_values = y_column
        .numeric()
        .ok_or_else(|| AnalysisError::NotNumeric(y.to_string()))?;

    let points = (0..dataset.row_count())
        .filter_map(|row| {
            let x_value = match x_column.numeric() {
                Some(values) => values.get(row).copied().flatten()?,
                None => {
                    x_column.label(row)?;
                    row as f64
                }
            };
            let y_value = y_values.get(row).copied().flatten()?;
            Some((x_value, y_value))
        })
        .collect::<Vec<_>>();

    if points.iter().any(|p| !p.0.is_finite()) {
        return Err(AnalysisError::NonFinite(x.to_string()));
    }
    if points.iter().any(|p| !p.1.is_finite()) {
        return Err(AnalysisError::NonFinite(y.to_string()));
    }

    Ok(points)
}

fn numeric_values(dataset: &Dataset, column: &str) -> Result<Vec<f64>, AnalysisError> {
    let values = dataset
        .require_column(column)?
        .numeric()
        .ok_or_else(|| AnalysisError::NotNumeric(column.to_string()))?;

    let values: Vec<f64> = values.iter().flatten().copied().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFinite(column.to_string()));
    }
    Ok(values)
}

fn draw_line(
    root: &Area<'_>,
    title: &str,
    x: &str,
    y: &str,
    points: &[(f64, f64)],
) -> Result<(), AnalysisError> {
    let x_range = padded_range(points.iter().map(|p| p.0), 0.0)?;
    let y_range = padded_range(points.iter().map(|p| p.1), 0.0)?;

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT_FAMILY, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc(x)
        .y_desc(y)
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(LineSeries::new(points.iter().copied(), &BLUE))
        .map_err(render_error)?;

    Ok(())
}

fn draw_scatter(
    root: &Area<'_>,
    title: &str,
    x: &str,
    y: &str,
    points: &[(f64, f64)],
) -> Result<(), AnalysisError> {
    let x_range = padded_range(points.iter().map(|p| p.0), 0.0)?;
    let y_range = padded_range(points.iter().map(|p| p.1), 0.0)?;

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT_FAMILY, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc(x)
        .y_desc(y)
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(
            points
                .iter()
                .map(|&(px, py)| Circle::new((px, py), 4, BLUE.filled())),
        )
        .map_err(render_error)?;

    Ok(())
}

fn draw_bars(
    root: &Area<'_>,
    title: &str,
    x: &str,
    y: &str,
    points: &[(f64, f64)],
) -> Result<(), AnalysisError> {
    let x_range = padded_range(points.iter().map(|p| p.0), BAR_WIDTH)?;
    // bars grow from zero
    let y_range = padded_range(points.iter().map(|p| p.1).chain([0.0]), 0.0)?;

    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT_FAMILY, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc(x)
        .y_desc(y)
        .draw()
        .map_err(render_error)?;

    let half = BAR_WIDTH / 2.0;
    chart
        .draw_series(points.iter().map(|&(px, py)| {
            Rectangle::new([(px - half, 0.0), (px + half, py)], BLUE.filled())
        }))
        .map_err(render_error)?;

    Ok(())
}

fn draw_histogram(
    root: &Area<'_>,
    title: &str,
    column: &str,
    values: &[f64],
    bins: usize,
) -> Result<(), AnalysisError> {
    let (edges, counts) = histogram(values, bins)?;
    let max_count = counts.iter().copied().max().unwrap_or(0).max(1) as f64;

    let x_range = edges[0]..edges[edges.len() - 1];
    let mut chart = ChartBuilder::on(root)
        .caption(title, (FONT_FAMILY, 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, 0.0..max_count * 1.1)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc(column)
        .y_desc("Frequency")
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(counts.iter().enumerate().map(|(i, &count)| {
            Rectangle::new([(edges[i], 0.0), (edges[i + 1], count as f64)], BLUE.filled())
        }))
        .map_err(render_error)?;

    Ok(())
}

/// Equal-width bin edges over the value range and the count per bin.
///
/// The last bin is closed on the right. An empty input covers `0..1` and a
/// constant one gets a small range centred on its value. Values must be
/// finite.
fn histogram(values: &[f64], bins: usize) -> Result<(Vec<f64>, Vec<usize>), AnalysisError> {
    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if values.is_empty() {
        lo = 0.0;
        hi = 1.0;
    } else if lo == hi {
        let half = (lo.abs() * 0.05).max(0.5);
        lo -= half;
        hi += half;
    }

    let width = (hi - lo) / bins as f64;
    if !width.is_finite() || width <= 0.0 {
        return Err(range_error());
    }
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

    let mut counts = vec![0usize; bins];
    for &value in values {
        let slot = (((value - lo) / width).floor() as usize).min(bins - 1);
        counts[slot] += 1;
    }

    Ok((edges, counts))
}

/// Range covering every value with a 5% margin on each side, and at least
/// `min_pad` around the extremes. An empty input gets `0..1`.
fn padded_range(
    values: impl Iterator<Item = f64>,
    min_pad: f64,
) -> Result<Range<f64>, AnalysisError> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        return Ok(0.0..1.0);
    }
    let mut pad = ((hi - lo) * 0.05).max(min_pad);
    if pad == 0.0 {
        pad = (lo.abs() * 0.05).max(1.0);
    }
    let range = (lo - pad)..(hi + pad);

    if range.start.is_finite() && range.end.is_finite() && range.start < range.end {
        Ok(range)
    } else {
        Err(range_error())
    }
}

fn range_error() -> AnalysisError {
    AnalysisError::Render("value range is too wide to plot".to_string())
}

fn encode_png(pixels: &[u8]) -> Result<Vec<u8>, AnalysisError> {
    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, WIDTH, HEIGHT);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header().map_err(render_error)?;
    writer.write_image_data(pixels).map_err(render_error)?;
    writer.finish().map_err(render_error)?;

    Ok(out)
}

fn render_error(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Render(e.to_string())
}
