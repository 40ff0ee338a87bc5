#![cfg(feature = "web")]
use crate::preview::SheetPreview;
use crate::theme::Palette;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chart types the UI can draw
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Points joined by a line
    Line,
    /// One vertical bar per point
    Bar,
    /// Unconnected points
    Scatter,
    /// Line with the area down to zero filled
    Area,
    /// Points in three dimensions
    Scatter3d,
    /// Height field over an x/z grid
    Surface,
}

impl ChartKind {
    pub const ALL: [ChartKind; 6] = [
        ChartKind::Line,
        ChartKind::Bar,
        ChartKind::Scatter,
        ChartKind::Area,
        ChartKind::Scatter3d,
        ChartKind::Surface,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Scatter => "scatter",
            ChartKind::Area => "area",
            ChartKind::Scatter3d => "scatter3d",
            ChartKind::Surface => "surface",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Line => "Line",
            ChartKind::Bar => "Bar",
            ChartKind::Scatter => "Scatter",
            ChartKind::Area => "Area",
            ChartKind::Scatter3d => "3D Scatter",
            ChartKind::Surface => "3D Surface",
        }
    }

    pub fn is_3d(&self) -> bool {
        matches!(self, ChartKind::Scatter3d | ChartKind::Surface)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChartError {
    #[error("There is no numeric data to plot")]
    Empty,

    #[error("Column {0:?} does not exist in this file")]
    UnknownColumn(String),

    #[error("A {0} chart needs a third column")]
    MissingColumn(&'static str),

    #[error("{0} charts are not available for uploaded files")]
    Unsupported(&'static str),

    #[error("Surface grid is {rows}x{cols} but the axes are {xs}x{zs}")]
    MismatchedLengths { rows: usize, cols: usize, xs: usize, zs: usize },

    #[error("Chart rendering failed: {0}")]
    Render(String),
}

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Width of the chart in pixels
    pub width: u32,
    /// Height of the chart in pixels
    pub height: u32,
    pub kind: ChartKind,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            x_label: "X".to_string(),
            y_label: "Y".to_string(),
            width: 640,
            height: 400,
            kind: ChartKind::Line,
        }
    }
}

/// Values to plot
#[derive(Clone, Debug, PartialEq)]
pub enum ChartData {
    Points(Vec<(f64, f64)>),
    Points3d(Vec<(f64, f64, f64)>),
    /// `heights[i][j]` is the height at `(xs[i], zs[j])`
    Grid {
        xs: Vec<f64>,
        zs: Vec<f64>,
        heights: Vec<Vec<f64>>,
    },
}

impl ChartData {
    fn is_empty(&self) -> bool {
        match self {
            ChartData::Points(p) => p.is_empty(),
            ChartData::Points3d(p) => p.is_empty(),
            ChartData::Grid { xs, zs, .. } => xs.is_empty() || zs.is_empty(),
        }
    }
}

/// A rendered chart ready to be embedded in a page
#[derive(Clone, Debug, Serialize)]
pub struct RenderedChart {
    pub kind: ChartKind,
    pub title: String,
    pub svg: String,
}

type ChartArea<'a> = DrawingArea<SVGBackend<'a>, plotters::coord::Shift>;

/// Renders `data` to an SVG document coloured from `palette`.
///
/// 2D kinds accept [`ChartData::Points`], `Scatter3d` accepts [`ChartData::Points3d`],
/// and `Surface` accepts [`ChartData::Grid`].
///
/// # Arguments
/// * `data` - Values to plot, shaped for `options.kind`
/// * `options` - Title, axis labels, size and chart kind
/// * `palette` - Colours of the active theme
///
/// # Returns
/// * `Result<String, ChartError>` - The SVG markup, or why the chart could not be drawn
///
/// # Implementation Notes
/// * Axes are scaled to the data range; bar and area charts always include zero
pub fn render(data: &ChartData, options: &ChartOptions, palette: &Palette) -> Result<String, ChartError> {
    if data.is_empty() {
        return Err(ChartError::Empty);
    }
    if let ChartData::Grid { xs, zs, heights } = data {
        let cols = heights.iter().map(Vec::len).min().unwrap_or(0);
        if heights.len() != xs.len() || heights.iter().any(|row| row.len() != zs.len()) {
            return Err(ChartError::MismatchedLengths {
                rows: heights.len(),
                cols,
                xs: xs.len(),
                zs: zs.len(),
            });
        }
    }

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height)).into_drawing_area();
        let drawn = root
            .fill(&hex_color(palette.surface))
            .map_err(|e| -> Box<dyn std::error::Error> { Box::new(e) })
            .and_then(|_| match (options.kind, data) {
                (ChartKind::Scatter3d, ChartData::Points3d(points)) => draw_scatter3d(&root, points, options, palette),
                (ChartKind::Surface, ChartData::Grid { xs, zs, heights }) => {
                    draw_surface(&root, xs, zs, heights, options, palette)
                }
                (kind, ChartData::Points(points)) if !kind.is_3d() => draw_2d(&root, points, options, palette),
                _ => Err(format!("{} chart cannot show this data", options.kind.label()).into()),
            })
            .and_then(|_| root.present().map_err(|e| -> Box<dyn std::error::Error> { Box::new(e) }));
        drawn.map_err(|e| ChartError::Render(e.to_string()))?;
    }

    Ok(svg)
}

/// Parses `#rrggbb`; anything else falls back to black
fn hex_color(hex: &str) -> RGBColor {
    let hex = hex.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(0)
    };
    if hex.len() != 6 {
        return RGBColor(0, 0, 0);
    }
    RGBColor(channel(0), channel(2), channel(4))
}

/// Axis range covering `values`, widened when all values are equal
fn span(values: impl Iterator<Item = f64>, include_zero: bool) -> std::ops::Range<f64> {
    let (mut min, mut max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if include_zero {
        min = min.min(0.0);
        max = max.max(0.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0)..(max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad)..(max + pad)
}

fn draw_2d(
    root: &ChartArea,
    data: &[(f64, f64)],
    options: &ChartOptions,
    palette: &Palette,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = hex_color(palette.text);
    let border = hex_color(palette.border);
    let series = hex_color(palette.chart_color(0));

    let filled = matches!(options.kind, ChartKind::Bar | ChartKind::Area);
    let x_range = match options.kind {
        // leave room for the outermost bars
        ChartKind::Bar => {
            let r = span(data.iter().map(|p| p.0), false);
            (r.start - 0.5)..(r.end + 0.5)
        }
        _ => span(data.iter().map(|p| p.0), false),
    };
    let y_range = span(data.iter().map(|p| p.1), filled);

    let mut chart = ChartBuilder::on(root)
        .caption(&options.title, ("sans-serif", 22).into_font().color(&text))
        .margin(12)
        .x_label_area_size(36)
        .y_label_area_size(48)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .axis_style(border)
        .label_style(("sans-serif", 12).into_font().color(&text))
        .axis_desc_style(("sans-serif", 13).into_font().color(&text))
        .draw()?;

    match options.kind {
        ChartKind::Line => {
            chart.draw_series(LineSeries::new(data.iter().copied(), series.stroke_width(2)))?;
            chart.draw_series(data.iter().map(|&(x, y)| Circle::new((x, y), 3, series.filled())))?;
        }
        ChartKind::Bar => {
            chart.draw_series(
                data.iter()
                    .map(|&(x, y)| Rectangle::new([(x - 0.4, 0.0), (x + 0.4, y)], series.filled())),
            )?;
        }
        ChartKind::Scatter => {
            chart.draw_series(data.iter().map(|&(x, y)| Circle::new((x, y), 5, series.filled())))?;
        }
        ChartKind::Area => {
            // Sort by x so the filled region doesn't fold over itself
            let mut sorted = data.to_vec();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
            chart.draw_series(AreaSeries::new(sorted, 0.0, series.mix(0.3)).border_style(series))?;
        }
        ChartKind::Scatter3d | ChartKind::Surface => {
            return Err(format!("{} is not a 2D chart", options.kind.label()).into());
        }
    }

    Ok(())
}

fn draw_scatter3d(
    root: &ChartArea,
    data: &[(f64, f64, f64)],
    options: &ChartOptions,
    palette: &Palette,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = hex_color(palette.text);
    let mut chart = ChartBuilder::on(root)
        .caption(&options.title, ("sans-serif", 22).into_font().color(&text))
        .margin(12)
        .build_cartesian_3d(
            span(data.iter().map(|p| p.0), false),
            span(data.iter().map(|p| p.1), false),
            span(data.iter().map(|p| p.2), false),
        )?;

    chart.with_projection(|mut pb| {
        pb.yaw = 0.6;
        pb.pitch = 0.3;
        pb.scale = 0.85;
        pb.into_matrix()
    });

    chart
        .configure_axes()
        .label_style(("sans-serif", 11).into_font().color(&text))
        .draw()?;

    for (i, &(x, y, z)) in data.iter().enumerate() {
        let color = hex_color(palette.chart_color(i % 3));
        chart.draw_series(std::iter::once(Circle::new((x, y, z), 4, color.filled())))?;
    }

    Ok(())
}

fn draw_surface(
    root: &ChartArea,
    xs: &[f64],
    zs: &[f64],
    heights: &[Vec<f64>],
    options: &ChartOptions,
    palette: &Palette,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = hex_color(palette.text);
    let series = hex_color(palette.chart_color(0));
    let height_at = |x: f64, z: f64| -> f64 {
        let i = xs.iter().position(|v| *v == x).unwrap_or(0);
        let j = zs.iter().position(|v| *v == z).unwrap_or(0);
        heights.get(i).and_then(|row| row.get(j)).copied().unwrap_or(0.0)
    };

    let mut chart = ChartBuilder::on(root)
        .caption(&options.title, ("sans-serif", 22).into_font().color(&text))
        .margin(12)
        .build_cartesian_3d(
            span(xs.iter().copied(), false),
            span(heights.iter().flatten().copied(), false),
            span(zs.iter().copied(), false),
        )?;

    chart.with_projection(|mut pb| {
        pb.yaw = 0.5;
        pb.pitch = 0.35;
        pb.scale = 0.8;
        pb.into_matrix()
    });

    chart
        .configure_axes()
        .label_style(("sans-serif", 11).into_font().color(&text))
        .draw()?;

    chart.draw_series(
        SurfaceSeries::xoz(xs.iter().copied(), zs.iter().copied(), height_at)
            .style(series.mix(0.45).filled()),
    )?;

    Ok(())
}

const DEMO_MONTHS: [&str; 8] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug"];
const DEMO_REVENUE: [f64; 8] = [4.2, 4.8, 5.1, 4.7, 5.6, 6.1, 6.4, 6.0];
const DEMO_CUSTOMERS: [f64; 8] = [120.0, 134.0, 141.0, 138.0, 152.0, 167.0, 171.0, 165.0];

/// Static sample data for the demo charts page
pub fn demo_series(kind: ChartKind) -> ChartData {
    match kind {
        ChartKind::Scatter => ChartData::Points(
            DEMO_CUSTOMERS
                .iter()
                .zip(DEMO_REVENUE.iter())
                .map(|(&c, &r)| (c, r))
                .collect(),
        ),
        ChartKind::Scatter3d => ChartData::Points3d(
            (0..DEMO_MONTHS.len())
                .map(|i| (i as f64 + 1.0, DEMO_REVENUE[i], DEMO_CUSTOMERS[i]))
                .collect(),
        ),
        ChartKind::Surface => {
            let xs: Vec<f64> = (0..=12).map(|i| -3.0 + i as f64 * 0.5).collect();
            let zs = xs.clone();
            let heights = xs
                .iter()
                .map(|x| zs.iter().map(|z| (x * x + z * z).sqrt().cos()).collect())
                .collect();
            ChartData::Grid { xs, zs, heights }
        }
        _ => ChartData::Points(
            DEMO_REVENUE
                .iter()
                .enumerate()
                .map(|(i, &r)| (i as f64 + 1.0, r))
                .collect(),
        ),
    }
}

fn demo_options(kind: ChartKind) -> ChartOptions {
    let (title, x_label, y_label) = match kind {
        ChartKind::Scatter => ("Customers vs Revenue", "Customers", "Revenue (k$)"),
        ChartKind::Scatter3d => ("Month, Revenue and Customers", "Month", "Revenue (k$)"),
        ChartKind::Surface => ("Sample Surface", "X", "Height"),
        ChartKind::Bar => ("Monthly Revenue", "Month", "Revenue (k$)"),
        ChartKind::Area => ("Revenue Trend", "Month", "Revenue (k$)"),
        ChartKind::Line => ("Revenue Over Time", "Month", "Revenue (k$)"),
    };
    ChartOptions {
        title: title.to_string(),
        x_label: x_label.to_string(),
        y_label: y_label.to_string(),
        kind,
        ..ChartOptions::default()
    }
}

/// One chart of every kind over the static sample data
///
/// # Arguments
/// * `palette` - Colours of the active theme
///
/// # Returns
/// * `Result<Vec<RenderedChart>, ChartError>` - Charts in [`ChartKind::ALL`] order
pub fn demo_gallery(palette: &Palette) -> Result<Vec<RenderedChart>, ChartError> {
    ChartKind::ALL
        .into_iter()
        .map(|kind| {
            let options = demo_options(kind);
            let svg = render(&demo_series(kind), &options, palette)?;
            Ok(RenderedChart {
                kind,
                title: options.title,
                svg,
            })
        })
        .collect()
}

/// Builds chart data from columns of an uploaded sheet.
///
/// When the x column is not numeric, rows are plotted against their position.
pub fn series_from_preview(
    preview: &SheetPreview,
    kind: ChartKind,
    x: &str,
    y: &str,
    z: Option<&str>,
) -> Result<ChartData, ChartError> {
    for column in [Some(x), Some(y), z].into_iter().flatten() {
        if preview.column_index(column).is_none() {
            return Err(ChartError::UnknownColumn(column.to_string()));
        }
    }

    let data = match kind {
        ChartKind::Surface => return Err(ChartError::Unsupported(kind.label())),
        ChartKind::Scatter3d => {
            let z = z.filter(|z| !z.is_empty()).ok_or(ChartError::MissingColumn(kind.label()))?;
            let rows = preview.numeric_rows(&[x, y, z]).unwrap_or_default();
            ChartData::Points3d(rows.into_iter().map(|r| (r[0], r[1], r[2])).collect())
        }
        _ => {
            let x_numeric = preview.numeric_column(x).is_some_and(|v| !v.is_empty());
            let points = if x_numeric {
                preview
                    .numeric_rows(&[x, y])
                    .unwrap_or_default()
                    .into_iter()
                    .map(|r| (r[0], r[1]))
                    .collect()
            } else {
                let yi = preview.column_index(y).unwrap_or(0);
                preview
                    .rows
                    .iter()
                    .enumerate()
                    .filter_map(|(i, row)| {
                        let value = row.get(yi)?.trim().parse::<f64>().ok()?;
                        Some((i as f64 + 1.0, value))
                    })
                    .collect()
            };
            ChartData::Points(points)
        }
    };

    if data.is_empty() {
        return Err(ChartError::Empty);
    }
    Ok(data)
}
