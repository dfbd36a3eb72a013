#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Chart rendering for the penalty report.
//!
//! Charts are drawn with `plotters` into an in-memory RGB buffer, encoded as
//! PNG and returned as standard base64 text, ready to embed in a JSON
//! response. The font is compiled in, so rendering never depends on fonts
//! installed on the host.

use std::io::Cursor;
use std::sync::OnceLock;

use base64::Engine as _;
use image::{ImageFormat, RgbImage};
use plotters::prelude::*;
use plotters::style::{FontStyle, FontTransform, register_font};

/// Raster width in pixels.
pub const WIDTH: u32 = 1500;
/// Raster height in pixels.
pub const HEIGHT: u32 = 800;

const FONT_FAMILY: &str = "sans-serif";
const FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

const BAR_COLOR: RGBColor = RGBColor(135, 206, 235);
const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const GRID_COLOR: RGBColor = RGBColor(220, 220, 220);

/// Errors that can occur while rendering a chart.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    /// There was nothing to plot.
    #[error("Cannot render a chart with no data points")]
    EmptySeries,

    /// The embedded font could not be registered.
    #[error("Failed to load chart font")]
    Font,

    /// Drawing onto the raster failed.
    #[error("Chart drawing error: {0}")]
    Draw(String),

    /// The raster could not be encoded as PNG.
    #[error("Chart encoding error: {0}")]
    Encode(String),
}

/// Title and axis captions of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSpec {
    pub title: &'static str,
    pub x_desc: &'static str,
    pub y_desc: &'static str,
    /// Headroom added above the largest value on the y axis.
    pub y_margin: i64,
}

/// One labelled category and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesPoint {
    pub label: String,
    pub value: i64,
}

impl SeriesPoint {
    #[must_use]
    pub fn new(label: impl Into<String>, value: i64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Bar,
    Line,
}

/// Renders `series` as vertical bars, one per point in order.
///
/// # Errors
///
/// Returns [`ChartError::EmptySeries`] if `series` is empty, or another
/// [`ChartError`] if drawing or encoding fails.
pub fn render_bar_chart(spec: &ChartSpec, series: &[SeriesPoint]) -> Result<String, ChartError> {
    render(spec, series, Kind::Bar)
}

/// Renders `series` as a line with a marker at each point.
///
/// # Errors
///
/// Returns [`ChartError::EmptySeries`] if `series` is empty, or another
/// [`ChartError`] if drawing or encoding fails.
pub fn render_line_chart(spec: &ChartSpec, series: &[SeriesPoint]) -> Result<String, ChartError> {
    render(spec, series, Kind::Line)
}

fn render(spec: &ChartSpec, series: &[SeriesPoint], kind: Kind) -> Result<String, ChartError> {
    if series.is_empty() {
        return Err(ChartError::EmptySeries);
    }
    ensure_font()?;

    let mut buffer = vec![0u8; WIDTH as usize * HEIGHT as usize * 3];
    draw(&mut buffer, spec, series, kind)?;

    log::debug!(
        "Rendered {kind:?} chart '{}' with {} points",
        spec.title,
        series.len()
    );

    encode_png(buffer)
}

fn ensure_font() -> Result<(), ChartError> {
    static REGISTERED: OnceLock<bool> = OnceLock::new();

    let ok = *REGISTERED.get_or_init(|| {
        register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES)
            .inspect_err(|_| log::error!("Embedded chart font is invalid"))
            .is_ok()
    });

    if ok { Ok(()) } else { Err(ChartError::Font) }
}

fn draw(
    buffer: &mut [u8],
    spec: &ChartSpec,
    series: &[SeriesPoint],
    kind: Kind,
) -> Result<(), ChartError> {
    let count = u32::try_from(series.len())
        .map_err(|_| ChartError::Draw(format!("too many points: {}", series.len())))?;
    let max = series.iter().map(|p| p.value).max().unwrap_or(0);
    let y_top = max.saturating_add(spec.y_margin).max(1);

    let root = BitMapBackend::with_buffer(buffer, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title, (FONT_FAMILY, 32))
        .margin(20)
        .x_label_area_size(170)
        .y_label_area_size(90)
        .build_cartesian_2d((0u32..count).into_segmented(), 0i64..y_top)
        .map_err(draw_error)?;

    let label_for = |value: &SegmentValue<u32>| match value {
        SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => series
            .get(*i as usize)
            .map(|p| p.label.clone())
            .unwrap_or_default(),
        SegmentValue::Last => String::new(),
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .bold_line_style(&GRID_COLOR)
        .light_line_style(&WHITE)
        .x_desc(spec.x_desc)
        .y_desc(spec.y_desc)
        .axis_desc_style((FONT_FAMILY, 20))
        .x_labels(series.len())
        .x_label_formatter(&label_for)
        .x_label_style(
            (FONT_FAMILY, 14)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .y_label_style((FONT_FAMILY, 14))
        .draw()
        .map_err(draw_error)?;

    let points = series.iter().zip(0u32..);

    match kind {
        Kind::Bar => {
            chart
                .draw_series(
                    Histogram::vertical(&chart)
                        .style(BAR_COLOR.filled())
                        .margin(6)
                        .data(points.map(|(p, i)| (i, p.value))),
                )
                .map_err(draw_error)?;
        }
        Kind::Line => {
            chart
                .draw_series(LineSeries::new(
                    points
                        .clone()
                        .map(|(p, i)| (SegmentValue::CenterOf(i), p.value)),
                    LINE_COLOR.stroke_width(3),
                ))
                .map_err(draw_error)?;
            chart
                .draw_series(points.map(|(p, i)| {
                    Circle::new((SegmentValue::CenterOf(i), p.value), 5, LINE_COLOR.filled())
                }))
                .map_err(draw_error)?;
        }
    }

    root.present().map_err(draw_error)?;

    Ok(())
}

fn draw_error(e: impl std::fmt::Display) -> ChartError {
    ChartError::Draw(e.to_string())
}

fn encode_png(buffer: Vec<u8>) -> Result<String, ChartError> {
    let image = RgbImage::from_raw(WIDTH, HEIGHT, buffer)
        .ok_or_else(|| ChartError::Encode("raster size mismatch".to_string()))?;

    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| ChartError::Encode(e.to_string()))?;

    Ok(base64::engine::general_purpose::STANDARD.encode(png.into_inner()))
}
