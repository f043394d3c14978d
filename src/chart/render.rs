//! # Chart Rendering
//!
//! Draws impedance against frequency as a line with circular markers on a
//! single A4 landscape PDF page.

use std::f32::consts::PI;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rgb,
    TextMatrix,
};
use tracing::info;

use super::source::{find_latest_workbook, load_series, ImpedancePoint};
use crate::error::{BridgeError, Result};

const PAGE_WIDTH_MM: f32 = 297.0;
const PAGE_HEIGHT_MM: f32 = 210.0;

const MARGIN_LEFT_MM: f32 = 32.0;
const MARGIN_RIGHT_MM: f32 = 15.0;
const MARGIN_BOTTOM_MM: f32 = 30.0;
const MARGIN_TOP_MM: f32 = 28.0;

const TITLE_PT: f32 = 16.0;
const LABEL_PT: f32 = 11.0;
const TICK_PT: f32 = 8.0;

const MAJOR_TICK_MM: f32 = 2.5;
const MINOR_TICK_MM: f32 = 1.2;
const MINOR_PER_MAJOR: usize = 5;
const TARGET_TICKS: usize = 8;
const MAX_TICKS: f64 = 1000.0;

const X_TICK_LABEL_DEG: f32 = 45.0;
const Y_LABEL_DEG: f32 = 90.0;

const MARKER_RADIUS_MM: f32 = 1.1;
const MARKER_SEGMENTS: usize = 16;

/// Points to millimetres
const PT_TO_MM: f32 = 0.352_778;

/// Data range and tick layout along one axis
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Axis {
    /// Fit an axis around `values` with a small margin and round tick steps
    ///
    /// Non-finite values are ignored. The bounds stay finite even when the
    /// values span most of the `f64` range.
    pub fn fit(values: impl Iterator<Item = f64>) -> Self {
        let (mut lo, mut hi) = values
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

        if lo > hi {
            lo = 0.0;
            hi = 1.0;
        }
        if lo == hi {
            let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.1 };
            lo = (lo - pad).max(f64::MIN);
            hi = (hi + pad).min(f64::MAX);
        }

        // Halved before subtracting so `hi - lo` cannot overflow
        let margin = (hi / 2.0 - lo / 2.0) * 0.1;
        let lo = (lo - margin).max(f64::MIN);
        let hi = (hi + margin).min(f64::MAX);

        Self {
            min: lo,
            max: hi,
            step: nice_step(hi / TARGET_TICKS as f64 - lo / TARGET_TICKS as f64),
        }
    }

    /// Position of `value` as a fraction of the axis length
    pub fn fraction(&self, value: f64) -> f64 {
        (value / 2.0 - self.min / 2.0) / (self.max / 2.0 - self.min / 2.0)
    }

    /// Major tick values inside the axis range
    pub fn major_ticks(&self) -> Vec<f64> {
        ticks_between(self.min, self.max, self.step)
    }

    /// Minor tick values inside the axis range
    pub fn minor_ticks(&self) -> Vec<f64> {
        ticks_between(self.min, self.max, self.step / MINOR_PER_MAJOR as f64)
    }

    /// Tick label with as many decimals as the step needs
    pub fn label(&self, value: f64) -> String {
        let decimals = if self.step >= 1.0 {
            0
        } else {
            (-self.step.log10()).ceil() as usize
        };
        let text = format!("{:.*}", decimals, value);
        if text.starts_with('-') && text[1..].chars().all(|c| c == '0' || c == '.') {
            text[1..].to_string()
        } else {
            text
        }
    }
}

/// Round `raw` up to 1, 2 or 5 times a power of ten
pub fn nice_step(raw: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 1.0;
    }

    let magnitude = 10f64.powi(raw.log10().floor() as i32);
    let fraction = raw / magnitude;
    let nice = if fraction <= 1.0 {
        1.0
    } else if fraction <= 2.0 {
        2.0
    } else if fraction <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn ticks_between(min: f64, max: f64, step: f64) -> Vec<f64> {
    if !(min.is_finite() && max.is_finite() && step.is_finite()) || step <= 0.0 {
        return Vec::new();
    }

    let first = (min / step).ceil();
    let last = (max / step).floor();
    // Also rejects NaN from an overflowing division
    if !(last - first < MAX_TICKS) {
        return Vec::new();
    }

    (first as i64..=last as i64).map(|i| i as f64 * step).collect()
}

/// Replace path separators so the description is safe inside a file name
pub fn sanitize_description(description: &str) -> String {
    description
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

/// PDF path for a chart of `source`: `<stem>_<description>_plot.pdf` beside it
pub fn plot_file_name(source: &Path, description: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{}_{}_plot.pdf", stem, sanitize_description(description));
    source.with_file_name(name)
}

/// Chart title for `description`
pub fn chart_title(description: &str) -> String {
    format!("Frequency vs Impedance of {}", description.trim())
}

/// Plot area on the page plus the two axes
struct Frame {
    x: Axis,
    y: Axis,
    left: f32,
    bottom: f32,
    width: f32,
    height: f32,
}

impl Frame {
    fn new(points: &[ImpedancePoint]) -> Self {
        Self {
            x: Axis::fit(points.iter().map(|p| p.frequency_hz)),
            y: Axis::fit(points.iter().map(|p| p.impedance_ohms)),
            left: MARGIN_LEFT_MM,
            bottom: MARGIN_BOTTOM_MM,
            width: PAGE_WIDTH_MM - MARGIN_LEFT_MM - MARGIN_RIGHT_MM,
            height: PAGE_HEIGHT_MM - MARGIN_BOTTOM_MM - MARGIN_TOP_MM,
        }
    }

    fn page_x(&self, value: f64) -> f32 {
        self.left + self.x.fraction(value) as f32 * self.width
    }

    fn page_y(&self, value: f64) -> f32 {
        self.bottom + self.y.fraction(value) as f32 * self.height
    }

    fn right(&self) -> f32 {
        self.left + self.width
    }

    fn top(&self) -> f32 {
        self.bottom + self.height
    }
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn polyline(layer: &PdfLayerReference, points: &[(f32, f32)], closed: bool) {
    layer.add_line(Line {
        points: points
            .iter()
            .map(|&(x, y)| (Point::new(Mm(x), Mm(y)), false))
            .collect(),
        is_closed: closed,
    });
}

/// Rough width of Helvetica text, good enough for centring
fn text_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * size_pt * 0.5 * PT_TO_MM
}

fn centered_text(layer: &PdfLayerReference, font: &IndirectFontRef, text: &str, size: f32, x: f32, y: f32) {
    let width = text_width_mm(text, size);
    layer.use_text(text, size, Mm(x - width / 2.0), Mm(y), font);
}

/// Baseline start of text `width` long, rotated counter-clockwise by
/// `degrees`, that ends at (`x`, `y`)
fn rotated_text_start(width: f32, degrees: f32, x: f32, y: f32) -> (f32, f32) {
    let angle = degrees.to_radians();
    (x - width * angle.cos(), y - width * angle.sin())
}

/// Write `text` ending at (`x`, `y`), rotated counter-clockwise by `degrees`
fn rotated_text(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    text: &str,
    size: f32,
    (x, y): (f32, f32),
    degrees: f32,
) {
    let (sx, sy) = rotated_text_start(text_width_mm(text, size), degrees, x, y);
    layer.begin_text_section();
    layer.set_font(font, size);
    layer.set_text_matrix(TextMatrix::TranslateRotate(Mm(sx).into(), Mm(sy).into(), degrees));
    layer.write_text(text, font);
    layer.end_text_section();
}

fn draw_axes(layer: &PdfLayerReference, font: &IndirectFontRef, frame: &Frame) {
    layer.set_outline_color(rgb(0.0, 0.0, 0.0));
    layer.set_outline_thickness(0.8);
    polyline(
        layer,
        &[
            (frame.left, frame.bottom),
            (frame.right(), frame.bottom),
            (frame.right(), frame.top()),
            (frame.left, frame.top()),
        ],
        true,
    );

    layer.set_outline_thickness(0.4);
    for x in frame.x.minor_ticks() {
        let px = frame.page_x(x);
        polyline(layer, &[(px, frame.bottom), (px, frame.bottom + MINOR_TICK_MM)], false);
    }
    for y in frame.y.minor_ticks() {
        let py = frame.page_y(y);
        polyline(layer, &[(frame.left, py), (frame.left + MINOR_TICK_MM, py)], false);
    }

    layer.set_outline_thickness(0.8);
    for x in frame.x.major_ticks() {
        let px = frame.page_x(x);
        polyline(layer, &[(px, frame.bottom), (px, frame.bottom + MAJOR_TICK_MM)], false);
        let label = frame.x.label(x);
        rotated_text(layer, font, &label, TICK_PT, (px, frame.bottom - 3.0), X_TICK_LABEL_DEG);
    }
    for y in frame.y.major_ticks() {
        let py = frame.page_y(y);
        polyline(layer, &[(frame.left, py), (frame.left + MAJOR_TICK_MM, py)], false);
        let label = frame.y.label(y);
        let width = text_width_mm(&label, TICK_PT);
        layer.use_text(label, TICK_PT, Mm(frame.left - 2.0 - width), Mm(py - 1.0), font);
    }
}

fn draw_series(layer: &PdfLayerReference, frame: &Frame, points: &[ImpedancePoint]) {
    let page: Vec<(f32, f32)> = points
        .iter()
        .map(|p| (frame.page_x(p.frequency_hz), frame.page_y(p.impedance_ohms)))
        .collect();

    layer.set_outline_color(rgb(0.0, 0.0, 1.0));
    layer.set_outline_thickness(1.0);
    if page.len() > 1 {
        polyline(layer, &page, false);
    }

    for &(cx, cy) in &page {
        let circle: Vec<(f32, f32)> = (0..MARKER_SEGMENTS)
            .map(|i| {
                let angle = 2.0 * PI * i as f32 / MARKER_SEGMENTS as f32;
                (cx + MARKER_RADIUS_MM * angle.cos(), cy + MARKER_RADIUS_MM * angle.sin())
            })
            .collect();
        polyline(layer, &circle, true);
    }
}

/// Render `points` as a PDF chart titled `title` at `out`
///
///
/// Points with a non-finite coordinate are left out.
///
/// # Errors
///
/// - `EmptySeries` if no point is drawable
/// - `Io` if the file cannot be created
/// - `Chart` if the PDF cannot be built or written
pub fn render_pdf(points: &[ImpedancePoint], title: &str, out: &Path) -> Result<()> {
    let points: Vec<ImpedancePoint> = points
        .iter()
        .copied()
        .filter(ImpedancePoint::is_finite)
        .collect();
    if points.is_empty() {
        return Err(BridgeError::EmptySeries(out.to_path_buf()));
    }

    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Chart");
    let layer = doc.get_page(page).get_layer(layer);
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| BridgeError::Chart(e.to_string()))?;

    let frame = Frame::new(&points);
    layer.set_fill_color(rgb(0.0, 0.0, 0.0));

    centered_text(&layer, &font, title, TITLE_PT, frame.left + frame.width / 2.0, frame.top() + 12.0);
    centered_text(&layer, &font, "Frequency (Hz)", LABEL_PT, frame.left + frame.width / 2.0, frame.bottom - 18.0);

    let y_label = "Impedance (ohms)";
    let y_label_end = frame.bottom + (frame.height + text_width_mm(y_label, LABEL_PT)) / 2.0;
    rotated_text(&layer, &font, y_label, LABEL_PT, (frame.left - 18.0, y_label_end), Y_LABEL_DEG);

    draw_axes(&layer, &font, &frame);
    draw_series(&layer, &frame, &points);

    let mut writer = BufWriter::new(File::create(out)?);
    doc.save(&mut writer)
        .map_err(|e| BridgeError::Chart(e.to_string()))?;
    Ok(())
}

/// Chart the newest workbook in `dir` and return the PDF path
pub fn plot_latest(dir: &Path, description: &str) -> Result<PathBuf> {
    let source = find_latest_workbook(dir)?;
    info!("Plotting {}", source.display());

    let points = load_series(&source)?;
    let out = plot_file_name(&source, description);
    render_pdf(&points, &chart_title(description), &out)?;

    info!("Plot saved at: {}", out.display());
    Ok(out)
}
