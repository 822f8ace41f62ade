//! Overlay drawing for the annotated visualization raster.
//!
//! Geometry overlays are always drawn. Text (region numbers and the info
//! panel) needs a TrueType font and is skipped when the renderer has none.

use std::{f64::consts::PI, path::Path};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_line_segment_mut, draw_text_mut},
    point::Point,
};

use crate::{
    colors::{generate_contrasting_colors, region_color},
    ellipse::EllipseFit,
    error::{AnalysisError, Result},
    geometry::vertex_centroid,
    record::FeatureRecord,
};

const ELLIPSE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const MAJOR_AXIS_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const MINOR_AXIS_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const REFERENCE_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const OUTLINE_PALETTE_SIZE: usize = 8;
const ELLIPSE_SEGMENTS: usize = 90;

/// Dashed reference line: minimum half length, dash and gap in pixels.
const REFERENCE_MIN_HALF_LENGTH: f64 = 100.0;
const DASH_LENGTH: i32 = 10;
const GAP_LENGTH: i32 = 5;

/// Info panel layout in pixels.
pub const PANEL_LINE_HEIGHT: i32 = 30;
pub const PANEL_BLOCK_PADDING: i32 = 10;
pub const PANEL_TOP: i32 = 30;
pub const PANEL_WIDTH: i32 = 300;

const LABEL_SCALE: f32 = 28.0;
const PANEL_SCALE: f32 = 22.0;

/// Text shown for one region in the info panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelEntry {
    pub region_index: usize,
    pub lines: Vec<String>,
}

impl PanelEntry {
    /// Builds the panel text from a region's record so the displayed values
    /// are exactly the recorded ones.
    pub fn from_record(region_index: usize, record: &FeatureRecord) -> Self {
        let (major_axis, angle) = match (
            record.ellipse_major_axis_mm,
            record.ellipse_major_axis_angle,
        ) {
            (Some(mm), Some(angle)) => (
                format!("MajorAxis: {mm:.2} mm"),
                format!("Angle: {angle:.1} deg"),
            ),
            _ => ("N/A".to_string(), "N/A".to_string()),
        };

        Self {
            region_index,
            lines: vec![
                format!("ID: {region_index}"),
                format!("Area: {:.2} mm2", record.area_mm2),
                format!("Perimeter: {:.2} mm", record.perimeter_mm),
                major_axis,
                angle,
            ],
        }
    }
}

/// Vertical position of every panel line, stacked top to bottom.
pub fn panel_layout(entries: &[PanelEntry]) -> Vec<(i32, &str)> {
    let mut placed = Vec::new();
    let mut y_offset = PANEL_TOP;

    for entry in entries {
        for (i, line) in entry.lines.iter().enumerate() {
            if !line.is_empty() {
                placed.push((y_offset + i as i32 * PANEL_LINE_HEIGHT, line.as_str()));
            }
        }
        y_offset += entry.lines.len() as i32 * PANEL_LINE_HEIGHT + PANEL_BLOCK_PADDING;
    }

    placed
}

/// Draws region overlays onto a copy of the source image.
pub struct Renderer {
    font: Option<FontVec>,
    palette: Vec<Rgb<u8>>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Renderer {
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            palette: generate_contrasting_colors(OUTLINE_PALETTE_SIZE),
        }
    }

    /// Loads a TrueType/OpenType font for text overlays.
    pub fn with_font_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| AnalysisError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(Some(font)))
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draws one region: its outline, its number near the vertex centroid
    /// and, when a fit exists, the ellipse with its axes and the dashed
    /// horizontal reference line.
    pub fn draw_region(
        &self,
        canvas: &mut RgbImage,
        region_index: usize,
        points: &[Point<i32>],
        fit: Option<&EllipseFit>,
    ) {
        let outline: Vec<(f32, f32)> = points.iter().map(|p| (p.x as f32, p.y as f32)).collect();
        draw_closed_path(canvas, &outline, region_color(&self.palette, region_index));

        if let (Some(font), Some(centroid)) = (&self.font, vertex_centroid(points))
            && centroid.x >= 0
            && centroid.y >= 0
            && (centroid.x as u32) < canvas.width()
            && (centroid.y as u32) < canvas.height()
        {
            draw_text_mut(
                canvas,
                TEXT_COLOR,
                centroid.x,
                centroid.y,
                PxScale::from(LABEL_SCALE),
                font,
                &region_index.to_string(),
            );
        }

        if let Some(fit) = fit {
            draw_ellipse(canvas, fit);
        }
    }

    /// Writes the per-region info panel at the top right of the canvas.
    pub fn draw_info_panel(&self, canvas: &mut RgbImage, entries: &[PanelEntry]) {
        let Some(font) = &self.font else {
            return;
        };
        let x = (canvas.width() as i32 - PANEL_WIDTH).max(0);
        let scale = PxScale::from(PANEL_SCALE);

        for (y, line) in panel_layout(entries) {
            // Layout positions are baselines; text is placed by its top edge.
            draw_text_mut(canvas, TEXT_COLOR, x, y - PANEL_SCALE as i32, scale, font, line);
        }
    }
}

/// Part of a segment inside the canvas grown by one pixel on every side,
/// or `None` when the segment misses it.
///
/// Liang-Barsky clipping in `f64`, so far away or huge coordinates never
/// reach the integer line stepping.
fn clip_segment(
    width: u32,
    height: u32,
    start: (f32, f32),
    end: (f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    let (x0, y0) = (f64::from(start.0), f64::from(start.1));
    let (dx, dy) = (f64::from(end.0) - x0, f64::from(end.1) - y0);
    if ![x0, y0, dx, dy].iter().all(|v| v.is_finite()) {
        return None;
    }

    let (x_max, y_max) = (f64::from(width), f64::from(height));
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [(-dx, x0 + 1.0), (dx, x_max - x0), (-dy, y0 + 1.0), (dy, y_max - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else if p < 0.0 {
            t0 = t0.max(q / p);
        } else {
            t1 = t1.min(q / p);
        }
    }
    if t0 > t1 {
        return None;
    }

    // Rounding far from the canvas can land slightly outside the box.
    let at = |t: f64| {
        (
            (x0 + t * dx).clamp(-1.0, x_max) as f32,
            (y0 + t * dy).clamp(-1.0, y_max) as f32,
        )
    };
    Some((at(t0), at(t1)))
}

fn draw_clipped_segment(canvas: &mut RgbImage, start: (f32, f32), end: (f32, f32), color: Rgb<u8>) {
    if let Some((start, end)) = clip_segment(canvas.width(), canvas.height(), start, end) {
        draw_line_segment_mut(canvas, start, end, color);
    }
}

/// Two pixel wide line segment.
fn draw_thick_segment(canvas: &mut RgbImage, start: (f32, f32), end: (f32, f32), color: Rgb<u8>) {
    draw_clipped_segment(canvas, start, end, color);
    let (dx, dy) = ((end.0 - start.0).abs(), (end.1 - start.1).abs());
    let (ox, oy) = if dx >= dy { (0.0, 1.0) } else { (1.0, 0.0) };
    draw_clipped_segment(canvas, (start.0 + ox, start.1 + oy), (end.0 + ox, end.1 + oy), color);
}

fn draw_closed_path(canvas: &mut RgbImage, path: &[(f32, f32)], color: Rgb<u8>) {
    if path.len() < 2 {
        return;
    }
    for (&start, &end) in path.iter().zip(path.iter().cycle().skip(1)) {
        draw_thick_segment(canvas, start, end, color);
    }
}

/// Points on the outline of a fitted ellipse.
pub fn ellipse_outline(fit: &EllipseFit, segments: usize) -> Vec<(f32, f32)> {
    let theta = fit.angle.to_radians();
    let (sin, cos) = theta.sin_cos();
    let (cx, cy) = fit.center;

    (0..segments)
        .map(|i| {
            let t = 2.0 * PI * i as f64 / segments as f64;
            let (u, v) = (fit.width_semi_axis * t.cos(), fit.height_semi_axis * t.sin());
            ((cx + u * cos - v * sin) as f32, (cy + u * sin + v * cos) as f32)
        })
        .collect()
}

/// End points of an axis through the ellipse centre.
fn axis_segment(center: (f64, f64), half_length: f64, angle_deg: f64) -> ((f32, f32), (f32, f32)) {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let (dx, dy) = (half_length * cos, half_length * sin);
    (
        ((center.0 - dx) as f32, (center.1 - dy) as f32),
        ((center.0 + dx) as f32, (center.1 + dy) as f32),
    )
}

/// Horizontal dash segments `(x_start, x_end)` centred on `center_x`.
///
/// The dash pattern starts at `center_x - half_length`; only the dashes
/// visible on a canvas `width` pixels wide are returned, clipped to it.
pub fn reference_dashes(center_x: f64, semi_major: f64, width: u32) -> Vec<(i32, i32)> {
    let half_length = semi_major.max(REFERENCE_MIN_HALF_LENGTH);
    let start = (center_x - half_length).trunc();
    let end = (center_x + half_length).trunc().min(f64::from(width));
    if !(start.is_finite() && end.is_finite()) || start >= end {
        return Vec::new();
    }

    let period = f64::from(DASH_LENGTH + GAP_LENGTH);
    let hidden = (-start / period).floor().max(0.0);
    let first = start + hidden * period;
    let count = ((end - first) / period)
        .ceil()
        .clamp(0.0, f64::from(width) / period + 2.0) as usize;

    (0..count)
        .map(|i| first + i as f64 * period)
        .filter_map(|x| {
            let dash_end = (x + f64::from(DASH_LENGTH)).min(end);
            (dash_end > 0.0 && x < end).then(|| (x.max(0.0) as i32, dash_end as i32))
        })
        .collect()
}

fn draw_ellipse(canvas: &mut RgbImage, fit: &EllipseFit) {
    draw_closed_path(canvas, &ellipse_outline(fit, ELLIPSE_SEGMENTS), ELLIPSE_COLOR);

    // Same normalized angle as the recorded Ellipse_MajorAxis_Angle.
    let major_angle = fit.major_axis_angle();
    let (a0, a1) = axis_segment(fit.center, fit.semi_major(), major_angle);
    draw_thick_segment(canvas, a0, a1, MAJOR_AXIS_COLOR);
    let (b0, b1) = axis_segment(fit.center, fit.semi_minor(), major_angle + 90.0);
    draw_thick_segment(canvas, b0, b1, MINOR_AXIS_COLOR);

    let y = fit.center.1 as i32 as f32;
    for (x0, x1) in reference_dashes(fit.center.0, fit.semi_major(), canvas.width()) {
        draw_clipped_segment(canvas, (x0 as f32, y), (x1 as f32, y), REFERENCE_COLOR);
    }
}
