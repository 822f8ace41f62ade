//! Best-fit ellipse of a region's contour.
//!
//! The fit is a direct least-squares ellipse through the polygon vertices:
//! the algebraic distance is minimized under `4AC - B² = 1`, so the result is
//! an ellipse whenever the vertices are not collinear. Vertex sets that pull
//! the fit far beyond the contour (collinear runs, nearly parabolic outlines)
//! are refitted on points sampled along the closed boundary. The orientation
//! convention used for the recorded angle fields and for the drawn axes lives
//! in [`normalize_major_axis_angle`] only.

use std::f64::consts::PI;

use imageproc::point::Point;
use log::debug;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use num_traits::AsPrimitive;

use crate::error::FeatureError;

/// Minimum number of contour points for a fit.
pub const MIN_FIT_POINTS: usize = 5;

/// An ellipse fitted to a contour.
///
/// The first ("width") axis points along `angle` degrees, measured from the
/// image x axis towards the y axis; the second ("height") axis is
/// perpendicular to it. Either may be the longer one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseFit {
    pub center: (f64, f64),
    pub width_semi_axis: f64,
    pub height_semi_axis: f64,
    pub angle: f64,
}

impl EllipseFit {
    pub fn width_is_major(&self) -> bool {
        self.width_semi_axis >= self.height_semi_axis
    }

    pub fn semi_major(&self) -> f64 {
        self.width_semi_axis.max(self.height_semi_axis)
    }

    pub fn semi_minor(&self) -> f64 {
        self.width_semi_axis.min(self.height_semi_axis)
    }

    /// Orientation of the major axis in `[0, 180)` degrees.
    pub fn major_axis_angle(&self) -> f64 {
        normalize_major_axis_angle(self.angle, self.width_is_major())
    }

    /// Orientation of the minor axis in `[0, 180)` degrees.
    pub fn minor_axis_angle(&self) -> f64 {
        (self.major_axis_angle() + 90.0) % 180.0
    }
}

/// Maps a fit's raw orientation to the orientation of its major axis.
///
/// When the width axis is the major one the raw angle is kept, otherwise the
/// major axis is perpendicular to it. The result lies in `[0, 180)`.
///
/// ```
/// use region_morphometry::ellipse::normalize_major_axis_angle;
///
/// assert_eq!(normalize_major_axis_angle(30.0, true), 30.0);
/// assert_eq!(normalize_major_axis_angle(120.0, false), 30.0);
/// assert_eq!(normalize_major_axis_angle(-45.0, true), 135.0);
/// ```
pub fn normalize_major_axis_angle(raw_angle: f64, width_is_major: bool) -> f64 {
    let angle = if width_is_major {
        raw_angle
    } else {
        raw_angle + 90.0
    };
    let normalized = angle.rem_euclid(180.0);
    // rem_euclid rounds tiny negative inputs up to exactly 180.
    if normalized >= 180.0 { 0.0 } else { normalized }
}

/// Largest accepted semi-major axis, as a multiple of the largest distance
/// of a contour point from the contour centroid.
pub const MAX_AXIS_TO_EXTENT: f64 = 5.0;

/// Number of boundary samples used when the vertex fit is rejected.
const BOUNDARY_SAMPLES: usize = 256;

/// Relative ridge added to the reduced scatter matrix. Points lying exactly
/// on an ellipse make it singular.
const RIDGE: f64 = 1e-10;

/// Fits an ellipse to the vertices of a closed contour.
///
/// Points are centred on their mean and scaled to unit RMS radius before the
/// direct least-squares fit. Points sampled exactly from an ellipse are
/// recovered up to rounding. When the vertex fit is not a usable ellipse, or
/// its semi-major axis exceeds [`MAX_AXIS_TO_EXTENT`] times the contour's
/// extent, the fit is repeated on points spaced evenly along the closed
/// boundary.
///
/// # Errors
///
/// * [`FeatureError::TooFewPoints`] for fewer than [`MIN_FIT_POINTS`] points.
/// * [`FeatureError::Degenerate`] when the points coincide or are collinear.
/// * [`FeatureError::FitFailed`] when neither fit yields a bounded ellipse.
pub fn fit_ellipse<T>(points: &[Point<T>]) -> Result<EllipseFit, FeatureError>
where
    T: Copy + AsPrimitive<f64>,
{
    if points.len() < MIN_FIT_POINTS {
        return Err(FeatureError::TooFewPoints {
            required: MIN_FIT_POINTS,
            found: points.len(),
        });
    }

    let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x.as_(), p.y.as_())).collect();
    match fit_bounded(&coords) {
        Err(FeatureError::FitFailed(reason)) => {
            debug!("vertex ellipse fit rejected ({reason}), refitting on the boundary");
            fit_bounded(&sample_boundary(&coords, BOUNDARY_SAMPLES))
        }
        result => result,
    }
}

/// Direct fit on one point set, rejecting ellipses much larger than the set.
fn fit_bounded(coords: &[(f64, f64)]) -> Result<EllipseFit, FeatureError> {
    let n = coords.len() as f64;
    let cx = coords.iter().map(|c| c.0).sum::<f64>() / n;
    let cy = coords.iter().map(|c| c.1).sum::<f64>() / n;
    let scale = (coords
        .iter()
        .map(|(x, y)| (x - cx).powi(2) + (y - cy).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();
    if scale == 0.0 || !scale.is_finite() {
        return Err(FeatureError::Degenerate("all contour points coincide"));
    }

    let normalized: Vec<(f64, f64)> = coords
        .iter()
        .map(|(x, y)| ((x - cx) / scale, (y - cy) / scale))
        .collect();
    let extent = normalized
        .iter()
        .map(|(u, v)| u.hypot(*v))
        .fold(0.0, f64::max);

    let [a, b, c, d, e, f] = direct_conic(&normalized)?;

    let discriminant = b * b - 4.0 * a * c;
    if !(discriminant < 0.0) {
        return Err(FeatureError::FitFailed("conic is not an ellipse".to_string()));
    }

    let u0 = (2.0 * c * d - b * e) / discriminant;
    let v0 = (2.0 * a * e - b * d) / discriminant;
    // Conic value at the centre.
    let f_center = f + (d * u0 + e * v0) / 2.0;

    let theta = 0.5 * b.atan2(a - c);
    let (sin, cos) = theta.sin_cos();
    let lambda_theta = a * cos * cos + b * sin * cos + c * sin * sin;
    let lambda_perp = a + c - lambda_theta;

    let width_sq = -f_center / lambda_theta;
    let height_sq = -f_center / lambda_perp;
    if !(width_sq > 0.0 && height_sq > 0.0 && width_sq.is_finite() && height_sq.is_finite()) {
        return Err(FeatureError::FitFailed("imaginary ellipse".to_string()));
    }

    let semi_major = width_sq.max(height_sq).sqrt();
    if !(semi_major <= MAX_AXIS_TO_EXTENT * extent && u0.is_finite() && v0.is_finite()) {
        return Err(FeatureError::FitFailed(format!(
            "semi-major axis {:.3e} px is out of proportion to the contour",
            semi_major * scale
        )));
    }

    Ok(EllipseFit {
        center: (cx + u0 * scale, cy + v0 * scale),
        width_semi_axis: width_sq.sqrt() * scale,
        height_semi_axis: height_sq.sqrt() * scale,
        angle: theta.to_degrees(),
    })
}

/// Conic `A·u² + B·uv + C·v² + D·u + E·v + F = 0` minimizing the algebraic
/// distance under `4AC - B² = 1`.
///
/// The linear coefficients are eliminated first, which leaves a 3×3
/// generalized eigenproblem `M·q = λ·K·q` for the quadratic ones. With
/// `M = L·Lᵀ` it becomes the symmetric problem for `L⁻¹·K·L⁻ᵀ`, whose single
/// positive eigenvalue belongs to the ellipse.
fn direct_conic(points: &[(f64, f64)]) -> Result<[f64; 6], FeatureError> {
    let mut s_quad = Matrix3::<f64>::zeros();
    let mut s_mixed = Matrix3::<f64>::zeros();
    let mut s_lin = Matrix3::<f64>::zeros();
    for &(u, v) in points {
        let quad = Vector3::new(u * u, u * v, v * v);
        let lin = Vector3::new(u, v, 1.0);
        s_quad += quad * quad.transpose();
        s_mixed += quad * lin.transpose();
        s_lin += lin * lin.transpose();
    }

    let lin_eigenvalues = s_lin.symmetric_eigenvalues();
    if !(lin_eigenvalues.min() > lin_eigenvalues.max() * 1e-10) {
        return Err(FeatureError::Degenerate("contour points are collinear"));
    }
    let s_lin_inv = s_lin
        .try_inverse()
        .ok_or(FeatureError::Degenerate("contour points are collinear"))?;

    // Linear coefficients as a function of the quadratic ones.
    let to_linear = -(s_lin_inv * s_mixed.transpose());
    let reduced = s_quad + s_mixed * to_linear;
    let reduced = (reduced + reduced.transpose()) * 0.5;
    let ridge = RIDGE * reduced.trace();
    if !(ridge > 0.0 && ridge.is_finite()) {
        return Err(FeatureError::FitFailed("empty scatter matrix".to_string()));
    }
    let reduced = reduced + Matrix3::identity() * ridge;

    let l = reduced
        .cholesky()
        .ok_or_else(|| FeatureError::FitFailed("scatter matrix is not positive definite".to_string()))?
        .l();
    let l_inv = l
        .try_inverse()
        .ok_or_else(|| FeatureError::FitFailed("singular scatter matrix".to_string()))?;

    // 4AC - B² as a quadratic form.
    let constraint = Matrix3::new(0.0, 0.0, 2.0, 0.0, -1.0, 0.0, 2.0, 0.0, 0.0);
    let eigen = SymmetricEigen::new(l_inv * constraint * l_inv.transpose());
    let best = eigen.eigenvalues.imax();
    if !(eigen.eigenvalues[best] > 0.0) {
        return Err(FeatureError::FitFailed("no elliptical solution".to_string()));
    }

    let quad = l_inv.transpose() * eigen.eigenvectors.column(best);
    let lin = to_linear * quad;
    Ok([quad[0], quad[1], quad[2], lin[0], lin[1], lin[2]])
}

/// Points spaced about evenly along a closed polygon, vertices included.
fn sample_boundary(vertices: &[(f64, f64)], samples: usize) -> Vec<(f64, f64)> {
    let edges = || vertices.iter().zip(vertices.iter().cycle().skip(1));
    let length: f64 = edges().map(|(p, q)| (q.0 - p.0).hypot(q.1 - p.1)).sum();
    let step = length / samples as f64;

    let mut boundary = Vec::with_capacity(samples + vertices.len());
    for (p, q) in edges() {
        let edge = (q.0 - p.0).hypot(q.1 - p.1);
        let pieces = ((edge / step).ceil() as usize).max(1);
        boundary.extend((0..pieces).map(|i| {
            let t = i as f64 / pieces as f64;
            (p.0 + (q.0 - p.0) * t, p.1 + (q.1 - p.1) * t)
        }));
    }
    boundary
}

/// Ellipse descriptors recorded per region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseFeatures {
    pub area: f64,
    pub perimeter: f64,
    /// Full major axis length in pixels.
    pub major_axis: f64,
    pub major_axis_mm: f64,
    /// Full minor axis length in pixels.
    pub minor_axis: f64,
    pub major_axis_angle: f64,
    pub minor_axis_angle: f64,
}

impl EllipseFeatures {
    /// Derives the recorded descriptors from a fit.
    ///
    /// The perimeter uses Ramanujan's second approximation.
    pub fn from_fit(fit: &EllipseFit, px_to_mm: f64) -> Self {
        let (a, b) = (fit.width_semi_axis, fit.height_semi_axis);
        let h = ((a - b) / (a + b)).powi(2);
        let perimeter = PI * (a + b) * (1.0 + 3.0 * h / (10.0 + (4.0 - 3.0 * h).sqrt()));
        let major_axis = 2.0 * fit.semi_major();

        Self {
            area: PI * a * b,
            perimeter,
            major_axis,
            major_axis_mm: major_axis * px_to_mm,
            minor_axis: 2.0 * fit.semi_minor(),
            major_axis_angle: fit.major_axis_angle(),
            minor_axis_angle: fit.minor_axis_angle(),
        }
    }
}
