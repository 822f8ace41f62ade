//! Shape descriptors derived from the geometry kernel.

use std::f64::consts::PI;

use imageproc::point::Point;

use crate::geometry::{bounding_rect, convex_hull, feret_diameter, perimeter, polygon_area};

/// Morphometric descriptors of one region.
///
/// Each ratio is `None` when its denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShapeFeatures {
    pub circularity: Option<f64>,
    pub aspect_ratio: Option<f64>,
    pub irregularity: Option<f64>,
    pub convexity: Option<f64>,
    pub solidity: Option<f64>,
    pub feret_diameter: Option<f64>,
    pub area_fraction: Option<f64>,
}

/// Intermediate measurements shared by the shape ratios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourMetrics {
    pub perimeter: f64,
    pub hull_area: f64,
    pub hull_perimeter: f64,
    pub rect_width: u32,
    pub rect_height: u32,
}

impl ContourMetrics {
    pub fn measure(points: &[Point<i32>]) -> Self {
        let hull = convex_hull(points);
        let (rect_width, rect_height) = bounding_rect(points)
            .map(|r| (r.width(), r.height()))
            .unwrap_or((0, 0));

        Self {
            perimeter: perimeter(points, true),
            hull_area: polygon_area(&hull),
            hull_perimeter: perimeter(&hull, true),
            rect_width,
            rect_height,
        }
    }
}

/// Divides, returning `None` for a zero denominator or a non-finite result.
fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator).filter(|v| v.is_finite())
}

/// Caps ratios that overshoot 1 because the mask area is counted in whole
/// pixels while the perimeter and hull come from the vertices.
fn clamp_unit(value: Option<f64>) -> Option<f64> {
    value.map(|v| if v > 1.0 { 1.0 } else { v })
}

/// Computes the shape descriptors for a region.
///
/// # Arguments
///
/// * `area` - Pixel count of the region's mask.
/// * `points` - Polygon vertices of the region.
///
/// Circularity, convexity and solidity are clamped to `1.0`. Irregularity is
/// bounded below by 1 rather than above and is left as computed.
pub fn shape_features(area: u32, points: &[Point<i32>]) -> ShapeFeatures {
    let metrics = ContourMetrics::measure(points);
    let area = area as f64;

    let circularity = clamp_unit(ratio(4.0 * PI * area, metrics.perimeter.powi(2)));
    let convexity = clamp_unit(ratio(metrics.hull_perimeter, metrics.perimeter));
    let solidity = clamp_unit(ratio(area, metrics.hull_area));
    let irregularity = ratio(metrics.perimeter, metrics.hull_perimeter);

    let (w, h) = (metrics.rect_width as f64, metrics.rect_height as f64);
    let aspect_ratio = ratio(w.max(h), w.min(h));
    let area_fraction = ratio(area, w * h);

    ShapeFeatures {
        circularity,
        aspect_ratio,
        irregularity,
        convexity,
        solidity,
        feret_diameter: Some(feret_diameter(points)),
        area_fraction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{mask_area, rasterize};

    fn regular_polygon(n: usize, cx: f64, cy: f64, r: f64) -> Vec<Point<i32>> {
        (0..n)
            .map(|i| {
                let t = 2.0 * PI * i as f64 / n as f64;
                Point::new((cx + r * t.cos()) as i32, (cy + r * t.sin()) as i32)
            })
            .collect()
    }

    fn features_for(points: &[Point<i32>]) -> ShapeFeatures {
        let mask = rasterize(points, 256, 256);
        shape_features(mask_area(&mask), points)
    }

    #[test]
    fn convex_regions_are_fully_convex_and_solid() {
        for points in [
            vec![
                Point::new(10, 10),
                Point::new(70, 10),
                Point::new(70, 40),
                Point::new(10, 40),
            ],
            regular_polygon(7, 100.0, 100.0, 40.0),
            vec![Point::new(20, 20), Point::new(120, 30), Point::new(60, 110)],
        ] {
            let f = features_for(&points);
            assert!((f.solidity.unwrap() - 1.0).abs() < 1e-9);
            assert!((f.convexity.unwrap() - 1.0).abs() < 1e-9);
            assert!((f.irregularity.unwrap() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn disk_polygon_is_nearly_circular() {
        let f = features_for(&regular_polygon(48, 128.0, 128.0, 60.0));
        let c = f.circularity.unwrap();
        assert!(c > 0.0 && c <= 1.0);
        assert!((c - 1.0).abs() < 0.02, "circularity = {}", c);
    }

    #[test]
    fn rectangle_aspect_ratio_and_feret() {
        let points = vec![
            Point::new(10, 10),
            Point::new(70, 10),
            Point::new(70, 40),
            Point::new(10, 40),
        ];
        let f = features_for(&points);
        assert!((f.aspect_ratio.unwrap() - 2.0).abs() < 0.05);
        assert!((f.feret_diameter.unwrap() - (60.0f64.hypot(30.0))).abs() < 1e-9);
        let fraction = f.area_fraction.unwrap();
        assert!(fraction <= 1.0 && fraction > 0.95);
    }

    #[test]
    fn concave_region_has_irregularity_above_one() {
        // A deep notch: the perimeter exceeds the hull perimeter.
        let points = vec![
            Point::new(10, 10),
            Point::new(110, 10),
            Point::new(110, 110),
            Point::new(60, 20),
            Point::new(10, 110),
        ];
        let f = features_for(&points);
        let irregularity = f.irregularity.unwrap();
        // Irregularity is not clamped; it is bounded below by 1.
        assert!(irregularity > 1.0);
        assert!(f.convexity.unwrap() < 1.0);
        assert!(f.solidity.unwrap() < 1.0);
        assert!(f.area_fraction.unwrap() <= 1.0);
    }

    #[test]
    fn degenerate_region_yields_undefined_ratios() {
        let point = vec![Point::new(5, 5), Point::new(5, 5), Point::new(5, 5)];
        let f = shape_features(1, &point);
        assert_eq!(f.circularity, None);
        assert_eq!(f.convexity, None);
        assert_eq!(f.solidity, None);
        assert_eq!(f.irregularity, None);
        // A single pixel still has a 1x1 bounding rectangle.
        assert_eq!(f.aspect_ratio, Some(1.0));
        assert_eq!(f.area_fraction, Some(1.0));
        assert_eq!(f.feret_diameter, Some(0.0));
    }
}
