//! Geometry kernel for annotated regions.
//!
//! Everything here works directly on the polygon vertices of an annotation,
//! except [`rasterize`] which turns them into a binary mask.

use image::{GrayImage, Luma};
use imageproc::{
    drawing::{draw_line_segment_mut, draw_polygon_mut},
    point::Point,
    rect::Rect,
};
use num::{Num, NumCast};
use num_traits::AsPrimitive;

/// Mask value for pixels inside a region.
pub const MASK_ON: u8 = 255;

/// Drops consecutive duplicate vertices, including a repeated closing vertex.
///
/// Annotation tools frequently close polygons explicitly or emit repeated
/// vertices after integer truncation; the fill routine expects neither.
pub fn dedup_vertices(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut unique: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &p in points {
        if unique.last() != Some(&p) {
            unique.push(p);
        }
    }
    while unique.len() > 1 && unique.first() == unique.last() {
        unique.pop();
    }
    unique
}

/// Rasterizes a closed polygon into a binary mask of the given extent.
///
/// Interior and boundary pixels are set to [`MASK_ON`], everything else is 0.
/// Vertices outside the raster are clipped, so a polygon running along the
/// image edges never writes out of bounds.
///
/// # Arguments
///
/// * `polygon` - Vertices in pixel coordinates, in drawing order.
/// * `width`, `height` - Extent of the source image.
///
/// # Returns
///
/// A `GrayImage` of `width` x `height`. The number of set pixels is the
/// region's pixel area.
pub fn rasterize(polygon: &[Point<i32>], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let vertices = dedup_vertices(polygon);

    match vertices.len() {
        0 => {}
        1 => {
            let p = vertices[0];
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
                mask.put_pixel(p.x as u32, p.y as u32, Luma([MASK_ON]));
            }
        }
        2 => draw_line_segment_mut(
            &mut mask,
            (vertices[0].x as f32, vertices[0].y as f32),
            (vertices[1].x as f32, vertices[1].y as f32),
            Luma([MASK_ON]),
        ),
        _ => draw_polygon_mut(&mut mask, &vertices, Luma([MASK_ON])),
    }

    mask
}

/// Number of set pixels in a mask.
pub fn mask_area(mask: &GrayImage) -> u32 {
    mask.pixels().filter(|p| p.0[0] > 0).count() as u32
}

/// Sum of Euclidean distances between consecutive points.
///
/// With `closed` set, the distance from the last point back to the first one
/// is included. Sequences with fewer than two points have a length of `0.0`.
pub fn perimeter<T>(points: &[Point<T>], closed: bool) -> f64
where
    T: Num + NumCast + Copy + AsPrimitive<f64>,
{
    if points.len() < 2 {
        return 0.0;
    }

    let segment = |(p1, p2): (&Point<T>, &Point<T>)| {
        let dx: f64 = p2.x.as_() - p1.x.as_();
        let dy: f64 = p2.y.as_() - p1.y.as_();
        dx.hypot(dy)
    };

    if closed {
        points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(segment)
            .sum()
    } else {
        points.iter().zip(points.iter().skip(1)).map(segment).sum()
    }
}

/// Absolute area enclosed by a closed polygon (shoelace formula).
pub fn polygon_area<T>(points: &[Point<T>]) -> f64
where
    T: Num + NumCast + Copy + AsPrimitive<f64>,
{
    if points.len() < 3 {
        return 0.0;
    }

    let twice_area: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p1, p2)| {
            let (x1, y1): (f64, f64) = (p1.x.as_(), p1.y.as_());
            let (x2, y2): (f64, f64) = (p2.x.as_(), p2.y.as_());
            x1 * y2 - x2 * y1
        })
        .sum();

    twice_area.abs() / 2.0
}

/// Convex hull of the polygon vertices, counter-clockwise in image coordinates.
///
/// Monotone chain: duplicate and collinear vertices are dropped, so a
/// degenerate input collapses to one or two points.
pub fn convex_hull(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut sorted = points.to_vec();
    sorted.sort_unstable_by_key(|p| (p.x, p.y));
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull = half_hull(sorted.iter());
    hull.extend(half_hull(sorted.iter().rev()));
    hull
}

fn cross(o: Point<i32>, a: Point<i32>, b: Point<i32>) -> i128 {
    let (ax, ay) = (<i64 as From<_>>::from(a.x) - <i64 as From<_>>::from(o.x), <i64 as From<_>>::from(a.y) - <i64 as From<_>>::from(o.y));
    let (bx, by) = (<i64 as From<_>>::from(b.x) - <i64 as From<_>>::from(o.x), <i64 as From<_>>::from(b.y) - <i64 as From<_>>::from(o.y));
    <i128 as From<_>>::from(ax) * <i128 as From<_>>::from(by) - <i128 as From<_>>::from(ay) * <i128 as From<_>>::from(bx)
}

/// One side of the monotone chain, without its final point.
fn half_hull<'a>(points: impl Iterator<Item = &'a Point<i32>>) -> Vec<Point<i32>> {
    let mut chain: Vec<Point<i32>> = Vec::new();
    for &p in points {
        while chain.len() >= 2 && cross(chain[chain.len() - 2], chain[chain.len() - 1], p) <= 0 {
            chain.pop();
        }
        chain.push(p);
    }
    chain.pop();
    chain
}

/// Axis-aligned bounding rectangle of a point set.
///
/// Width and height are pixel inclusive (`max - min + 1`), so a rectangle
/// always covers every pixel a filled region can occupy. Returns `None` for
/// an empty point set.
///
/// # Examples
///
/// ```
/// use imageproc::point::Point;
/// use region_morphometry::geometry::bounding_rect;
///
/// let rect = bounding_rect(&[Point::new(10, 20), Point::new(40, 25), Point::new(15, 60)]).unwrap();
/// assert_eq!((rect.left(), rect.top()), (10, 20));
/// assert_eq!((rect.width(), rect.height()), (31, 41));
/// ```
pub fn bounding_rect(points: &[Point<i32>]) -> Option<Rect> {
    let p0 = points.first()?;
    let mut min_x = p0.x;
    let mut max_x = p0.x;
    let mut min_y = p0.y;
    let mut max_y = p0.y;

    for p in &points[1..] {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    let extent = |min: i32, max: i32| {
        u32::try_from(<i64 as From<_>>::from(max) - <i64 as From<_>>::from(min) + 1).unwrap_or(u32::MAX)
    };
    let width = extent(min_x, max_x);
    let height = extent(min_y, max_y);

    Some(Rect::at(min_x, min_y).of_size(width, height))
}

/// Maximum Euclidean distance over all pairs of points (Feret diameter).
///
/// Quadratic in the number of points, which is fine for hand-drawn
/// annotation polygons.
pub fn feret_diameter<T>(points: &[Point<T>]) -> f64
where
    T: Num + NumCast + Copy + AsPrimitive<f64>,
{
    let mut max_squared: f64 = 0.0;

    for (i, p1) in points.iter().enumerate() {
        for p2 in &points[i + 1..] {
            let dx: f64 = p2.x.as_() - p1.x.as_();
            let dy: f64 = p2.y.as_() - p1.y.as_();
            max_squared = max_squared.max(dx * dx + dy * dy);
        }
    }

    max_squared.sqrt()
}

/// Arithmetic mean of the vertices, truncated to integer pixel coordinates.
pub fn vertex_centroid(points: &[Point<i32>]) -> Option<Point<i32>> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as i64;
    let sx: i64 = points.iter().map(|p| p.x as i64).sum();
    let sy: i64 = points.iter().map(|p| p.y as i64).sum();
    Some(Point::new((sx / n) as i32, (sy / n) as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_float_eq(a: f64, b: f64) {
        assert!(
            (a - b).abs() < 1e-9,
            "Assertion failed: expected {}, got {}",
            b,
            a
        );
    }

    fn rectangle(x: i32, y: i32, w: i32, h: i32) -> Vec<Point<i32>> {
        vec![
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ]
    }

    #[test]
    fn test_dedup_vertices() {
        let points = vec![
            Point::new(0, 0),
            Point::new(0, 0),
            Point::new(5, 0),
            Point::new(5, 5),
            Point::new(0, 0),
        ];
        assert_eq!(
            dedup_vertices(&points),
            vec![Point::new(0, 0), Point::new(5, 0), Point::new(5, 5)]
        );
        assert_eq!(
            dedup_vertices(&[Point::new(3, 3), Point::new(3, 3)]),
            vec![Point::new(3, 3)]
        );
        assert!(dedup_vertices(&[]).is_empty());
    }

    #[test]
    fn test_rasterize_rectangle_is_boundary_inclusive() {
        let mask = rasterize(&rectangle(10, 10, 20, 10), 64, 64);
        let area = mask_area(&mask);
        assert!(area >= 200 && area <= 21 * 11, "area = {}", area);
        assert_eq!(mask.get_pixel(10, 10).0[0], MASK_ON);
        assert_eq!(mask.get_pixel(20, 15).0[0], MASK_ON);
        assert_eq!(mask.get_pixel(5, 5).0[0], 0);
        assert_eq!(mask.get_pixel(40, 15).0[0], 0);
    }

    #[test]
    fn test_rasterize_clips_to_image_edges() {
        // Polygon coincides with the image border.
        let mask = rasterize(&rectangle(0, 0, 31, 31), 32, 32);
        assert_eq!(mask.dimensions(), (32, 32));
        assert_eq!(mask_area(&mask), 32 * 32);

        // Polygon reaching past the border is clipped.
        let mask = rasterize(&rectangle(-10, -10, 60, 60), 32, 32);
        assert_eq!(mask_area(&mask), 32 * 32);
    }

    #[test]
    fn test_rasterize_degenerate_inputs() {
        assert_eq!(mask_area(&rasterize(&[], 8, 8)), 0);
        assert_eq!(mask_area(&rasterize(&[Point::new(2, 2)], 8, 8)), 1);
        assert_eq!(
            mask_area(&rasterize(&[Point::new(2, 2), Point::new(2, 2)], 8, 8)),
            1
        );
        assert_eq!(mask_area(&rasterize(&[Point::new(20, 20)], 8, 8)), 0);
    }

    #[test]
    fn test_perimeter() {
        let square = rectangle(0, 0, 10, 10);
        assert_float_eq(perimeter(&square, true), 40.0);
        assert_float_eq(perimeter(&square, false), 30.0);

        let triangle = vec![Point::new(0, 0), Point::new(3, 0), Point::new(0, 4)];
        assert_float_eq(perimeter(&triangle, true), 12.0);

        let line = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        assert_float_eq(perimeter(&line, true), 20.0);

        assert_float_eq(perimeter(&[Point::new(1, 1)], true), 0.0);
        assert_float_eq(perimeter::<i32>(&[], true), 0.0);
    }

    #[test]
    fn test_polygon_area() {
        assert_float_eq(polygon_area(&rectangle(5, 5, 20, 10)), 200.0);
        let triangle = vec![Point::new(0, 0), Point::new(0, 4), Point::new(3, 0)];
        assert_float_eq(polygon_area(&triangle), 6.0);
        assert_float_eq(polygon_area(&[Point::new(0, 0), Point::new(5, 5)]), 0.0);
    }

    #[test]
    fn test_convex_hull_drops_concave_vertex() {
        // An arrow-head: (5, 3) is a reflex vertex.
        let points = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(5, 3),
            Point::new(0, 10),
        ];
        let hull = convex_hull(&points);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Point::new(5, 3)));
        assert_float_eq(polygon_area(&hull), 100.0);
        assert_float_eq(perimeter(&hull, true), 40.0);
    }

    #[test]
    fn test_convex_hull_degenerate_inputs() {
        let collinear = vec![Point::new(0, 0), Point::new(4, 4), Point::new(2, 2)];
        assert_eq!(
            convex_hull(&collinear),
            vec![Point::new(0, 0), Point::new(4, 4)]
        );
        let repeated = vec![Point::new(3, 3); 4];
        assert_eq!(convex_hull(&repeated), vec![Point::new(3, 3)]);
        assert!(convex_hull(&[]).is_empty());
    }

    #[test]
    fn test_bounding_rect() {
        let rect = bounding_rect(&rectangle(20, 30, 100, 50)).unwrap();
        assert_eq!(rect.left(), 20);
        assert_eq!(rect.top(), 30);
        assert_eq!(rect.width(), 101);
        assert_eq!(rect.height(), 51);

        let single = bounding_rect(&[Point::new(7, 9)]).unwrap();
        assert_eq!((single.width(), single.height()), (1, 1));

        assert!(bounding_rect(&[]).is_none());
    }

    #[test]
    fn test_bounding_rect_with_negative_coordinates() {
        let rect = bounding_rect(&[Point::new(-10, -20), Point::new(50, 30)]).unwrap();
        assert_eq!((rect.left(), rect.top()), (-10, -20));
        assert_eq!((rect.width(), rect.height()), (61, 51));
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let (lo, hi) = (i32::MIN, i32::MAX);
        let rect = bounding_rect(&[Point::new(lo, lo), Point::new(hi, 0)]).unwrap();
        assert_eq!((rect.left(), rect.top()), (lo, lo));
        assert_eq!(rect.width(), u32::MAX);
        assert_eq!(rect.height(), 1u32 << 31 | 1);

        let square = vec![
            Point::new(lo, lo),
            Point::new(hi, lo),
            Point::new(hi, hi),
            Point::new(lo, hi),
            Point::new(0, 0),
        ];
        let hull = convex_hull(&square);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Point::new(0, 0)));
    }

    #[test]
    fn test_feret_diameter() {
        assert_float_eq(feret_diameter(&rectangle(0, 0, 30, 40)), 50.0);
        assert_float_eq(feret_diameter(&[Point::new(1.0, 1.0)]), 0.0);
        let collinear = vec![Point::new(0, 0), Point::new(2, 0), Point::new(9, 0)];
        assert_float_eq(feret_diameter(&collinear), 9.0);
    }

    #[test]
    fn test_vertex_centroid() {
        assert_eq!(
            vertex_centroid(&rectangle(0, 0, 10, 5)),
            Some(Point::new(5, 2))
        );
        assert_eq!(vertex_centroid(&[]), None);
    }
}
