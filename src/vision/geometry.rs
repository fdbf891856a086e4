// src/vision/geometry.rs
//
// Small polygon helpers shared by the calibrator and ball detector.

use crate::types::Point2;

/// Absolute polygon area (shoelace). Works on open point lists; the
/// closing edge is implied.
pub fn polygon_area(points: &[Point2]) -> f64 {
    polygon_moments(points).0.abs()
}

/// Zeroth and first order moments (m00, m10, m01) of a simple polygon.
/// m00 is signed: positive for counter-clockwise winding in a y-up frame.
pub fn polygon_moments(points: &[Point2]) -> (f64, f64, f64) {
    if points.len() < 3 {
        return (0.0, 0.0, 0.0);
    }
    let mut a = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        let cross = p.x * q.y - q.x * p.y;
        a += cross;
        cx += (p.x + q.x) * cross;
        cy += (p.y + q.y) * cross;
    }
    (a / 2.0, cx / 6.0, cy / 6.0)
}

/// Centroid of a polygon, None for degenerate (zero-area) input.
pub fn polygon_centroid(points: &[Point2]) -> Option<Point2> {
    let (m00, m10, m01) = polygon_moments(points);
    if m00.abs() < f64::EPSILON {
        return None;
    }
    Some(Point2::new(m10 / m00, m01 / m00))
}

fn orientation(a: Point2, b: Point2, c: Point2) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Proper intersection of segments ab and cd (shared endpoints don't count).
pub fn segments_cross(a: Point2, b: Point2, c: Point2, d: Point2) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    o1 * o2 < 0.0 && o3 * o4 < 0.0
}

/// A quad given in cyclic order is simple when neither pair of opposite
/// edges crosses.
pub fn is_simple_quad(quad: &[Point2; 4]) -> bool {
    let [a, b, c, d] = *quad;
    !segments_cross(a, b, c, d) && !segments_cross(b, c, d, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f64) -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(side, 0.0),
            Point2::new(side, side),
            Point2::new(0.0, side),
        ]
    }

    #[test]
    fn test_area_and_centroid() {
        let sq = square(10.0);
        assert!((polygon_area(&sq) - 100.0).abs() < 1e-9);
        let c = polygon_centroid(&sq).unwrap();
        assert!((c.x - 5.0).abs() < 1e-9 && (c.y - 5.0).abs() < 1e-9);

        let mut reversed = sq.clone();
        reversed.reverse();
        assert!((polygon_area(&reversed) - 100.0).abs() < 1e-9);
        let c = polygon_centroid(&reversed).unwrap();
        assert!((c.x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_polygon() {
        let line = vec![Point2::new(0.0, 0.0), Point2::new(5.0, 5.0), Point2::new(10.0, 10.0)];
        assert_eq!(polygon_area(&line), 0.0);
        assert!(polygon_centroid(&line).is_none());
    }

    #[test]
    fn test_bowtie_is_not_simple() {
        let ok = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(is_simple_quad(&ok));

        let bowtie = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(!is_simple_quad(&bowtie));
    }
}
