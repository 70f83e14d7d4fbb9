//! Predicates on facet loops projected in their (u, v) basis.

use crate::float_types::Real;
use nalgebra::Point2;

#[inline]
fn coord(p: &Point2<Real>) -> robust::Coord<Real> {
    robust::Coord { x: p.x, y: p.y }
}

/// Twice the signed area of a closed loop (shoelace sum); positive when counter-clockwise.
pub fn signed_area2(points: &[Point2<Real>]) -> Real {
    let n = points.len();
    (0..n)
        .map(|j| {
            let a = &points[j];
            let b = &points[(j + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum()
}

/// Crossing-number test; orientation independent.
pub fn contains_point(polygon: &[Point2<Real>], p: &Point2<Real>) -> bool {
    let n = polygon.len();
    let mut inside = false;
    for i in 0..n {
        let a = &polygon[i];
        let b = &polygon[(i + 1) % n];
        if (a.x > p.x) != (b.x > p.x) {
            let y = a.y + (p.x - a.x) * (b.y - a.y) / (b.x - a.x);
            if y > p.y {
                inside = !inside;
            }
        }
    }
    inside
}

/// Distance from `p` to the segment `a`-`b`.
pub fn distance_to_segment(p: &Point2<Real>, a: &Point2<Real>, b: &Point2<Real>) -> Real {
    let ab = b - a;
    let length2 = ab.norm_squared();
    if length2 == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / length2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// `true` when `p` lies within `tolerance` of any edge of the loop.
pub fn is_on_edge(polygon: &[Point2<Real>], p: &Point2<Real>, tolerance: Real) -> bool {
    let n = polygon.len();
    (0..n).any(|i| distance_to_segment(p, &polygon[i], &polygon[(i + 1) % n]) < tolerance)
}

/// Convexity of the vertex at position `i` of a counter-clockwise loop.
/// Straight vertices count as convex.
pub fn is_convex(polygon: &[Point2<Real>], i: usize) -> bool {
    let n = polygon.len();
    let prev = &polygon[(i + n - 1) % n];
    let cur = &polygon[i];
    let next = &polygon[(i + 1) % n];
    robust::orient2d(coord(prev), coord(cur), coord(next)) >= 0.0
}

/// `true` when a reflex vertex of the loop lies inside the ear `(prev, cur, next)` at `i`.
pub fn ear_contains_reflex(polygon: &[Point2<Real>], i: usize) -> bool {
    let n = polygon.len();
    let ip = (i + n - 1) % n;
    let inext = (i + 1) % n;
    let ear = [polygon[ip], polygon[i], polygon[inext]];
    (0..n)
        .filter(|&k| k != ip && k != i && k != inext)
        .any(|k| contains_point(&ear, &polygon[k]) && !is_convex(polygon, k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_shape() -> Vec<Point2<Real>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ]
    }

    #[test]
    fn shoelace_sign_follows_winding() {
        let mut poly = l_shape();
        assert_eq!(signed_area2(&poly), 6.0);
        poly.reverse();
        assert_eq!(signed_area2(&poly), -6.0);
    }

    #[test]
    fn point_in_l_shape() {
        let poly = l_shape();
        assert!(contains_point(&poly, &Point2::new(0.5, 1.5)));
        assert!(contains_point(&poly, &Point2::new(1.5, 0.5)));
        assert!(!contains_point(&poly, &Point2::new(1.5, 1.5)));
        assert!(!contains_point(&poly, &Point2::new(-0.5, 0.5)));
    }

    #[test]
    fn edge_tolerance() {
        let poly = l_shape();
        assert!(is_on_edge(&poly, &Point2::new(1.0, 1.5), 1e-6));
        assert!(!is_on_edge(&poly, &Point2::new(0.5, 0.5), 1e-6));
        // beyond the end of an edge does not count
        assert!(!is_on_edge(&poly, &Point2::new(3.0, 0.0), 1e-6));
    }

    #[test]
    fn reflex_vertex_detection() {
        let poly = l_shape();
        assert!(is_convex(&poly, 0));
        assert!(!is_convex(&poly, 3));
        // ear at vertex 2 (2,1) with (2,0),(1,1) holds no reflex vertex
        assert!(!ear_contains_reflex(&poly, 2));
    }
}
