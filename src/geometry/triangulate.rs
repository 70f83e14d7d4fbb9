//! **Ear-clipping triangulation**
//!
//! Works on the projected loop of a facet. Each step removes the first convex
//! vertex whose ear holds no reflex vertex. When no such ear exists the vertex
//! at position 0 is clipped instead, which always terminates but may produce
//! overlapping triangles on pathological loops.

use crate::float_types::Real;
use crate::geometry::facet::FacetGeometry;
use crate::geometry::polygon2d::{ear_contains_reflex, is_convex};
use nalgebra::Point2;
use tracing::warn;

/// Lazy triangulation of one loop. Triangles are positions in the facet loop.
#[derive(Debug, Clone)]
pub struct Triangulation {
    points: Vec<Point2<Real>>,
    positions: Vec<usize>,
    fallbacks: usize,
}

impl Triangulation {
    /// Triangulate a projected loop; non-simple facets yield nothing.
    pub fn new(geometry: &FacetGeometry) -> Self {
        if geometry.non_simple {
            return Self::from_loop(Vec::new());
        }
        Self::from_loop(geometry.vertices2.clone())
    }

    /// Triangulate a counter-clockwise loop given directly.
    pub fn from_loop(points: Vec<Point2<Real>>) -> Self {
        let positions = if points.len() >= 3 {
            (0..points.len()).collect()
        } else {
            Vec::new()
        };
        Triangulation {
            points,
            positions,
            fallbacks: 0,
        }
    }

    /// Number of ears clipped at position 0 because no valid ear was found.
    pub const fn fallbacks(&self) -> usize {
        self.fallbacks
    }

    fn find_ear(&mut self, remaining: &[Point2<Real>]) -> usize {
        let ear = (0..remaining.len())
            .find(|&i| is_convex(remaining, i) && !ear_contains_reflex(remaining, i));
        match ear {
            Some(i) => i,
            None => {
                self.fallbacks += 1;
                warn!(vertices = remaining.len(), "no valid ear, clipping vertex 0");
                0
            },
        }
    }
}

impl Iterator for Triangulation {
    type Item = [usize; 3];

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.positions.len();
        if n < 3 {
            return None;
        }
        if n == 3 {
            let tri = [self.positions[0], self.positions[1], self.positions[2]];
            self.positions.clear();
            return Some(tri);
        }
        let remaining: Vec<Point2<Real>> =
            self.positions.iter().map(|&k| self.points[k]).collect();
        let i = self.find_ear(&remaining);
        let tri = [
            self.positions[(i + n - 1) % n],
            self.positions[i],
            self.positions[(i + 1) % n],
        ];
        self.positions.remove(i);
        Some(tri)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.positions.len().saturating_sub(2);
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon2d::signed_area2;

    fn area(points: &[Point2<Real>], tris: &[[usize; 3]]) -> Real {
        tris.iter()
            .map(|t| 0.5 * signed_area2(&[points[t[0]], points[t[1]], points[t[2]]]))
            .sum()
    }

    #[test]
    fn concave_loop_area_is_preserved() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        let mut tri = Triangulation::from_loop(points.clone());
        let tris: Vec<_> = tri.by_ref().collect();
        assert_eq!(tris.len(), 4);
        assert_eq!(tri.fallbacks(), 0);
        assert!((area(&points, &tris) - 3.0).abs() < 1e-12);
        for t in &tris {
            assert!(signed_area2(&[points[t[0]], points[t[1]], points[t[2]]]) >= 0.0);
        }
    }

    #[test]
    fn degenerate_input_terminates() {
        assert_eq!(Triangulation::from_loop(vec![Point2::new(0.0, 0.0)]).count(), 0);
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        // bow-tie: still yields n - 2 triangles
        assert_eq!(Triangulation::from_loop(points).count(), 2);
    }
}
