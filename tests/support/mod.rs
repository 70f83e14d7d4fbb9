//! Test support library
//! Small models and float comparison helpers shared by the integration tests.

#![allow(dead_code)]

use facetgeom::{Geometry, Real};
use nalgebra::Point3;

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

/// The square (0,0,0) (1,0,0) (1,1,0) (0,1,0) as facet 0.
pub fn unit_square() -> Geometry<()> {
    Geometry::from_parts(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ],
        vec![vec![0, 1, 2, 3]],
        None,
    )
    .expect("valid square")
}

/// Two unit squares in the z = 0 plane, the second shifted by `dx` along x.
pub fn two_squares(dx: Real) -> Geometry<()> {
    Geometry::from_parts(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(dx, 0.0, 0.0),
            Point3::new(1.0 + dx, 0.0, 0.0),
            Point3::new(1.0 + dx, 1.0, 0.0),
            Point3::new(dx, 1.0, 0.0),
        ],
        vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]],
        None,
    )
    .expect("valid squares")
}

/// U shaped concave facet of area 5 lying in z = 0.
pub fn u_shape() -> Geometry<()> {
    Geometry::from_parts(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(3.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ],
        vec![vec![0, 1, 2, 3, 4, 5, 6, 7]],
        None,
    )
    .expect("valid U")
}

/// Unit cube with outward loops: bottom, top, front, back, left, right.
pub fn cube() -> Geometry<()> {
    let mut points = Vec::new();
    for z in [0.0, 1.0] {
        points.push(Point3::new(0.0, 0.0, z));
        points.push(Point3::new(1.0, 0.0, z));
        points.push(Point3::new(1.0, 1.0, z));
        points.push(Point3::new(0.0, 1.0, z));
    }
    Geometry::from_parts(
        points,
        vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![3, 7, 6, 2],
            vec![0, 4, 7, 3],
            vec![1, 2, 6, 5],
        ],
        None,
    )
    .expect("valid cube")
}

/// Sum of the areas of the given facets.
pub fn total_area(geometry: &Geometry<()>, ids: &[usize]) -> Real {
    ids.iter()
        .map(|&id| geometry.facet_geometry(id).expect("initialized facet").area)
        .sum()
}
