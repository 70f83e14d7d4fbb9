//! **CreateLoft**
//!
//! Bridges two facets with a band of side facets. Each vertex of the first
//! facet is linked to the closest vertex of the second, both loops running in
//! the same rotational direction and their centers aligned; the search window
//! only moves forward, so links never cross. The band between consecutive
//! links is closed with a quad when both sides advance by one vertex and with
//! triangle fans otherwise.

use crate::context::EditContext;
use crate::errors::KernelResult;
use crate::float_types::Real;
use crate::geometry::facet::FacetGeometry;
use crate::geometry::{EditOutcome, Facet, Geometry, Selection};
use nalgebra::Point2;
use std::fmt::Debug;
use tracing::{debug, instrument, trace, warn};

/// Squared in-plane distance between two points given in the same basis.
fn scaled_distance2(g: &FacetGeometry, a: &Point2<Real>, b: &Point2<Real>) -> Real {
    (g.u.norm() * (a.x - b.x)).powi(2) + (g.v.norm() * (a.y - b.y)).powi(2)
}

impl<S: Clone + Debug> Geometry<S> {
    /// Side facets joining the two selected facets.
    ///
    /// New facets carry the first facet's metadata and are selected. Quads
    /// that are not planar within the loft tolerance are split along their
    /// shorter diagonal.
    #[instrument(skip_all)]
    pub fn create_loft(&mut self, ctx: &mut EditContext, selection: &Selection) -> KernelResult<EditOutcome<S>> {
        let ids = self.exact_facets(selection, 2)?;
        let loops = self.loft_loops(ids[0], ids[1])?;
        ctx.confirm_reset()?;

        let metadata = self.facets[ids[0]].metadata.clone();
        let mut outcome = EditOutcome::new(Selection::new());
        for indices in loops {
            let id = self.push_facet(Facet::new(indices, metadata.clone()))?;
            outcome.created.push(id);
            outcome.selection.select_facet(id);
        }
        self.initialize_geometry();
        debug!(created = outcome.created.len(), "loft created");
        Ok(outcome)
    }

    fn loft_loops(&self, first: usize, second: usize) -> KernelResult<Vec<Vec<usize>>> {
        let g1 = self.facet_geometry(first)?;
        let g2 = self.facet_geometry(second)?;
        let a: Vec<usize> = self.facets[first].indices().to_vec();
        let aligned = g1.normal().dot(&g2.normal()) > 0.0;
        let mut b: Vec<usize> = self.facets[second].indices().to_vec();
        if !aligned {
            b.reverse();
        }
        let (n1, n2) = (a.len(), b.len());

        // second loop seen from the first facet, centers on top of each other
        let offset = g1.project(&g1.center) - g1.project(&g2.center);
        let b2: Vec<Point2<Real>> = b.iter().map(|&i| g1.project(&self.vertices.at(i)) + offset).collect();
        let a2 = &g1.vertices2;
        let distance = |i: usize, k: usize| scaled_distance2(g1, &a2[i % n1], &b2[k % n2]);

        // NaN distances (non-finite coordinates) never win
        let closest = |i: usize, window: std::ops::RangeInclusive<usize>| {
            window
                .map(|k| (k, distance(i, k)))
                .filter(|(_, d)| !d.is_nan())
                .min_by(|x, y| x.1.total_cmp(&y.1))
                .map(|(k, _)| k)
        };
        let Some(j0) = closest(0, 0..=n2 - 1) else {
            warn!(first, second, "no finite distance between the loops, nothing to loft");
            return Ok(Vec::new());
        };
        let mut links = Vec::with_capacity(n1 + 1);
        links.push(j0);
        for i in 1..n1 {
            let from = links[i - 1];
            links.push(closest(i, from..=j0 + n2).unwrap_or(from));
        }
        links.push(j0 + n2);
        trace!(?links, aligned, "loft links");

        let tolerance = self.settings.loft_planarity_tolerance;
        let mut loops = Vec::new();
        let mut emit = |mut indices: Vec<usize>| {
            if !aligned {
                indices.reverse();
            }
            let distinct = indices.iter().enumerate().all(|(k, v)| !indices[..k].contains(v));
            if distinct {
                loops.push(indices);
            }
        };
        for i in 0..n1 {
            let (ai, an) = (a[i], a[(i + 1) % n1]);
            let (lo, hi) = (links[i], links[i + 1]);
            if hi == lo + 1 {
                let quad = [ai, an, b[hi % n2], b[lo % n2]];
                let g = FacetGeometry::compute(&quad, &self.vertices, &self.settings);
                if g.planarity_error <= tolerance {
                    emit(quad.to_vec());
                } else {
                    let p = |k: usize| self.vertices.at(quad[k]);
                    if (p(0) - p(2)).norm() < (p(1) - p(3)).norm() {
                        emit(vec![quad[0], quad[1], quad[2]]);
                        emit(vec![quad[0], quad[2], quad[3]]);
                    } else {
                        emit(vec![quad[0], quad[1], quad[3]]);
                        emit(vec![quad[1], quad[2], quad[3]]);
                    }
                }
                continue;
            }
            // second-loop vertices up to `split` fan around `ai`, the rest around `an`
            let split = (lo..=hi)
                .find(|&k| distance(i + 1, k) < distance(i, k))
                .unwrap_or(hi)
                .max(lo);
            for k in lo..split {
                emit(vec![ai, b[(k + 1) % n2], b[k % n2]]);
            }
            emit(vec![ai, an, b[split % n2]]);
            for k in split..hi {
                emit(vec![an, b[(k + 1) % n2], b[k % n2]]);
            }
        }
        Ok(loops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;
    use nalgebra::Point3;

    fn centroid(points: &[Point3<Real>]) -> Point3<Real> {
        let sum = points.iter().fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
        Point3::from(sum / points.len() as Real)
    }

    /// Bottom square facing down and a top loop facing up.
    fn frustum(top: &[Point3<Real>]) -> Geometry<()> {
        let mut points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        points.extend_from_slice(top);
        let top_loop = (4..4 + top.len()).collect();
        Geometry::from_parts(points, vec![vec![0, 3, 2, 1], top_loop], None).unwrap()
    }

    /// Every directed edge must be matched by its reverse exactly once.
    fn assert_closed(geometry: &Geometry<()>) {
        let mut edges: HashMap<(usize, usize), usize> = HashMap::new();
        for facet in geometry.facets() {
            for edge in facet.edges() {
                *edges.entry(edge).or_insert(0) += 1;
            }
        }
        for (&(a, b), &count) in &edges {
            assert_eq!(count, 1, "edge {a}->{b} used {count} times");
            assert_eq!(edges.get(&(b, a)), Some(&1), "edge {a}->{b} has no twin");
        }
    }

    #[test]
    fn cube_sides_are_four_outward_quads() {
        let mut geometry = frustum(&[
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ]);
        let outcome = geometry
            .create_loft(&mut EditContext::default(), &Selection::of_facets([0, 1]))
            .unwrap();
        assert_eq!(outcome.created, vec![2, 3, 4, 5]);
        let center = Point3::new(0.5, 0.5, 0.5);
        for &id in &outcome.created {
            let g = geometry.facet_geometry(id).unwrap();
            assert_eq!(geometry.facet(id).unwrap().len(), 4);
            assert!((g.area - 1.0).abs() < 1e-12);
            assert!(g.normal().dot(&(g.center - center)) > 0.0);
        }
        assert_closed(&geometry);
    }

    #[test]
    fn square_to_triangle_closes() {
        let mut geometry = frustum(&[
            Point3::new(0.2, 0.2, 1.0),
            Point3::new(0.8, 0.2, 1.0),
            Point3::new(0.5, 0.8, 1.0),
        ]);
        let outcome = geometry
            .create_loft(&mut EditContext::default(), &Selection::of_facets([0, 1]))
            .unwrap();
        assert!(!outcome.created.is_empty());
        assert_closed(&geometry);
        let inside = Point3::new(0.5, 0.45, 0.5);
        for &id in &outcome.created {
            let facet = geometry.facet(id).unwrap();
            let points: Vec<Point3<Real>> = facet.indices().iter().map(|&i| geometry.vertices().as_slice()[i]).collect();
            let g = geometry.facet_geometry(id).unwrap();
            assert!(g.normal().dot(&(centroid(&points) - inside)) > 0.0);
        }
    }

    #[test]
    fn non_finite_loop_gives_no_band() {
        let mut geometry = frustum(&[
            Point3::new(Real::NAN, 0.0, 1.0),
            Point3::new(Real::NAN, 0.0, 1.0),
            Point3::new(Real::NAN, 1.0, 1.0),
        ]);
        let outcome = geometry
            .create_loft(&mut EditContext::default(), &Selection::of_facets([0, 1]))
            .unwrap();
        assert!(outcome.created.is_empty());
        assert_eq!(geometry.facet_count(), 2);
    }

    #[test]
    fn loft_needs_two_facets() {
        let mut geometry = frustum(&[
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
        ]);
        assert!(geometry
            .create_loft(&mut EditContext::default(), &Selection::of_facets([0]))
            .is_err());
    }
}
