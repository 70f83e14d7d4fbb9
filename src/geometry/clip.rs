//! **PolygonClipper**
//!
//! Boolean operations between a facet and clip paths lying in its plane.
//! Coordinates are taken in the subject facet's `(u, v)` basis and handed to
//! the integer Clipper library (through `geo-clipper`) with a fixed-point
//! scale. Every outer contour of the result becomes one new facet; its holes
//! are joined to the outer loop by a slit at their closest point pair.

use crate::context::EditContext;
use crate::errors::{KernelError, KernelResult, try_grow};
use crate::float_types::Real;
use crate::geometry::facet::FacetGeometry;
use crate::geometry::polygon2d::signed_area2;
use crate::geometry::{EditOutcome, Geometry, Selection, dedup_loop};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use geo_clipper::Clipper;
use nalgebra::{Point2, Point3};
use std::fmt::Debug;
use tracing::{debug, instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Intersection,
    Difference,
    Xor,
}

/// Which selected facet is the subject in [`Geometry::clip_selected_polygons`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipOrder {
    /// Lower id is the subject
    Forward,
    /// Higher id is the subject
    Reverse,
    /// Forward, or Reverse when Forward yields nothing
    #[default]
    Auto,
}

fn ring(points: impl Iterator<Item = Point2<Real>>) -> LineString<Real> {
    LineString::new(points.map(|p| Coord { x: p.x, y: p.y }).collect())
}

/// Ring coordinates without the repeated closing point.
fn open_ring(line: &LineString<Real>) -> Vec<Point2<Real>> {
    let mut points: Vec<Point2<Real>> = line.coords().map(|c| Point2::new(c.x, c.y)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// Contours of a boolean operation, in the subject's basis.
struct ClipResult {
    contours: MultiPolygon<Real>,
    /// Clip path vertices with their projection
    clip_points: Vec<(Point2<Real>, usize)>,
}

/// Assigns global vertex ids to 2D result points, reusing nearby existing vertices.
struct VertexRegistry<'a> {
    geometry: &'a FacetGeometry,
    subject: &'a [usize],
    clip_points: &'a [(Point2<Real>, usize)],
    tolerance: Real,
    first_new: usize,
    created: Vec<(Point2<Real>, Point3<Real>)>,
}

impl VertexRegistry<'_> {
    fn register(&mut self, q: &Point2<Real>) -> usize {
        let near = |p: &Point2<Real>| (p - q).norm() < self.tolerance;
        if let Some(k) = self.geometry.vertices2.iter().position(near) {
            return self.subject[k];
        }
        if let Some((_, id)) = self.clip_points.iter().find(|(p, _)| near(p)) {
            return *id;
        }
        if let Some(k) = self.created.iter().position(|(p, _)| near(p)) {
            return self.first_new + k;
        }
        self.created.push((*q, self.geometry.lift(q)));
        self.first_new + self.created.len() - 1
    }
}

/// Closest `(outer, hole)` position pair, distances measured in model units.
fn closest_pair(outer: &[Point2<Real>], hole: &[Point2<Real>], g: &FacetGeometry) -> (usize, usize) {
    let (su, sv) = (g.u.norm(), g.v.norm());
    let mut best = (0, 0);
    let mut min = Real::INFINITY;
    for (j, o) in outer.iter().enumerate() {
        for (k, h) in hole.iter().enumerate() {
            let d = (su * (o.x - h.x)).powi(2) + (sv * (o.y - h.y)).powi(2);
            if d < min {
                min = d;
                best = (j, k);
            }
        }
    }
    best
}

/// One closed loop for an outer contour with its holes spliced in.
fn splice_holes(polygon: &Polygon<Real>, g: &FacetGeometry) -> Vec<Point2<Real>> {
    let outer = open_ring(polygon.exterior());
    let holes: Vec<Vec<Point2<Real>>> = polygon.interiors().iter().map(open_ring).collect();
    let anchors: Vec<(usize, usize)> = holes.iter().map(|h| closest_pair(&outer, h, g)).collect();

    let mut path = Vec::with_capacity(outer.len() + holes.iter().map(|h| h.len() + 2).sum::<usize>());
    for (j, o) in outer.iter().enumerate() {
        path.push(*o);
        for (hole, &(anchor, k)) in holes.iter().zip(&anchors) {
            if anchor != j || hole.is_empty() {
                continue;
            }
            path.extend((0..hole.len()).map(|m| hole[(k + m) % hole.len()]));
            path.push(hole[k]);
            path.push(*o);
        }
    }
    path
}

impl<S: Clone + Debug> Geometry<S> {
    fn clip_contours(&self, subject: usize, clip_paths: &[Vec<usize>], op: BooleanOp) -> KernelResult<ClipResult> {
        let g = self.facet_geometry(subject)?;
        let count = self.vertices.len();
        let subject_polygon = Polygon::new(ring(g.vertices2.iter().copied()), vec![]);

        let mut clip_points = Vec::new();
        let mut clip_polygons = Vec::with_capacity(clip_paths.len());
        for path in clip_paths {
            if let Some(&index) = path.iter().find(|&&i| i >= count) {
                return Err(KernelError::IndexOutOfRange { index, count });
            }
            let projected: Vec<Point2<Real>> = path.iter().map(|&i| g.project(&self.vertices.at(i))).collect();
            clip_points.extend(projected.iter().copied().zip(path.iter().copied()));
            clip_polygons.push(Polygon::new(ring(projected.into_iter()), vec![]));
        }
        let clip = MultiPolygon::new(clip_polygons);

        let scale = self.settings.clip_scale;
        let contours = match op {
            BooleanOp::Union => subject_polygon.union(&clip, scale),
            BooleanOp::Intersection => subject_polygon.intersection(&clip, scale),
            BooleanOp::Difference => subject_polygon.difference(&clip, scale),
            BooleanOp::Xor => subject_polygon.xor(&clip, scale),
        };
        trace!(subject, contours = contours.0.len(), ?op, "clipped");
        Ok(ClipResult { contours, clip_points })
    }

    /// Boolean operation between facet `subject` and closed clip paths given
    /// as vertex loops. One new facet is appended per outer contour of the
    /// result, inheriting the subject's metadata; the subject stays.
    #[instrument(skip_all, fields(subject = subject, paths = clip_paths.len(), op = ?op))]
    pub fn clip(
        &mut self,
        ctx: &mut EditContext,
        subject: usize,
        clip_paths: &[Vec<usize>],
        op: BooleanOp,
    ) -> KernelResult<EditOutcome<S>> {
        let result = self.clip_contours(subject, clip_paths, op)?;
        ctx.confirm_reset()?;
        self.commit_clip(subject, result)
    }

    /// Clip the two selected facets against each other.
    #[instrument(skip_all, fields(op = ?op, order = ?order))]
    pub fn clip_selected_polygons(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        op: BooleanOp,
        order: ClipOrder,
    ) -> KernelResult<EditOutcome<S>> {
        let ids = self.exact_facets(selection, 2)?;
        let (first, second) = (ids[0], ids[1]);
        let path_of = |g: &Self, id: usize| vec![g.facets[id].indices().to_vec()];

        let (subject, result) = match order {
            ClipOrder::Forward => (first, self.clip_contours(first, &path_of(self, second), op)?),
            ClipOrder::Reverse => (second, self.clip_contours(second, &path_of(self, first), op)?),
            ClipOrder::Auto => {
                let forward = self.clip_contours(first, &path_of(self, second), op)?;
                if forward.contours.0.is_empty() {
                    debug!("forward clip empty, trying reverse order");
                    (second, self.clip_contours(second, &path_of(self, first), op)?)
                } else {
                    (first, forward)
                }
            },
        };
        ctx.confirm_reset()?;
        self.commit_clip(subject, result)
    }

    fn commit_clip(&mut self, subject: usize, result: ClipResult) -> KernelResult<EditOutcome<S>> {
        let g = self.facet_geometry(subject)?.clone();
        let subject_indices = self.facets[subject].indices().to_vec();
        let mut registry = VertexRegistry {
            geometry: &g,
            subject: &subject_indices,
            clip_points: &result.clip_points,
            tolerance: self.settings.clip_merge_distance,
            first_new: self.vertices.len(),
            created: Vec::new(),
        };

        let mut loops = Vec::with_capacity(result.contours.0.len());
        for polygon in &result.contours.0 {
            let mut path = splice_holes(polygon, &g);
            // keep the subject's normal whatever winding the clipper reports
            if signed_area2(&path) < 0.0 {
                path.reverse();
            }
            let mut indices: Vec<usize> = path.iter().map(|q| registry.register(q)).collect();
            dedup_loop(&mut indices);
            if indices.len() >= 3 {
                loops.push(indices);
            }
        }

        let new_points: Vec<Point3<Real>> = registry.created.iter().map(|(_, p)| *p).collect();
        try_grow(&mut self.facets, loops.len(), "adding clipped facets")?;
        self.vertices.extend(&new_points)?;

        let mut outcome = EditOutcome::new(Selection::new());
        for indices in loops {
            let facet = self.facets[subject].with_indices(indices);
            let id = self.push_facet(facet)?;
            outcome.created.push(id);
            outcome.selection.select_facet(id);
        }
        self.initialize_geometry();
        debug!(facets = outcome.created.len(), vertices = new_points.len(), "clip committed");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hole_is_spliced_with_a_slit() {
        let outer = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(0.6, 0.6), (0.6, 0.8), (0.8, 0.8), (0.8, 0.6), (0.6, 0.6)]);
        let polygon = Polygon::new(outer, vec![hole]);
        let vertices = crate::geometry::VertexStore::from_points(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ]);
        let g = FacetGeometry::compute(&[0, 1, 2], &vertices, &crate::settings::KernelSettings::default());
        let path = splice_holes(&polygon, &g);
        assert_eq!(path.len(), 4 + 4 + 2);
        // the hole is entered from (1, 1), its closest outer corner
        assert_eq!(path[2], Point2::new(1.0, 1.0));
        assert_eq!(path[3], Point2::new(0.8, 0.8));
        assert_eq!(path[7], Point2::new(0.8, 0.8));
        assert_eq!(path[8], Point2::new(1.0, 1.0));
        let area2 = signed_area2(&path);
        assert!((area2 - 2.0 * (1.0 - 0.04)).abs() < 1e-12);
    }
}
