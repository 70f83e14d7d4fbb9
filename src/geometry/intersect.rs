//! **IntersectionBuilder**
//!
//! Cuts every selected facet along the lines where the other selected facets
//! cross it. Edge crossings and interior piercings become new vertices,
//! chained into clip paths running from edge to edge; the facet loop and
//! its clip paths then bound the pieces, each found by one walk.

use crate::context::EditContext;
use crate::errors::{KernelError, KernelResult};
use crate::float_types::Real;
use crate::geometry::neighbors::find_common_edge;
use crate::geometry::polygon2d::{contains_point, is_on_edge};
use crate::geometry::{DeletedFacet, EditOutcome, Geometry, Selection, dedup_loop};
use nalgebra::Point3;
use std::fmt::Debug;
use tracing::{debug, instrument, trace, warn};

/// An intersection vertex and the selected facet whose plane produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Crossing {
    vertex: usize,
    with: usize,
}

/// Intersections found on one facet.
#[derive(Debug, Default)]
struct FacetCrossings {
    /// Per edge `k` (from loop position `k` to `k + 1`)
    on_edges: Vec<Vec<Crossing>>,
    /// Where another facet's edge pierces this facet's interior
    interior: Vec<Crossing>,
}

#[derive(Debug, Clone, Copy)]
struct PathPoint {
    vertex: usize,
    /// Loop edge carrying the point, `None` for interior points
    edge: Option<usize>,
}

/// Polyline of intersection points from one edge of a facet to another.
#[derive(Debug, Clone)]
struct ClipPath {
    points: Vec<PathPoint>,
}

/// Vertex of a facet loop with the clip path ends inserted.
#[derive(Debug, Clone, Copy)]
struct BoundaryNode {
    vertex: usize,
    /// `(path, at_front)` when a closed clip path ends here
    link: Option<(usize, bool)>,
}

impl ClipPath {
    fn front(&self) -> PathPoint {
        self.points[0]
    }

    fn back(&self) -> PathPoint {
        self.points[self.points.len() - 1]
    }

    fn is_closed(&self) -> bool {
        self.front().edge.is_some() && self.back().edge.is_some()
    }
}

/// Chain the crossings of one facet into clip paths.
fn chain_paths(crossings: &FacetCrossings) -> Vec<ClipPath> {
    let mut paths: Vec<ClipPath> = Vec::new();
    for (edge, starts) in crossings.on_edges.iter().enumerate() {
        for start in starts {
            let taken = paths
                .iter()
                .any(|p| p.front().vertex == start.vertex || p.back().vertex == start.vertex);
            if taken {
                continue;
            }
            let mut points = vec![PathPoint {
                vertex: start.vertex,
                edge: Some(edge),
            }];
            let mut with = start.with;

            // interior points on the same intersection line, switching lines
            // where two of them meet
            while let Some(next) = crossings
                .interior
                .iter()
                .find(|c| c.with == with && points.iter().all(|p| p.vertex != c.vertex))
            {
                points.push(PathPoint {
                    vertex: next.vertex,
                    edge: None,
                });
                match crossings
                    .interior
                    .iter()
                    .find(|c| c.vertex == next.vertex && c.with != next.with)
                {
                    Some(switch) => with = switch.with,
                    None => break,
                }
            }

            let same_edge = std::iter::once(edge);
            let other_edges = (0..crossings.on_edges.len()).filter(|&k| k != edge);
            let closing = same_edge.chain(other_edges).find_map(|k| {
                crossings.on_edges[k]
                    .iter()
                    .find(|c| c.with == with && points.iter().all(|p| p.vertex != c.vertex))
                    .map(|c| PathPoint {
                        vertex: c.vertex,
                        edge: Some(k),
                    })
            });
            points.extend(closing);
            if points.len() > 1 {
                paths.push(ClipPath { points });
            }
        }
    }
    paths
}

impl<S: Clone + Debug> Geometry<S> {
    /// Cut the selected facets against each other.
    ///
    /// Pairs that already share an edge are skipped. New vertices are
    /// appended for every distinct intersection point. When the selection
    /// holds vertices, only the pieces containing one of them are kept;
    /// otherwise every piece is. The first piece of a facet replaces it in
    /// place, the others are appended.
    #[instrument(skip_all, fields(facets = selection.facets.len()))]
    pub fn build_intersection(&mut self, ctx: &mut EditContext, selection: &Selection) -> KernelResult<EditOutcome<S>> {
        let ids = self.selected_facets(selection)?;
        if ids.len() < 2 {
            return Err(KernelError::TooFewFacets {
                minimum: 2,
                found: ids.len(),
            });
        }
        let kept = self.selected_vertices(selection)?;
        ctx.confirm_reset()?;

        let first_new = self.vertices.len();
        let merge_distance = self.settings.intersection_merge_distance;
        let on_edge_tolerance = self.settings.on_edge_tolerance;
        let mut new_points: Vec<Point3<Real>> = Vec::new();
        let mut crossings: Vec<FacetCrossings> = ids
            .iter()
            .map(|&id| FacetCrossings {
                on_edges: vec![Vec::new(); self.facets[id].len()],
                interior: Vec::new(),
            })
            .collect();

        for (i, &id1) in ids.iter().enumerate() {
            ctx.check_cancelled()?;
            ctx.progress(i, ids.len());
            let f1 = &self.facets[id1];
            for (j, &id2) in ids.iter().enumerate() {
                if i == j || find_common_edge(f1.indices(), self.facets[id2].indices()).is_some() {
                    continue;
                }
                let g2 = self.facet_geometry(id2)?;
                for (k, (a, b)) in f1.edges().enumerate() {
                    let base = self.vertices.at(a);
                    let Some(point) = g2.plane.intersect_line(&base, &(self.vertices.at(b) - base), true) else {
                        continue;
                    };
                    let projected = g2.project(&point);
                    let on_edge = is_on_edge(&g2.vertices2, &projected, on_edge_tolerance);
                    if !on_edge && !contains_point(&g2.vertices2, &projected) {
                        continue;
                    }
                    let vertex = match new_points.iter().position(|p| (p - point).norm() < merge_distance) {
                        Some(existing) => first_new + existing,
                        None => {
                            new_points.push(point);
                            first_new + new_points.len() - 1
                        },
                    };
                    crossings[i].on_edges[k].push(Crossing { vertex, with: j });
                    if !on_edge {
                        crossings[j].interior.push(Crossing { vertex, with: i });
                    }
                }
            }
        }
        ctx.progress(ids.len(), ids.len());
        trace!(points = new_points.len(), "intersection points found");
        self.vertices.extend(&new_points)?;

        let mut outcome = EditOutcome::new(Selection::new());
        for (slot, &id) in ids.iter().enumerate() {
            let paths = chain_paths(&crossings[slot]);
            if !paths.iter().any(ClipPath::is_closed) {
                continue;
            }
            let pieces = self.walk_pieces(id, &paths, &kept);
            for (n, piece) in pieces.into_iter().enumerate() {
                let facet = self.facets[id].with_indices(piece);
                if n == 0 {
                    let original = std::mem::replace(&mut self.facets[id], facet);
                    outcome.deleted.push(DeletedFacet {
                        facet: original,
                        position: id,
                        replaces_original: true,
                    });
                    outcome.created.push(id);
                    outcome.selection.select_facet(id);
                } else {
                    let created = self.push_facet(facet)?;
                    outcome.created.push(created);
                    outcome.selection.select_facet(created);
                }
            }
        }
        self.initialize_geometry();
        debug!(
            vertices = new_points.len(),
            replaced = outcome.deleted.len(),
            created = outcome.created.len() - outcome.deleted.len(),
            "intersection built"
        );
        Ok(outcome)
    }

    /// Faces of facet `id` cut by its closed clip paths.
    ///
    /// Path ends are inserted into the loop in edge order. Every loop arc
    /// bounds exactly one piece: the walk follows the loop and turns into a
    /// path at each path end it reaches, so pieces bounded only by paths are
    /// found too. With `kept` vertices, only pieces holding one of them stay.
    fn walk_pieces(&self, id: usize, paths: &[ClipPath], kept: &[usize]) -> Vec<Vec<usize>> {
        let indices = self.facets[id].indices();
        let mut nodes: Vec<BoundaryNode> = Vec::with_capacity(indices.len() + 2 * paths.len());
        for (k, &v) in indices.iter().enumerate() {
            nodes.push(BoundaryNode { vertex: v, link: None });
            let origin = self.vertices.at(v);
            let mut ends: Vec<(Real, BoundaryNode)> = Vec::new();
            for (p, path) in paths.iter().enumerate().filter(|(_, path)| path.is_closed()) {
                for (front, end) in [(true, path.front()), (false, path.back())] {
                    if end.edge == Some(k) {
                        let d = (self.vertices.at(end.vertex) - origin).norm();
                        ends.push((d, BoundaryNode { vertex: end.vertex, link: Some((p, front)) }));
                    }
                }
            }
            ends.sort_by(|a, b| a.0.total_cmp(&b.0));
            nodes.extend(ends.into_iter().map(|(_, node)| node));
        }

        let m = nodes.len();
        let mut ends_at: Vec<[Option<usize>; 2]> = vec![[None; 2]; paths.len()];
        for (i, node) in nodes.iter().enumerate() {
            if let Some((p, front)) = node.link {
                ends_at[p][usize::from(!front)] = Some(i);
            }
        }
        let step_limit = 2 * m + paths.iter().map(|p| p.points.len()).sum::<usize>();

        let mut used = vec![false; m];
        let mut pieces = Vec::new();
        for start in 0..m {
            if used[start] {
                continue;
            }
            let mut piece = Vec::new();
            let mut node = start;
            let mut steps = 0;
            loop {
                piece.push(nodes[node].vertex);
                used[node] = true;
                let mut next = (node + 1) % m;
                if let Some((p, front)) = nodes[next].link {
                    let path = &paths[p];
                    let inner = &path.points[1..path.points.len() - 1];
                    piece.push(nodes[next].vertex);
                    if front {
                        piece.extend(inner.iter().map(|q| q.vertex));
                    } else {
                        piece.extend(inner.iter().rev().map(|q| q.vertex));
                    }
                    // leave through the other end of the path
                    if let Some(other) = ends_at[p][usize::from(front)] {
                        next = other;
                    }
                }
                node = next;
                steps += 1;
                if node == start {
                    break;
                }
                if steps > step_limit {
                    warn!(facet = id, "intersection walk did not close");
                    break;
                }
            }

            dedup_loop(&mut piece);
            if piece.len() < 3 {
                continue;
            }
            let lead = if kept.is_empty() {
                piece.iter().position(|v| indices.contains(v))
            } else {
                match piece.iter().position(|v| kept.contains(v)) {
                    Some(k) => Some(k),
                    None => continue,
                }
            };
            if let Some(k) = lead {
                piece.rotate_left(k);
            }
            pieces.push(piece);
        }
        pieces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Horizontal unit square and a vertical wall through x = 0.5.
    fn square_and_wall() -> Geometry<()> {
        Geometry::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.5, -1.0, -1.0),
                Point3::new(0.5, 2.0, -1.0),
                Point3::new(0.5, 2.0, 1.0),
                Point3::new(0.5, -1.0, 1.0),
            ],
            vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]],
            None,
        )
        .unwrap()
    }

    #[test]
    fn wall_cuts_square_in_two() {
        let mut geometry = square_and_wall();
        let mut ctx = EditContext::default();
        let outcome = geometry
            .build_intersection(&mut ctx, &Selection::of_facets([0, 1]))
            .unwrap();

        assert_eq!(geometry.vertex_count(), 10);
        assert_eq!(outcome.deleted.len(), 1);
        assert!(outcome.deleted[0].replaces_original);
        assert_eq!(geometry.facet(0).unwrap().indices(), &[0, 8, 9, 3]);
        assert_eq!(geometry.facet(2).unwrap().indices(), &[1, 2, 9, 8]);
        for id in [0, 2] {
            let area = geometry.facet_geometry(id).unwrap().area;
            assert!((area - 0.5).abs() < 1e-12);
        }
        // the wall only touches the square's plane outside the square
        assert_eq!(geometry.facet(1).unwrap().indices(), &[4, 5, 6, 7]);
    }

    #[test]
    fn kept_vertices_choose_pieces() {
        let mut geometry = square_and_wall();
        let mut ctx = EditContext::default();
        let selection = Selection::of_facets([0, 1]).with_vertices([2]);
        let outcome = geometry.build_intersection(&mut ctx, &selection).unwrap();
        assert_eq!(outcome.created, vec![0]);
        assert_eq!(geometry.facet_count(), 2);
        assert_eq!(geometry.facet(0).unwrap().indices(), &[2, 9, 8, 1]);
    }

    #[test]
    fn strip_between_two_walls_is_kept() {
        let mut points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        for x in [0.3, 0.7] {
            points.push(Point3::new(x, -1.0, -1.0));
            points.push(Point3::new(x, 2.0, -1.0));
            points.push(Point3::new(x, 2.0, 1.0));
            points.push(Point3::new(x, -1.0, 1.0));
        }
        let mut geometry: Geometry<()> = Geometry::from_parts(
            points,
            vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9, 10, 11]],
            None,
        )
        .unwrap();
        let outcome = geometry
            .build_intersection(&mut EditContext::default(), &Selection::of_facets([0, 1, 2]))
            .unwrap();

        assert_eq!(outcome.created, vec![0, 3, 4]);
        assert_eq!(geometry.facet(0).unwrap().indices(), &[0, 12, 13, 3]);
        assert_eq!(geometry.facet(3).unwrap().indices(), &[12, 14, 15, 13]);
        assert_eq!(geometry.facet(4).unwrap().indices(), &[1, 2, 15, 14]);
        let areas: Vec<Real> = outcome
            .created
            .iter()
            .map(|&id| geometry.facet_geometry(id).unwrap().area)
            .collect();
        assert!((areas[0] - 0.3).abs() < 1e-12);
        assert!((areas[1] - 0.4).abs() < 1e-12);
        assert!((areas[2] - 0.3).abs() < 1e-12);
        assert!(outcome.created.iter().all(|&id| geometry.facet_geometry(id).unwrap().normal().z > 0.0));
    }

    #[test]
    fn needs_two_facets() {
        let mut geometry = square_and_wall();
        let err = geometry
            .build_intersection(&mut EditContext::default(), &Selection::of_facets([0]))
            .unwrap_err();
        assert_eq!(err, KernelError::TooFewFacets { minimum: 2, found: 1 });
    }
}
