//! **FacetSplitter**
//!
//! Cuts facets with a plane. Each facet is reduced to a 2D problem on the
//! line where the cut plane crosses it: vertices are classified by side,
//! cut points are inserted where the side changes, then paired by their
//! position along the line so that following the pairs never crosses.

use crate::context::EditContext;
use crate::errors::{KernelError, KernelResult};
use crate::float_types::Real;
use crate::geometry::facet::FacetGeometry;
use crate::geometry::{EditOutcome, Geometry, Plane, Selection, dedup_loop};
use hashbrown::HashMap;
use nalgebra::{Point2, Point3, Vector2};
use std::fmt::Debug;
use tracing::{debug, instrument, warn};

/// One vertex of a facet loop being cut.
#[derive(Debug, Clone, Copy)]
struct CutNode {
    q: Point2<Real>,
    vertex: usize,
    /// Side of the cut line; vertices on the line keep the previous side
    inside: bool,
    on_line: bool,
}

/// How one facet is cut.
enum CutPlan {
    /// The cut plane is parallel to or contains the facet
    NoLine,
    /// The facet lies on one side
    Untouched,
    /// Loops of the pieces
    Pieces(Vec<Vec<usize>>),
    /// Odd number of cut points, left alone
    Inconsistent,
}

/// Point and direction of the line where `plane` crosses the facet, in its basis.
fn cut_line(g: &FacetGeometry, plane: &Plane) -> Option<(Point2<Real>, Vector2<Real>)> {
    let candidates = [
        (g.origin, g.u),
        (g.origin, g.v),
        (g.origin + g.u, -g.u),
        (g.origin + g.v, -g.v),
    ];
    let point = candidates
        .iter()
        .find_map(|(origin, direction)| plane.intersect_line(origin, direction, false))?;
    let direction = g.project_direction(&plane.normal.cross(&g.normal()));
    if direction.norm_squared() == 0.0 {
        return None;
    }
    Some((g.project(&point), direction))
}

/// Drop the cut points a facet added since `rollback`.
fn forget_points(
    new_points: &mut Vec<Point3<Real>>,
    edge_points: &mut HashMap<(usize, usize), usize>,
    first_new: usize,
    rollback: usize,
) {
    new_points.truncate(rollback);
    edge_points.retain(|_, v| *v < first_new + rollback);
}

impl<S: Clone + Debug> Geometry<S> {
    /// Plane through the first vertex of a facet, along its normal.
    pub fn cut_plane_from_facet(&self, facet: usize) -> KernelResult<Plane> {
        let g = self.facet_geometry(facet)?;
        let first = self.vertices.at(self.facets[facet].indices()[0]);
        Plane::from_point_normal(first, g.normal())
    }

    /// Plane through three selected vertices, in pick order.
    pub fn cut_plane_from_vertices(&self, selection: &Selection) -> KernelResult<Plane> {
        let vertices = self.selected_vertices(selection)?;
        if vertices.len() != 3 {
            return Err(KernelError::VertexSelection {
                expected: 3,
                found: vertices.len(),
            });
        }
        Plane::from_points(
            self.vertices.at(vertices[0]),
            self.vertices.at(vertices[1]),
            self.vertices.at(vertices[2]),
        )
    }

    /// Cut every selected facet with `plane`.
    ///
    /// Cut facets are replaced by their pieces, which are appended and
    /// selected; the originals are returned for undo. Facets the plane does
    /// not cross are left alone. Facets parallel to the plane, or whose cut
    /// is inconsistent, are listed in `skipped` and deselected.
    #[instrument(skip_all, fields(facets = selection.facets.len()))]
    pub fn split_selected_facets(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        plane: &Plane,
    ) -> KernelResult<EditOutcome<S>> {
        let ids = self.selected_facets(selection)?;
        ctx.confirm_reset()?;

        let first_new = self.vertices.len();
        let mut new_points: Vec<Point3<Real>> = Vec::new();
        let mut edge_points: HashMap<(usize, usize), usize> = HashMap::new();
        let mut cut: Vec<(usize, Vec<Vec<usize>>)> = Vec::new();
        let mut outcome = EditOutcome::new(Selection::new());
        for (n, &id) in ids.iter().enumerate() {
            ctx.check_cancelled()?;
            ctx.progress(n, ids.len());
            match self.plan_cut(id, plane, first_new, &mut new_points, &mut edge_points)? {
                CutPlan::Pieces(pieces) => cut.push((id, pieces)),
                CutPlan::Untouched => {},
                CutPlan::NoLine => outcome.skipped.push(id),
                CutPlan::Inconsistent => {
                    warn!(facet = id, "odd number of cut points, facet left unsplit");
                    outcome.skipped.push(id);
                },
            }
        }
        ctx.progress(ids.len(), ids.len());
        self.vertices.extend(&new_points)?;

        let mut created = Vec::new();
        for (id, pieces) in &cut {
            let normal = self.facet_geometry(*id)?.normal();
            for piece in pieces {
                let mut facet = self.facets[*id].with_indices(piece.clone());
                let g = FacetGeometry::compute(piece, &self.vertices, &self.settings);
                if g.normal().dot(&normal) < 0.0 {
                    facet.swap_normal();
                }
                created.push(self.push_facet(facet)?);
            }
        }

        let originals: Vec<usize> = cut.iter().map(|(id, _)| *id).collect();
        let removal = self.remove_facet_ids(&originals);
        outcome.deleted = removal.deleted;
        for id in created {
            if let Some(Some(renumbered)) = removal.new_refs.get(id) {
                outcome.created.push(*renumbered);
                outcome.selection.select_facet(*renumbered);
            }
        }
        for skipped in &mut outcome.skipped {
            if let Some(Some(renumbered)) = removal.new_refs.get(*skipped) {
                *skipped = *renumbered;
            }
        }
        self.initialize_geometry();
        debug!(
            cut = originals.len(),
            created = outcome.created.len(),
            skipped = outcome.skipped.len(),
            vertices = new_points.len(),
            "facets split"
        );
        Ok(outcome)
    }

    /// Work out the pieces of one facet. New cut points are appended to
    /// `new_points`, numbered from `first_new`; `edge_points` maps an edge
    /// already cut for another facet to its cut vertex.
    fn plan_cut(
        &self,
        id: usize,
        plane: &Plane,
        first_new: usize,
        new_points: &mut Vec<Point3<Real>>,
        edge_points: &mut HashMap<(usize, usize), usize>,
    ) -> KernelResult<CutPlan> {
        let g = self.facet_geometry(id)?;
        let Some((origin, direction)) = cut_line(g, plane) else {
            return Ok(CutPlan::NoLine);
        };
        let ortho = Vector2::new(direction.y, -direction.x);
        let epsilon = self.settings.cut_side_epsilon;
        let side = |q: &Point2<Real>| {
            let a = ortho.dot(&(q - origin));
            if a > epsilon {
                1
            } else if a < -epsilon {
                -1
            } else {
                0
            }
        };

        let indices = self.facets[id].indices();
        let n = indices.len();
        let Some(start) = (0..n).find(|&k| side(&g.vertices2[k]) != 0) else {
            return Ok(CutPlan::Untouched);
        };
        let mut inside = side(&g.vertices2[start]) == 1;
        let nodes: Vec<CutNode> = (0..n)
            .map(|m| {
                let k = (start + m) % n;
                let q = g.vertices2[k];
                let s = side(&q);
                if s != 0 {
                    inside = s == 1;
                }
                CutNode {
                    q,
                    vertex: indices[k],
                    inside,
                    on_line: s == 0,
                }
            })
            .collect();

        let rollback = new_points.len();
        let mut sequence: Vec<CutNode> = Vec::with_capacity(2 * n);
        let mut cuts: Vec<usize> = Vec::new();
        for m in 0..n {
            let (a, b) = (nodes[m], nodes[(m + 1) % n]);
            sequence.push(a);
            if a.inside == b.inside {
                continue;
            }
            if a.on_line {
                cuts.push(sequence.len() - 1);
                continue;
            }
            let v = b.q - a.q;
            let w = origin - a.q;
            let denominator = v.x * direction.y - v.y * direction.x;
            if denominator == 0.0 {
                forget_points(new_points, edge_points, first_new, rollback);
                return Ok(CutPlan::Inconsistent);
            }
            let s = (v.y * w.x - v.x * w.y) / denominator;
            let q = origin + direction * s;
            let key = if a.vertex < b.vertex {
                (a.vertex, b.vertex)
            } else {
                (b.vertex, a.vertex)
            };
            let vertex = *edge_points.entry(key).or_insert_with(|| {
                new_points.push(g.lift(&q));
                first_new + new_points.len() - 1
            });
            sequence.push(CutNode {
                q,
                vertex,
                inside: a.inside,
                on_line: true,
            });
            cuts.push(sequence.len() - 1);
        }

        if cuts.is_empty() {
            return Ok(CutPlan::Untouched);
        }
        if cuts.len() % 2 != 0 {
            forget_points(new_points, edge_points, first_new, rollback);
            return Ok(CutPlan::Inconsistent);
        }

        let along = |k: usize| (sequence[k].q - origin).dot(&direction);
        cuts.sort_by(|&a, &b| along(a).total_cmp(&along(b)));
        let mut link: Vec<Option<usize>> = vec![None; sequence.len()];
        for pair in cuts.chunks_exact(2) {
            link[pair[0]] = Some(pair[1]);
            link[pair[1]] = Some(pair[0]);
        }

        let len = sequence.len();
        let mut visited = vec![false; len];
        let mut pieces = Vec::new();
        for first in 0..len {
            if visited[first] {
                continue;
            }
            let mut piece = Vec::new();
            let mut k = first;
            for _ in 0..len {
                visited[k] = true;
                piece.push(sequence[k].vertex);
                if let Some(other) = link[k] {
                    k = other;
                    visited[k] = true;
                    piece.push(sequence[k].vertex);
                }
                k = (k + 1) % len;
                if k == first {
                    break;
                }
            }
            dedup_loop(&mut piece);
            if piece.len() >= 3 {
                pieces.push(piece);
            }
        }
        Ok(CutPlan::Pieces(pieces))
    }
}
