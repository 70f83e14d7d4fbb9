//! **TransformEngine**
//!
//! Move, rotate, scale, mirror and project the selected facets or vertices,
//! or align the selected facets onto another facet.
//! Facet transforms visit every referenced vertex once, however many selected
//! facets share it. With `copy` the selected facets (or vertices) are cloned
//! first and only the clones move.

use crate::context::EditContext;
use crate::errors::{KernelError, KernelResult, try_grow};
use crate::float_types::{PI, Real};
use crate::geometry::plane::{Axis, Plane};
use crate::geometry::{Geometry, Selection, UndoPoint};
use nalgebra::{Point3, Vector3};
use std::fmt::Debug;
use tracing::{debug, instrument};

/// What a transform did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutcome {
    /// Selection after the transform (the clones when copying)
    pub selection: Selection,
    /// Previous positions of vertices moved in place
    pub undo: Vec<UndoPoint>,
    /// Facets created by copying
    pub created: Vec<usize>,
}

/// Vertices and facets that pin down [`Geometry::align_selected_facets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Alignment {
    pub source_facet: usize,
    pub destination_facet: usize,
    /// Source vertex moved onto `destination_anchor`
    pub source_anchor: usize,
    pub destination_anchor: usize,
    /// Source vertex turned towards `destination_aligner` around the anchor
    pub source_aligner: usize,
    pub destination_aligner: usize,
    /// Make the source normal point against the destination normal
    pub invert_normal: bool,
    /// Swap the source anchor and aligner
    pub invert_source_direction: bool,
    /// Swap the destination anchor and aligner
    pub invert_destination_direction: bool,
}

/// Rotation about `pivot` taking direction `from` onto `to`. Opposite
/// directions turn half way around `half_turn_axis`.
fn turn_onto(
    pivot: Point3<Real>,
    from: &Vector3<Real>,
    to: &Vector3<Real>,
    half_turn_axis: &Vector3<Real>,
) -> KernelResult<Option<(Axis, Real)>> {
    if !(from.norm() > 0.0) || !(to.norm() > 0.0) {
        return Err(KernelError::DegenerateAxis);
    }
    let (from, to) = (from.normalize(), to.normalize());
    let cos = from.dot(&to).clamp(-1.0, 1.0);
    let axis = from.cross(&to);
    if axis.norm() < 1e-5 {
        if cos > 0.0 {
            return Ok(None);
        }
        return Ok(Some((Axis::new(pivot, *half_turn_axis)?, PI)));
    }
    Ok(Some((Axis::new(pivot, axis)?, cos.acos())))
}

fn apply_turn(turn: &Option<(Axis, Real)>, p: Point3<Real>) -> Point3<Real> {
    match turn {
        Some((axis, angle)) => axis.rotate_point(&p, *angle),
        None => p,
    }
}

impl<S: Clone + Debug> Geometry<S> {
    /// Duplicate the selected facets together with the vertices they use,
    /// each vertex copied once. The clones become the selection.
    #[instrument(skip_all)]
    pub fn clone_selected_facets(&mut self, ctx: &mut EditContext, selection: &Selection) -> KernelResult<TransformOutcome> {
        let ids = self.selected_facets(selection)?;
        ctx.confirm_reset()?;
        let created = self.clone_facets(&ids)?;
        self.initialize_geometry();
        Ok(TransformOutcome {
            selection: Selection::of_facets(created.iter().copied()),
            undo: Vec::new(),
            created,
        })
    }

    pub(crate) fn clone_facets(&mut self, ids: &[usize]) -> KernelResult<Vec<usize>> {
        let mut copied: Vec<Option<usize>> = vec![None; self.vertices.len()];
        try_grow(&mut self.facets, ids.len(), "cloning facets")?;
        let mut created = Vec::with_capacity(ids.len());
        for &id in ids {
            let mut indices = Vec::with_capacity(self.facets[id].len());
            for k in 0..self.facets[id].len() {
                let old = self.facets[id].indices()[k];
                let new = match copied[old] {
                    Some(new) => new,
                    None => {
                        let new = self.vertices.push(self.vertices.at(old))?;
                        copied[old] = Some(new);
                        new
                    },
                };
                indices.push(new);
            }
            let clone = self.facets[id].with_indices(indices);
            created.push(self.push_facet(clone)?);
        }
        Ok(created)
    }

    fn transform_facets<F>(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        copy: bool,
        map: F,
    ) -> KernelResult<TransformOutcome>
    where
        F: Fn(&Point3<Real>) -> Point3<Real>,
    {
        let ids = self.selected_facets(selection)?;
        ctx.confirm_reset()?;
        let (targets, created) = if copy {
            let created = self.clone_facets(&ids)?;
            (created.clone(), created)
        } else {
            (ids, Vec::new())
        };

        let mut processed = vec![false; self.vertices.len()];
        let mut undo = Vec::new();
        for &id in &targets {
            for k in 0..self.facets[id].len() {
                let v = self.facets[id].indices()[k];
                if !processed[v] {
                    processed[v] = true;
                    let moved = map(&self.vertices.at(v));
                    undo.push(self.vertices.set(v, moved)?);
                }
            }
        }
        debug!(facets = targets.len(), vertices = undo.len(), copy, "facets transformed");
        if copy {
            undo.clear();
        }
        Ok(TransformOutcome {
            selection: Selection::of_facets(targets.iter().copied()),
            undo,
            created,
        })
    }

    fn transform_vertices<F>(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        copy: bool,
        map: F,
    ) -> KernelResult<TransformOutcome>
    where
        F: Fn(&Point3<Real>) -> Point3<Real>,
    {
        let vertices = self.selected_vertices(selection)?;
        ctx.confirm_reset()?;
        let mut outcome = TransformOutcome {
            selection: Selection {
                facets: selection.facets.clone(),
                vertices: Vec::new(),
            },
            ..TransformOutcome::default()
        };
        for v in vertices {
            let moved = map(&self.vertices.at(v));
            if copy {
                let new = self.vertices.push(moved)?;
                outcome.selection.select_vertex(new);
            } else {
                outcome.undo.push(self.vertices.set(v, moved)?);
                outcome.selection.select_vertex(v);
            }
        }
        self.initialize_geometry();
        Ok(outcome)
    }

    #[instrument(skip_all, fields(copy = copy))]
    pub fn move_selected_facets(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        translation: Vector3<Real>,
        copy: bool,
    ) -> KernelResult<TransformOutcome> {
        let outcome = self.transform_facets(ctx, selection, copy, |p| p + translation)?;
        self.initialize_geometry();
        Ok(outcome)
    }

    /// Rotate by `angle` radians around `axis`; a zero angle only copies when `copy` is set.
    #[instrument(skip_all, fields(angle = angle, copy = copy))]
    pub fn rotate_selected_facets(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        axis: &Axis,
        angle: Real,
        copy: bool,
    ) -> KernelResult<TransformOutcome> {
        let outcome = self.transform_facets(ctx, selection, copy, |p| axis.rotate_point(p, angle))?;
        self.initialize_geometry();
        Ok(outcome)
    }

    /// Scale around `invariant` with one factor per axis.
    #[instrument(skip_all, fields(copy = copy))]
    pub fn scale_selected_facets(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        invariant: Point3<Real>,
        factors: Vector3<Real>,
        copy: bool,
    ) -> KernelResult<TransformOutcome> {
        let outcome = self.transform_facets(ctx, selection, copy, |p| {
            invariant + (p - invariant).component_mul(&factors)
        })?;
        self.initialize_geometry();
        Ok(outcome)
    }

    /// Mirror through `plane`. Mirrored facets get their loops reversed so
    /// their normals still point outwards.
    #[instrument(skip_all, fields(copy = copy))]
    pub fn mirror_selected_facets(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        plane: &Plane,
        copy: bool,
    ) -> KernelResult<TransformOutcome> {
        let outcome = self.transform_facets(ctx, selection, copy, |p| plane.mirror_point(p))?;
        for &id in &outcome.selection.facets {
            self.facets[id].swap_normal();
        }
        self.initialize_geometry();
        Ok(outcome)
    }

    /// Flatten onto `plane`.
    #[instrument(skip_all, fields(copy = copy))]
    pub fn project_selected_facets(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        plane: &Plane,
        copy: bool,
    ) -> KernelResult<TransformOutcome> {
        let outcome = self.transform_facets(ctx, selection, copy, |p| plane.project_point(p))?;
        self.initialize_geometry();
        Ok(outcome)
    }

    /// Move the selected facets rigidly so that the source facet lies on the
    /// destination facet.
    ///
    /// The source anchor lands on the destination anchor, the source normal
    /// is turned onto the destination normal (or its opposite with
    /// `invert_normal`), and finally the facets spin around that normal until
    /// the anchor-to-aligner directions of both facets agree.
    #[instrument(skip_all, fields(copy = copy))]
    pub fn align_selected_facets(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        alignment: &Alignment,
        copy: bool,
    ) -> KernelResult<TransformOutcome> {
        let mut a = *alignment;
        if a.invert_source_direction {
            std::mem::swap(&mut a.source_anchor, &mut a.source_aligner);
        }
        if a.invert_destination_direction {
            std::mem::swap(&mut a.destination_anchor, &mut a.destination_aligner);
        }
        let count = self.vertices.len();
        for index in [a.source_anchor, a.source_aligner, a.destination_anchor, a.destination_aligner] {
            if index >= count {
                return Err(KernelError::IndexOutOfRange { index, count });
            }
        }

        let source = self.facet_geometry(a.source_facet)?;
        let (source_normal, source_nu) = (source.normal(), source.nu);
        let mut target = self.facet_geometry(a.destination_facet)?.normal();
        if a.invert_normal {
            target = -target;
        }

        let pivot = self.vertices.at(a.destination_anchor);
        let translation = pivot - self.vertices.at(a.source_anchor);
        let first = turn_onto(pivot, &source_normal, &target, &source_nu.cross(&source_normal))?;
        let turned_aligner = apply_turn(&first, self.vertices.at(a.source_aligner) + translation);
        let second = turn_onto(
            pivot,
            &(turned_aligner - pivot),
            &(self.vertices.at(a.destination_aligner) - pivot),
            &target,
        )?;
        debug!(first = ?first.as_ref().map(|t| t.1), second = ?second.as_ref().map(|t| t.1), "alignment turns");

        let outcome = self.transform_facets(ctx, selection, copy, |p| {
            apply_turn(&second, apply_turn(&first, p + translation))
        })?;
        self.initialize_geometry();
        Ok(outcome)
    }

    pub fn move_selected_vertices(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        translation: Vector3<Real>,
        copy: bool,
    ) -> KernelResult<TransformOutcome> {
        self.transform_vertices(ctx, selection, copy, |p| p + translation)
    }

    pub fn rotate_selected_vertices(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        axis: &Axis,
        angle: Real,
        copy: bool,
    ) -> KernelResult<TransformOutcome> {
        self.transform_vertices(ctx, selection, copy, |p| axis.rotate_point(p, angle))
    }

    pub fn scale_selected_vertices(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        invariant: Point3<Real>,
        factors: Vector3<Real>,
        copy: bool,
    ) -> KernelResult<TransformOutcome> {
        self.transform_vertices(ctx, selection, copy, |p| {
            invariant + (p - invariant).component_mul(&factors)
        })
    }

    pub fn mirror_selected_vertices(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        plane: &Plane,
        copy: bool,
    ) -> KernelResult<TransformOutcome> {
        self.transform_vertices(ctx, selection, copy, |p| plane.mirror_point(p))
    }

    pub fn project_selected_vertices(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        plane: &Plane,
        copy: bool,
    ) -> KernelResult<TransformOutcome> {
        self.transform_vertices(ctx, selection, copy, |p| plane.project_point(p))
    }

    /// Axis through two selected vertices, first to second.
    pub fn axis_from_vertices(&self, selection: &Selection) -> KernelResult<Axis> {
        let vertices = self.selected_vertices(selection)?;
        if vertices.len() != 2 {
            return Err(KernelError::VertexSelection {
                expected: 2,
                found: vertices.len(),
            });
        }
        Axis::through(self.vertices.at(vertices[0]), self.vertices.at(vertices[1]))
    }

    /// Axis along a facet's normal through its center.
    pub fn axis_from_facet_normal(&self, facet: usize) -> KernelResult<Axis> {
        let g = self.facet_geometry(facet)?;
        Axis::new(g.center, g.normal())
    }
}
