//! Basic facet editing: adding, removing and restoring facets, orientation
//! changes, structures and cleanup of degenerate facets and vertices.

use crate::context::EditContext;
use crate::errors::{KernelError, KernelResult, try_grow};
use crate::float_types::Real;
use crate::geometry::plane::Plane;
use crate::geometry::{DeletedFacet, EditOutcome, Facet, Geometry, Selection};
use geo::ConvexHull;
use nalgebra::Point2;
use std::fmt::Debug;
use tracing::{debug, instrument};

/// Facets removed by a command, with the old→new facet id table.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal<S: Clone> {
    pub deleted: Vec<DeletedFacet<S>>,
    pub new_refs: Vec<Option<usize>>,
}

impl<S: Clone + Debug> Geometry<S> {
    /// Append a facet. The new facet becomes the only selected one.
    #[instrument(skip_all, fields(vertices = indices.len()))]
    pub fn add_facet(
        &mut self,
        ctx: &mut EditContext,
        indices: Vec<usize>,
        metadata: Option<S>,
    ) -> KernelResult<EditOutcome<S>> {
        self.validate_loop(&indices)?;
        ctx.confirm_reset()?;
        let id = self.push_facet(Facet::new(indices, metadata))?;
        self.initialize_geometry();
        let mut outcome = EditOutcome::new(Selection::of_facets([id]));
        outcome.created.push(id);
        Ok(outcome)
    }

    /// Remove facets by id. Unknown ids are rejected before anything changes.
    #[instrument(skip_all, fields(count = ids.len()))]
    pub fn remove_facets(&mut self, ctx: &mut EditContext, ids: &[usize]) -> KernelResult<Removal<S>> {
        if let Some(&id) = ids.iter().find(|&&id| id >= self.facets.len()) {
            return Err(KernelError::NoSuchFacet(id));
        }
        ctx.confirm_reset()?;
        Ok(self.remove_facet_ids(ids))
    }

    pub(crate) fn remove_facet_ids(&mut self, ids: &[usize]) -> Removal<S> {
        let mut remove = vec![false; self.facets.len()];
        for &id in ids {
            if let Some(flag) = remove.get_mut(id) {
                *flag = true;
            }
        }

        let mut new_refs = Vec::with_capacity(self.facets.len());
        let mut deleted = Vec::new();
        let mut kept = Vec::with_capacity(self.facets.len());
        for (position, facet) in std::mem::take(&mut self.facets).into_iter().enumerate() {
            if remove[position] {
                new_refs.push(None);
                deleted.push(DeletedFacet {
                    facet,
                    position,
                    replaces_original: false,
                });
            } else {
                new_refs.push(Some(kept.len()));
                kept.push(facet);
            }
        }
        self.facets = kept;
        self.renumber_neighbors(&new_refs);
        debug!(removed = deleted.len(), "facets removed");
        Removal { deleted, new_refs }
    }

    /// Put removed facets back, at their former positions or at the end.
    ///
    /// Records with `replaces_original` overwrite the facet now at their
    /// position. Returns the ids of the restored facets.
    #[instrument(skip_all, fields(count = records.len(), to_end = to_end))]
    pub fn restore_facets(
        &mut self,
        ctx: &mut EditContext,
        records: Vec<DeletedFacet<S>>,
        to_end: bool,
    ) -> KernelResult<Vec<usize>> {
        let count = self.vertices.len();
        for record in &records {
            if let Some(&index) = record.facet.indices().iter().find(|&&i| i >= count) {
                return Err(KernelError::IndexOutOfRange { index, count });
            }
        }
        ctx.confirm_reset()?;
        self.reinsert_facets(records, to_end)
    }

    pub(crate) fn reinsert_facets(&mut self, mut records: Vec<DeletedFacet<S>>, to_end: bool) -> KernelResult<Vec<usize>> {
        try_grow(&mut self.facets, records.len(), "restoring facets")?;

        let mut restored = Vec::with_capacity(records.len());
        if to_end {
            for record in records {
                restored.push(self.push_facet(record.facet)?);
            }
        } else {
            records.sort_by_key(|r| r.position);
            for record in records {
                let position = record.position.min(self.facets.len());
                if record.replaces_original && position < self.facets.len() {
                    self.facets[position] = record.facet;
                } else {
                    self.facets.insert(position, record.facet);
                    for id in &mut restored {
                        if *id >= position {
                            *id += 1;
                        }
                    }
                }
                restored.push(position);
            }
            for facet in &mut self.facets {
                facet.neighbors.clear();
            }
        }
        self.initialize_geometry();
        Ok(restored)
    }

    /// Revert a facet-creating command from its outcome.
    pub fn undo_outcome(&mut self, ctx: &mut EditContext, outcome: EditOutcome<S>) -> KernelResult<()> {
        let replaced: Vec<usize> = outcome
            .deleted
            .iter()
            .filter(|d| d.replaces_original)
            .map(|d| d.position)
            .collect();
        let appended: Vec<usize> = outcome
            .created
            .iter()
            .copied()
            .filter(|id| !replaced.contains(id))
            .collect();
        ctx.confirm_reset()?;
        self.remove_facet_ids(&appended);
        self.reinsert_facets(outcome.deleted, false)?;
        Ok(())
    }

    /// Reverse the loop, hence the normal, of every selected facet.
    #[instrument(skip_all)]
    pub fn swap_normal(&mut self, ctx: &mut EditContext, selection: &Selection) -> KernelResult<()> {
        let ids = self.selected_facets(selection)?;
        ctx.confirm_reset()?;
        for id in ids {
            self.facets[id].swap_normal();
        }
        self.initialize_geometry();
        Ok(())
    }

    /// Swap back the selected facets whose orientation was corrected at derivation.
    pub fn revert_flipped_normals(&mut self, ctx: &mut EditContext, selection: &Selection) -> KernelResult<usize> {
        let ids = self.selected_facets(selection)?;
        let mut flipped = Vec::new();
        for id in ids {
            if self.facet_geometry(id)?.normal_flipped {
                flipped.push(id);
            }
        }
        ctx.confirm_reset()?;
        for &id in &flipped {
            self.facets[id].swap_normal();
        }
        self.initialize_geometry();
        Ok(flipped.len())
    }

    /// Rotate the loop of every selected facet by one position.
    pub fn shift_vertex(&mut self, ctx: &mut EditContext, selection: &Selection) -> KernelResult<()> {
        let ids = self.selected_facets(selection)?;
        ctx.confirm_reset()?;
        for id in ids {
            self.facets[id].shift_vertex(1);
        }
        self.initialize_geometry();
        Ok(())
    }

    pub fn structures(&self) -> &[String] {
        &self.structures
    }

    pub fn add_structure(&mut self, name: impl Into<String>) -> usize {
        self.structures.push(name.into());
        self.structures.len() - 1
    }

    /// Structure new facets are tagged with, `None` for all structures.
    pub fn set_view_structure(&mut self, structure: Option<usize>) -> KernelResult<()> {
        if let Some(id) = structure {
            if id >= self.structures.len() {
                return Err(KernelError::NoSuchStructure(id));
            }
        }
        self.view_structure = structure;
        Ok(())
    }

    pub const fn view_structure(&self) -> Option<usize> {
        self.view_structure
    }

    /// Facet ids tagged with `structure`.
    pub fn structure_facets(&self, structure: usize) -> Vec<usize> {
        (0..self.facets.len())
            .filter(|&id| self.facets[id].super_idx == Some(structure))
            .collect()
    }

    /// Delete a structure and its facets; later structures move down by one.
    #[instrument(skip_all, fields(structure = structure))]
    pub fn delete_structure(&mut self, ctx: &mut EditContext, structure: usize) -> KernelResult<Removal<S>> {
        if structure >= self.structures.len() {
            return Err(KernelError::NoSuchStructure(structure));
        }
        ctx.confirm_reset()?;
        let ids = self.structure_facets(structure);
        let removal = self.remove_facet_ids(&ids);
        self.structures.remove(structure);
        for facet in &mut self.facets {
            if let Some(s) = facet.super_idx {
                if s > structure {
                    facet.super_idx = Some(s - 1);
                }
            }
        }
        self.view_structure = match self.view_structure {
            Some(s) if s == structure => None,
            Some(s) if s > structure => Some(s - 1),
            other => other,
        };
        Ok(removal)
    }

    /// Remove facets whose vertices all lie on one line.
    pub fn remove_collinear(&mut self, ctx: &mut EditContext) -> KernelResult<Removal<S>> {
        let mut ids = Vec::new();
        for id in 0..self.facets.len() {
            if self.facet_geometry(id)?.collinear {
                ids.push(id);
            }
        }
        ctx.confirm_reset()?;
        Ok(self.remove_facet_ids(&ids))
    }

    /// Remove facets with an area below the null-area threshold.
    pub fn remove_null_facets(&mut self, ctx: &mut EditContext) -> KernelResult<Removal<S>> {
        let mut ids = Vec::new();
        for id in 0..self.facets.len() {
            if self.facet_geometry(id)?.area < self.settings.null_area {
                ids.push(id);
            }
        }
        ctx.confirm_reset()?;
        Ok(self.remove_facet_ids(&ids))
    }

    /// Vertices no facet refers to.
    pub fn isolated_vertices(&self) -> Vec<usize> {
        let used = self.vertex_usage();
        (0..self.vertices.len()).filter(|&v| !used[v]).collect()
    }

    fn vertex_usage(&self) -> Vec<bool> {
        let mut used = vec![false; self.vertices.len()];
        for facet in &self.facets {
            for &i in facet.indices() {
                used[i] = true;
            }
        }
        used
    }

    /// Delete unreferenced vertices (only selected ones when a selection is given)
    /// and renumber all facets. Returns the old→new vertex table.
    #[instrument(skip_all)]
    pub fn delete_isolated_vertices(
        &mut self,
        ctx: &mut EditContext,
        only: Option<&Selection>,
    ) -> KernelResult<Vec<Option<usize>>> {
        ctx.confirm_reset()?;
        let mut keep = self.vertex_usage();
        if let Some(selection) = only {
            let mut selected = vec![false; keep.len()];
            for &v in &selection.vertices {
                if let Some(flag) = selected.get_mut(v) {
                    *flag = true;
                }
            }
            for (flag, &sel) in keep.iter_mut().zip(&selected) {
                *flag = *flag || !sel;
            }
        }
        Ok(self.compact_vertices(&keep))
    }

    pub(crate) fn compact_vertices(&mut self, keep: &[bool]) -> Vec<Option<usize>> {
        let remap = self.vertices.compact(keep);
        for facet in &mut self.facets {
            let indices = facet.indices_mut();
            for i in indices.iter_mut() {
                // referenced vertices are always kept
                *i = remap[*i].unwrap_or(*i);
            }
        }
        self.initialize_geometry();
        debug!(vertices = self.vertices.len(), "vertices compacted");
        remap
    }

    /// Take the selected vertices out of every facet; facets left with fewer
    /// than three vertices are removed, then the vertices themselves are deleted.
    #[instrument(skip_all)]
    pub fn remove_selected_vertices(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
    ) -> KernelResult<Removal<S>> {
        let vertices = self.selected_vertices(selection)?;
        ctx.confirm_reset()?;
        let mut selected = vec![false; self.vertices.len()];
        for v in vertices {
            selected[v] = true;
        }

        let mut emptied = Vec::new();
        let mut shortened = Vec::new();
        for (id, facet) in self.facets.iter().enumerate() {
            if facet.indices().iter().any(|&i| selected[i]) {
                let mut remaining: Vec<usize> =
                    facet.indices().iter().copied().filter(|&i| !selected[i]).collect();
                crate::geometry::dedup_loop(&mut remaining);
                if remaining.len() < 3 {
                    emptied.push(id);
                } else {
                    shortened.push((id, remaining));
                }
            }
        }
        for (id, remaining) in shortened {
            self.facets[id].set_indices(remaining);
        }
        let removal = self.remove_facet_ids(&emptied);
        let keep: Vec<bool> = selected.iter().map(|&s| !s).collect();
        self.compact_vertices(&keep);
        Ok(removal)
    }

    /// One facet made of the first selected facet with the second cut out of
    /// it, the two loops joined by a slit at their first vertices.
    #[instrument(skip_all)]
    pub fn create_difference(&mut self, ctx: &mut EditContext, selection: &Selection) -> KernelResult<EditOutcome<S>> {
        let ids = self.exact_facets(selection, 2)?;
        let (outer, inner) = (&self.facets[ids[0]], &self.facets[ids[1]]);
        let mut indices = Vec::with_capacity(outer.len() + inner.len() + 2);
        indices.extend_from_slice(outer.indices());
        indices.push(outer.index(0));
        for i in 0..inner.len() as isize {
            indices.push(inner.index(-i));
        }
        indices.push(inner.index(0));
        let facet = outer.with_indices(indices);

        ctx.confirm_reset()?;
        let id = self.push_facet(facet)?;
        self.initialize_geometry();
        let mut outcome = EditOutcome::new(Selection::of_facets([id]));
        outcome.created.push(id);
        Ok(outcome)
    }

    /// New facet through the selected vertices: their convex hull when
    /// `convex`, otherwise the vertices in pick order.
    #[instrument(skip_all, fields(convex = convex))]
    pub fn create_polygon_from_vertices(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        convex: bool,
        metadata: Option<S>,
    ) -> KernelResult<EditOutcome<S>> {
        let vertices = self.selected_vertices(selection)?;
        if vertices.len() < 3 {
            return Err(KernelError::TooFewVertices {
                minimum: 3,
                found: vertices.len(),
            });
        }
        let indices = if convex {
            self.convex_loop(&vertices)?
        } else {
            vertices
        };
        self.validate_loop(&indices)?;
        ctx.confirm_reset()?;
        let id = self.push_facet(Facet::new(indices, metadata))?;
        self.initialize_geometry();
        let mut outcome = EditOutcome::new(Selection::of_facets([id]));
        outcome.created.push(id);
        Ok(outcome)
    }

    /// Hull of the vertices projected on the plane of the first three,
    /// counter-clockwise around that plane's normal.
    fn convex_loop(&self, vertices: &[usize]) -> KernelResult<Vec<usize>> {
        let p: Vec<_> = vertices.iter().map(|&v| self.vertices.at(v)).collect();
        let plane = Plane::from_points(p[0], p[1], p[2])?;
        let u = (p[1] - p[0]).normalize();
        let v = plane.normal.cross(&u);
        let projected: Vec<Point2<Real>> = p
            .iter()
            .map(|q| Point2::new((q - p[0]).dot(&u), (q - p[0]).dot(&v)))
            .collect();

        let cloud: geo::MultiPoint<Real> = projected
            .iter()
            .map(|q| geo::Point::new(q.x, q.y))
            .collect::<Vec<_>>()
            .into();
        let hull = cloud.convex_hull();

        let mut indices = Vec::new();
        for c in hull.exterior().coords() {
            let found = projected
                .iter()
                .position(|q| (q.x - c.x).abs() < 1e-12 && (q.y - c.y).abs() < 1e-12);
            if let Some(k) = found {
                indices.push(vertices[k]);
            }
        }
        crate::geometry::dedup_loop(&mut indices);
        Ok(indices)
    }
}
