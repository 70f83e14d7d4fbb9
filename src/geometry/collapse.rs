//! **Vertex collapsing and facet merging**
//!
//! [`Geometry::collapse_vertices`] fuses vertices closer than a tolerance;
//! [`Geometry::merge_coplanar_facets`] joins adjacent coplanar facets through
//! their shared edge chain; [`Geometry::collapse`] runs the full cleanup
//! pipeline used after importing or editing a model.

use crate::context::EditContext;
use crate::errors::{KernelError, KernelResult};
use crate::float_types::Real;
use crate::geometry::facet::FacetGeometry;
use crate::geometry::neighbors::{CommonEdge, find_common_edge};
use crate::geometry::{Facet, Geometry, Selection, dedup_loop};
use nalgebra::Point3;
use std::fmt::Debug;
use tracing::{debug, instrument};

/// Join two loops along their shared chain; the chain's inner vertices are dropped.
pub fn merge_facet_loops(f1: &[usize], f2: &[usize], common: &CommonEdge) -> Vec<usize> {
    let (n1, n2) = (f1.len(), f2.len());
    let CommonEdge {
        start1: c1,
        start2: c2,
        length: l,
    } = *common;
    let at1 = |k: usize| f1[k % n1];
    let at2 = |k: usize| f2[k % n2];

    if n1 + n2 <= 2 * l {
        return f1.to_vec();
    }
    let mut merged = Vec::with_capacity(n1 + n2 - 2 * l);
    if l == n1 {
        merged.extend((0..n2 - l).map(|k| at2(c2 + 2 + k)));
    } else if l == n2 {
        merged.extend((0..n1 - l).map(|k| at1(c1 + l + k)));
    } else {
        merged.extend((0..n1 - (l - 1)).map(|k| at1(c1 + l + k)));
        merged.extend((0..n2 - (l + 1)).map(|k| at2(c2 + 2 + k)));
    }
    merged
}

/// Options of the full [`Geometry::collapse`] pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CollapseOptions {
    /// Vertices closer than this are fused; `None` skips the stage
    pub vertex_tolerance: Option<Real>,
    /// Plane coefficients closer than this count as coplanar; `None` skips facet merging
    pub facet_tolerance: Option<Real>,
    /// Sides bending by less than this angle (radians) are straightened; `None` skips the stage
    pub collinear_angle: Option<Real>,
    /// Restrict every stage to these facets and vertices
    pub only: Option<Selection>,
}

impl Default for CollapseOptions {
    fn default() -> Self {
        CollapseOptions {
            vertex_tolerance: Some(1e-5),
            facet_tolerance: Some(1e-3),
            collinear_angle: Some(1e-3),
            only: None,
        }
    }
}

/// What [`Geometry::collapse`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollapseReport {
    pub vertices_removed: usize,
    pub facets_removed: usize,
    pub facets_merged: usize,
    pub vertices_straightened: usize,
}

impl<S: Clone + Debug + PartialEq> Geometry<S> {
    /// Fuse vertices closer than `tolerance` and remap every facet.
    ///
    /// With a selection only its vertices are fused. Consecutive repeats
    /// created in facet loops are dropped; collinear or null facets that
    /// result are left for [`Geometry::remove_collinear`] and
    /// [`Geometry::remove_null_facets`]. Returns the old→new vertex table.
    #[instrument(skip_all, fields(tolerance = tolerance, vertices = self.vertices.len()))]
    pub fn collapse_vertices(
        &mut self,
        ctx: &mut EditContext,
        tolerance: Real,
        only: Option<&Selection>,
    ) -> KernelResult<Vec<usize>> {
        ctx.confirm_reset()?;
        self.fuse_vertices(ctx, tolerance, only)
    }

    pub(crate) fn fuse_vertices(
        &mut self,
        ctx: &mut EditContext,
        tolerance: Real,
        only: Option<&Selection>,
    ) -> KernelResult<Vec<usize>> {
        let count = self.vertices.len();
        let mut selected = vec![only.is_none(); count];
        if let Some(selection) = only {
            for &v in &selection.vertices {
                if let Some(flag) = selected.get_mut(v) {
                    *flag = true;
                }
            }
        }

        let tol2 = tolerance * tolerance;
        let mut references: Vec<Point3<Real>> = Vec::new();
        let mut mergeable: Vec<bool> = Vec::new();
        let mut remap = Vec::with_capacity(count);
        for (i, p) in self.vertices.iter().enumerate() {
            if i % 256 == 0 {
                ctx.check_cancelled()?;
                ctx.progress(i, count);
            }
            let existing = if selected[i] {
                references.iter().zip(&mergeable).position(|(r, &m)| {
                    m && (r.x - p.x).abs() < tolerance
                        && (r.y - p.y).abs() < tolerance
                        && (r.z - p.z).abs() < tolerance
                        && (r - p).norm_squared() < tol2
                })
            } else {
                None
            };
            match existing {
                Some(r) => remap.push(r),
                None => {
                    references.push(*p);
                    mergeable.push(selected[i]);
                    remap.push(references.len() - 1);
                },
            }
        }
        ctx.check_cancelled()?;

        let removed = count - references.len();
        self.vertices.replace(references);
        for facet in &mut self.facets {
            let indices = facet.indices_mut();
            for i in indices.iter_mut() {
                *i = remap[*i];
            }
            dedup_loop(indices);
        }
        self.initialize_geometry();
        debug!(removed, "vertices collapsed");
        Ok(remap)
    }

    fn coplanar_and_equal(&self, a: (&FacetGeometry, usize), b: (&FacetGeometry, usize), tolerance: Real) -> bool {
        let (ga, gb) = (a.0, b.0);
        let dn = ga.normal() - gb.normal();
        dn.x.abs() < tolerance
            && dn.y.abs() < tolerance
            && dn.z.abs() < tolerance
            && (ga.plane.w - gb.plane.w).abs() < tolerance
            && self.facets[a.1].metadata == self.facets[b.1].metadata
            && self.facets[a.1].super_idx == self.facets[b.1].super_idx
    }

    /// Facet joining `f1` and `f2` along their shared edge chain, with the
    /// properties of `f1`. `None` when they share no edge. Coplanarity is not
    /// checked and the geometry is left unchanged.
    pub fn merge_facets(&self, f1: usize, f2: usize) -> KernelResult<Option<Facet<S>>> {
        let (a, b) = (self.facet(f1)?, self.facet(f2)?);
        Ok(find_common_edge(a.indices(), b.indices()).map(|common| {
            let mut merged = merge_facet_loops(a.indices(), b.indices(), &common);
            dedup_loop(&mut merged);
            a.with_indices(merged)
        }))
    }

    /// Merge adjacent facets that are coplanar within `tolerance` and carry
    /// equal metadata. Returns the number of merges.
    #[instrument(skip_all, fields(tolerance = tolerance))]
    pub fn merge_coplanar_facets(
        &mut self,
        ctx: &mut EditContext,
        tolerance: Real,
        only: Option<&Selection>,
    ) -> KernelResult<usize> {
        let ids: Vec<usize> = match only {
            Some(selection) => self.selected_facets(selection)?,
            None => (0..self.facets.len()).collect(),
        };
        ctx.confirm_reset()?;
        self.merge_coplanar(ctx, tolerance, &ids)
    }

    fn merge_coplanar(&mut self, ctx: &mut EditContext, tolerance: Real, ids: &[usize]) -> KernelResult<usize> {
        let mut geometries = Vec::with_capacity(self.facets.len());
        for id in 0..self.facets.len() {
            geometries.push(self.facet_geometry(id)?.clone());
        }

        let mut loops: Vec<Vec<usize>> = self.facets.iter().map(|f| f.indices().to_vec()).collect();
        let mut removed = vec![false; self.facets.len()];
        let mut merges = 0;
        for (k, &i) in ids.iter().enumerate() {
            ctx.check_cancelled()?;
            ctx.progress(k, ids.len());
            if removed[i] {
                continue;
            }
            let mut restart = true;
            while restart {
                restart = false;
                for &j in &ids[k + 1..] {
                    if removed[j] || !self.coplanar_and_equal((&geometries[i], i), (&geometries[j], j), tolerance) {
                        continue;
                    }
                    let Some(common) = find_common_edge(&loops[i], &loops[j]) else {
                        continue;
                    };
                    let mut merged = merge_facet_loops(&loops[i], &loops[j], &common);
                    dedup_loop(&mut merged);
                    if merged.len() < 3 {
                        continue;
                    }
                    geometries[i] = FacetGeometry::compute(&merged, &self.vertices, &self.settings);
                    loops[i] = merged;
                    removed[j] = true;
                    merges += 1;
                    restart = true;
                    break;
                }
            }
        }

        for (id, indices) in loops.into_iter().enumerate() {
            if !removed[id] && indices.as_slice() != self.facets[id].indices() {
                self.facets[id].set_indices(indices);
            }
        }
        let gone: Vec<usize> = (0..removed.len()).filter(|&id| removed[id]).collect();
        self.remove_facet_ids(&gone);
        self.initialize_geometry();
        debug!(merges, "coplanar facets merged");
        Ok(merges)
    }

    /// Drop the middle vertex of sides bending by less than `angle` radians,
    /// keeping at least three vertices per facet. Returns the number of vertices dropped.
    pub fn merge_collinear_sides(
        &mut self,
        ctx: &mut EditContext,
        angle: Real,
        only: Option<&Selection>,
    ) -> KernelResult<usize> {
        let ids: Vec<usize> = match only {
            Some(selection) => self.selected_facets(selection)?,
            None => (0..self.facets.len()).collect(),
        };
        ctx.confirm_reset()?;
        Ok(self.straighten_sides(angle, &ids))
    }

    fn straighten_sides(&mut self, angle: Real, ids: &[usize]) -> usize {
        let threshold = angle.cos();
        let mut dropped = 0;
        for &id in ids {
            let mut indices = self.facets[id].indices().to_vec();
            let before = indices.len();
            let mut k = 0;
            while indices.len() > 3 && k < indices.len() {
                let n = indices.len();
                let a = self.vertices.at(indices[(k + n - 1) % n]);
                let b = self.vertices.at(indices[k]);
                let c = self.vertices.at(indices[(k + 1) % n]);
                let (e1, e2) = (b - a, c - b);
                let straight = e1.norm() > 0.0
                    && e2.norm() > 0.0
                    && e1.normalize().dot(&e2.normalize()) > threshold;
                if straight {
                    indices.remove(k);
                } else {
                    k += 1;
                }
            }
            if indices.len() != before {
                dropped += before - indices.len();
                self.facets[id].set_indices(indices);
            }
        }
        self.initialize_geometry();
        dropped
    }

    /// Full cleanup: fuse vertices, drop degenerate facets, merge coplanar
    /// neighbors and straighten collinear sides.
    ///
    /// Cancelling at any stage restores the geometry as it was before the call.
    #[instrument(skip_all)]
    pub fn collapse(&mut self, ctx: &mut EditContext, options: &CollapseOptions) -> KernelResult<CollapseReport> {
        ctx.confirm_reset()?;
        let snapshot = self.clone();
        match self.run_collapse(ctx, options) {
            Err(KernelError::Cancelled) => {
                *self = snapshot;
                Err(KernelError::Cancelled)
            },
            other => other,
        }
    }

    fn run_collapse(&mut self, ctx: &mut EditContext, options: &CollapseOptions) -> KernelResult<CollapseReport> {
        let mut report = CollapseReport::default();
        let only = options.only.as_ref();
        let facets_before = self.facets.len();

        if let Some(tolerance) = options.vertex_tolerance {
            ctx.message("Collapsing vertices");
            let before = self.vertices.len();
            self.fuse_vertices(ctx, tolerance, only)?;
            report.vertices_removed = before - self.vertices.len();

            let mut degenerate = Vec::new();
            for id in 0..self.facets.len() {
                let g = self.facet_geometry(id)?;
                if g.collinear || g.area < self.settings.null_area {
                    degenerate.push(id);
                }
            }
            let removal = self.remove_facet_ids(&degenerate);
            report.facets_removed = facets_before - self.facets.len();
            self.initialize_geometry();
            if let Some(selection) = &options.only {
                let mut renumbered = selection.clone();
                renumbered.renumber_facets(&removal.new_refs);
                return self.run_facet_stages(ctx, options, Some(&renumbered), report);
            }
        }
        self.run_facet_stages(ctx, options, only, report)
    }

    fn run_facet_stages(
        &mut self,
        ctx: &mut EditContext,
        options: &CollapseOptions,
        only: Option<&Selection>,
        mut report: CollapseReport,
    ) -> KernelResult<CollapseReport> {
        let restrict = options.only.is_some();
        if let Some(tolerance) = options.facet_tolerance {
            ctx.message("Merging coplanar facets");
            let ids = self.stage_ids(restrict, only);
            report.facets_merged = self.merge_coplanar(ctx, tolerance, &ids)?;
        }
        if let Some(angle) = options.collinear_angle {
            ctx.message("Merging collinear sides");
            let ids = self.stage_ids(restrict, only);
            report.vertices_straightened = self.straighten_sides(angle, &ids);
        }
        debug!(?report, "collapse finished");
        Ok(report)
    }

    fn stage_ids(&self, restrict: bool, only: Option<&Selection>) -> Vec<usize> {
        match (restrict, only) {
            (true, Some(selection)) => selection
                .facet_ids()
                .into_iter()
                .filter(|&f| f < self.facets.len())
                .collect(),
            (true, None) => Vec::new(),
            (false, _) => (0..self.facets.len()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn pair(offset: Real) -> Geometry<()> {
        Geometry::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(1.0 + offset, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(2.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2], vec![3, 4, 5]],
            None,
        )
        .unwrap()
    }

    #[test]
    fn merge_loops_along_one_edge() {
        let common = find_common_edge(&[0, 1, 2, 3], &[1, 4, 5, 2]).unwrap();
        assert_eq!(merge_facet_loops(&[0, 1, 2, 3], &[1, 4, 5, 2], &common), vec![2, 3, 0, 1, 4, 5]);
    }

    #[test]
    fn merge_facets_keeps_first_properties() {
        let mut geometry: Geometry<u8> = Geometry::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(2.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2, 3], vec![1, 4, 5, 2]],
            Some(7),
        )
        .unwrap();
        geometry.facet_mut(1).unwrap().metadata = Some(9);
        let merged = geometry.merge_facets(0, 1).unwrap().unwrap();
        assert_eq!(merged.indices(), &[2, 3, 0, 1, 4, 5]);
        assert_eq!(merged.metadata, Some(7));
        assert_eq!(geometry.facet_count(), 2);
    }

    #[test]
    fn collapse_remaps_facets() {
        let mut geometry = pair(1e-7);
        let mut ctx = EditContext::new();
        let remap = geometry.collapse_vertices(&mut ctx, 1e-6, None).unwrap();
        assert_eq!(remap, vec![0, 1, 2, 1, 3, 4]);
        assert_eq!(geometry.vertex_count(), 5);
        assert_eq!(geometry.facets()[1].indices(), &[1, 3, 4]);
    }

    #[test]
    fn cancelled_collapse_changes_nothing() {
        let mut geometry = pair(1e-7);
        let before = geometry.clone();
        let token = crate::context::CancellationToken::new();
        token.cancel();
        let mut ctx = EditContext::new().with_cancellation(token);
        assert_eq!(geometry.collapse_vertices(&mut ctx, 1e-6, None), Err(KernelError::Cancelled));
        assert_eq!(geometry, before);
        assert_eq!(geometry.collapse(&mut ctx, &CollapseOptions::default()), Err(KernelError::Cancelled));
        assert_eq!(geometry, before);
    }

    #[test]
    fn collinear_sides_are_straightened() {
        let mut geometry: Geometry<()> = Geometry::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.5, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2, 3, 4]],
            None,
        )
        .unwrap();
        let mut ctx = EditContext::new();
        let dropped = geometry.merge_collinear_sides(&mut ctx, 1e-3, None).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(geometry.facets()[0].indices(), &[0, 2, 3, 4]);
        assert!((geometry.facet_geometry(0).unwrap().area - 1.0).abs() < 1e-12);
    }
}
