//! **VertexStore**
//!
//! Ordered vertex positions shared by all facets. Every change of a position,
//! and every compaction, bumps [`VertexStore::revision`] so facets derived from
//! older positions can be detected as stale.

use crate::aabb::Aabb;
use crate::errors::{KernelError, KernelResult, try_grow};
use crate::float_types::Real;
use nalgebra::Point3;

/// Position of a vertex before an edit, used to revert that edit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UndoPoint {
    pub vertex: usize,
    pub position: Point3<Real>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexStore {
    points: Vec<Point3<Real>>,
    revision: u64,
}

impl VertexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<Point3<Real>>) -> Self {
        Self {
            points,
            revision: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Point3<Real>> {
        self.points.get(index)
    }

    /// Position of `index`. Callers validate indices when facets are added,
    /// so this panics only on a broken facet invariant.
    #[inline]
    pub(crate) fn at(&self, index: usize) -> Point3<Real> {
        self.points[index]
    }

    #[inline]
    pub fn as_slice(&self) -> &[Point3<Real>] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point3<Real>> {
        self.points.iter()
    }

    /// Append a vertex and return its index.
    pub fn push(&mut self, p: Point3<Real>) -> KernelResult<usize> {
        try_grow(&mut self.points, 1, "adding a vertex")?;
        self.points.push(p);
        Ok(self.points.len() - 1)
    }

    /// Append several vertices, returning the index of the first one.
    pub fn extend(&mut self, points: &[Point3<Real>]) -> KernelResult<usize> {
        try_grow(&mut self.points, points.len(), "adding vertices")?;
        let first = self.points.len();
        self.points.extend_from_slice(points);
        Ok(first)
    }

    /// Move a vertex, returning its previous position.
    pub fn set(&mut self, index: usize, p: Point3<Real>) -> KernelResult<UndoPoint> {
        let count = self.points.len();
        let slot = self
            .points
            .get_mut(index)
            .ok_or(KernelError::IndexOutOfRange { index, count })?;
        let undo = UndoPoint {
            vertex: index,
            position: *slot,
        };
        *slot = p;
        self.revision += 1;
        Ok(undo)
    }

    /// Restore positions recorded by an edit, in reverse order.
    pub fn revert(&mut self, undo: &[UndoPoint]) -> KernelResult<()> {
        for point in undo.iter().rev() {
            self.set(point.vertex, point.position)?;
        }
        Ok(())
    }

    /// Keep only the vertices where `keep[i]` is true.
    ///
    /// Returns the old→new index table (`None` for removed vertices).
    pub fn compact(&mut self, keep: &[bool]) -> Vec<Option<usize>> {
        let mut remap = Vec::with_capacity(self.points.len());
        let mut next = 0;
        for i in 0..self.points.len() {
            if keep.get(i).copied().unwrap_or(true) {
                remap.push(Some(next));
                next += 1;
            } else {
                remap.push(None);
            }
        }
        let mut i = 0;
        self.points.retain(|_| {
            let kept = remap[i].is_some();
            i += 1;
            kept
        });
        self.revision += 1;
        remap
    }

    /// Replace all positions at once (used after collapsing).
    pub(crate) fn replace(&mut self, points: Vec<Point3<Real>>) {
        self.points = points;
        self.revision += 1;
    }

    /// Bounding box of every vertex.
    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.points.iter())
    }

    /// Bounding box of the given vertices; out of range indices are ignored.
    pub fn bounding_box_of(&self, indices: &[usize]) -> Option<Aabb> {
        Aabb::from_points(indices.iter().filter_map(|&i| self.points.get(i)))
    }
}
