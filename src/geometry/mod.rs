//! **Facet geometry**
//!
//! [`Geometry`] owns the vertex store and a dense vector of facets. Facet ids
//! are positions in that vector; commands that remove facets return the
//! old→new id table so overlays kept by the caller can be renumbered.
//!
//! Every command takes an [`EditContext`], asks its reset gate before
//! mutating anything, and re-derives the geometry of the facets it touched
//! before returning. Direct vertex edits through [`Geometry::set_vertex`]
//! make facet geometry stale until [`Geometry::initialize_geometry`] runs.

pub mod clip;
pub mod collapse;
pub mod edit;
pub mod extrude;
pub mod facet;
pub mod intersect;
pub mod loft;
pub mod neighbors;
pub mod plane;
pub mod polygon2d;
pub mod selection;
pub mod shapes;
pub mod split;
pub mod transform;
pub mod triangulate;
pub mod vertex;

pub use facet::{Facet, FacetGeometry, FacetState, Neighbor};
pub use plane::{Axis, Plane};
pub use selection::Selection;
pub use triangulate::Triangulation;
pub use vertex::{UndoPoint, VertexStore};

use crate::aabb::Aabb;
use crate::context::EditContext;
use crate::errors::{KernelError, KernelResult, try_grow};
use crate::float_types::Real;
use crate::settings::KernelSettings;
use nalgebra::Point3;
use std::fmt::Debug;
use tracing::{debug, instrument};

/// A facet taken out of the geometry by a command, kept for undo.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedFacet<S: Clone> {
    pub facet: Facet<S>,
    /// Id the facet had when it was removed
    pub position: usize,
    /// The facet at `position` now is its replacement rather than a shifted one
    pub replaces_original: bool,
}

/// What a facet-creating command did.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome<S: Clone> {
    /// Ids of facets created or rewritten in place, valid after the command
    pub created: Vec<usize>,
    /// Facets removed or replaced, for undo through [`Geometry::restore_facets`]
    pub deleted: Vec<DeletedFacet<S>>,
    /// Selection to show after the command
    pub selection: Selection,
    /// Selected facets the command had to leave alone
    pub skipped: Vec<usize>,
}

impl<S: Clone> EditOutcome<S> {
    pub(crate) const fn new(selection: Selection) -> Self {
        EditOutcome {
            created: Vec::new(),
            deleted: Vec::new(),
            selection,
            skipped: Vec::new(),
        }
    }
}

/// Vertices and facets of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry<S: Clone> {
    pub(crate) vertices: VertexStore,
    pub(crate) facets: Vec<Facet<S>>,
    pub(crate) structures: Vec<String>,
    pub(crate) view_structure: Option<usize>,
    pub(crate) settings: KernelSettings,
}

impl<S: Clone + Debug> Default for Geometry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Debug> Geometry<S> {
    pub fn new() -> Self {
        Self::with_settings(KernelSettings::default())
    }

    pub fn with_settings(settings: KernelSettings) -> Self {
        Geometry {
            vertices: VertexStore::new(),
            facets: Vec::new(),
            structures: Vec::new(),
            view_structure: None,
            settings,
        }
    }

    /// Build an initialized geometry from positions and facet loops.
    pub fn from_parts(
        points: Vec<Point3<Real>>,
        loops: Vec<Vec<usize>>,
        metadata: Option<S>,
    ) -> KernelResult<Self> {
        let mut geometry = Self::new();
        geometry.vertices = VertexStore::from_points(points);
        try_grow(&mut geometry.facets, loops.len(), "building facets")?;
        for indices in loops {
            geometry.validate_loop(&indices)?;
            geometry.facets.push(Facet::new(indices, metadata.clone()));
        }
        geometry.initialize_geometry();
        Ok(geometry)
    }

    pub const fn settings(&self) -> &KernelSettings {
        &self.settings
    }

    pub const fn vertices(&self) -> &VertexStore {
        &self.vertices
    }

    pub fn facets(&self) -> &[Facet<S>] {
        &self.facets
    }

    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn facet(&self, id: usize) -> KernelResult<&Facet<S>> {
        self.facets.get(id).ok_or(KernelError::NoSuchFacet(id))
    }

    /// Mutable access to a facet's metadata and structure.
    pub fn facet_mut(&mut self, id: usize) -> KernelResult<&mut Facet<S>> {
        self.facets.get_mut(id).ok_or(KernelError::NoSuchFacet(id))
    }

    /// Derived geometry of a facet, refused when stale.
    pub fn facet_geometry(&self, id: usize) -> KernelResult<&FacetGeometry> {
        let facet = self.facet(id)?;
        match facet.state() {
            FacetState::Derived { revision, geometry } if *revision == self.vertices.revision() => {
                Ok(&**geometry)
            },
            _ => Err(KernelError::StaleGeometry(id)),
        }
    }

    /// `true` when every facet's derived geometry is current.
    pub fn is_initialized(&self) -> bool {
        let revision = self.vertices.revision();
        self.facets.iter().all(|f| !f.is_stale(revision))
    }

    /// Re-derive every stale facet.
    #[instrument(skip_all, fields(facets = self.facets.len()))]
    pub fn initialize_geometry(&mut self) {
        let revision = self.vertices.revision();
        let mut derived = 0usize;
        for facet in &mut self.facets {
            if facet.is_stale(revision) {
                facet.derive(&self.vertices, &self.settings);
                derived += 1;
            }
        }
        debug!(derived, "geometry initialized");
    }

    /// Move one vertex directly. Facets using it are stale until the next initialization.
    pub fn set_vertex(&mut self, index: usize, position: Point3<Real>) -> KernelResult<UndoPoint> {
        self.vertices.set(index, position)
    }

    /// Append a free vertex and return its id.
    pub fn add_vertex(&mut self, position: Point3<Real>) -> KernelResult<usize> {
        self.vertices.push(position)
    }

    /// Put back positions recorded by an edit.
    pub fn revert_points(&mut self, ctx: &mut EditContext, undo: &[UndoPoint]) -> KernelResult<()> {
        ctx.confirm_reset()?;
        self.vertices.revert(undo)?;
        self.initialize_geometry();
        Ok(())
    }

    pub fn bounding_box(&self) -> Option<Aabb> {
        self.vertices.bounding_box()
    }

    /// Lazy triangulation of a facet, as positions in its loop.
    pub fn triangulate(&self, id: usize) -> KernelResult<Triangulation> {
        Ok(Triangulation::new(self.facet_geometry(id)?))
    }

    /// Triangles of a facet as global vertex ids.
    pub fn facet_triangles(&self, id: usize) -> KernelResult<Vec<[usize; 3]>> {
        let facet = self.facet(id)?;
        Ok(self
            .triangulate(id)?
            .map(|t| [facet.indices()[t[0]], facet.indices()[t[1]], facet.indices()[t[2]]])
            .collect())
    }

    /// Ids of facets whose planarity error exceeds `tolerance`.
    pub fn non_planar_facets(&self, tolerance: Real) -> KernelResult<Vec<usize>> {
        let mut ids = Vec::new();
        for id in 0..self.facets.len() {
            if self.facet_geometry(id)?.planarity_error > tolerance {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Check a loop before it becomes a facet.
    pub fn validate_loop(&self, indices: &[usize]) -> KernelResult<()> {
        if indices.len() < 3 {
            return Err(KernelError::TooFewIndices(indices.len()));
        }
        let count = self.vertices.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= count) {
            return Err(KernelError::IndexOutOfRange { index, count });
        }
        let n = indices.len();
        if let Some(k) = (0..n).find(|&k| indices[k] == indices[(k + 1) % n]) {
            return Err(KernelError::RepeatedIndex(indices[k]));
        }
        Ok(())
    }

    /// Distinct facet ids of a selection, checked against the facet count.
    pub(crate) fn selected_facets(&self, selection: &Selection) -> KernelResult<Vec<usize>> {
        let ids = selection.facet_ids();
        if let Some(&id) = ids.iter().find(|&&id| id >= self.facets.len()) {
            return Err(KernelError::NoSuchFacet(id));
        }
        Ok(ids)
    }

    /// Selected vertex ids, checked against the vertex count.
    pub(crate) fn selected_vertices(&self, selection: &Selection) -> KernelResult<Vec<usize>> {
        let count = self.vertices.len();
        if let Some(&index) = selection.vertices.iter().find(|&&v| v >= count) {
            return Err(KernelError::IndexOutOfRange { index, count });
        }
        Ok(selection.vertices.clone())
    }

    /// Exactly `expected` selected facets.
    pub(crate) fn exact_facets(&self, selection: &Selection, expected: usize) -> KernelResult<Vec<usize>> {
        let ids = self.selected_facets(selection)?;
        if ids.len() != expected {
            return Err(KernelError::FacetSelection {
                expected,
                found: ids.len(),
            });
        }
        Ok(ids)
    }

    /// Append a facet built by a command, tagged with the view structure.
    pub(crate) fn push_facet(&mut self, mut facet: Facet<S>) -> KernelResult<usize> {
        try_grow(&mut self.facets, 1, "adding a facet")?;
        if facet.super_idx.is_none() {
            facet.super_idx = self.view_structure;
        }
        self.facets.push(facet);
        Ok(self.facets.len() - 1)
    }
}

/// Remove consecutive repeats (closing pair included) from a loop.
pub(crate) fn dedup_loop(indices: &mut Vec<usize>) {
    indices.dedup();
    while indices.len() > 1 && indices.first() == indices.last() {
        indices.pop();
    }
}
