//! Selection overlay.
//!
//! The kernel never stores selection state. Commands read a [`Selection`] and
//! hand back the selection the editor should show afterwards.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Selected facet ids, ascending
    pub facets: BTreeSet<usize>,
    /// Selected vertex ids, in the order they were picked
    pub vertices: Vec<usize>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_facets<I: IntoIterator<Item = usize>>(facets: I) -> Self {
        Selection {
            facets: facets.into_iter().collect(),
            vertices: Vec::new(),
        }
    }

    pub fn of_vertices<I: IntoIterator<Item = usize>>(vertices: I) -> Self {
        let mut selection = Selection::new();
        for v in vertices {
            selection.select_vertex(v);
        }
        selection
    }

    pub fn with_vertices<I: IntoIterator<Item = usize>>(mut self, vertices: I) -> Self {
        for v in vertices {
            self.select_vertex(v);
        }
        self
    }

    pub fn select_facet(&mut self, facet: usize) {
        self.facets.insert(facet);
    }

    /// Add a vertex at the end of the pick order; picking twice is a no-op.
    pub fn select_vertex(&mut self, vertex: usize) {
        if !self.vertices.contains(&vertex) {
            self.vertices.push(vertex);
        }
    }

    pub fn facet_ids(&self) -> Vec<usize> {
        self.facets.iter().copied().collect()
    }

    pub fn is_vertex_selected(&self, vertex: usize) -> bool {
        self.vertices.contains(&vertex)
    }

    /// Apply an old→new facet table, dropping removed facets.
    pub fn renumber_facets(&mut self, new_refs: &[Option<usize>]) {
        self.facets = self
            .facets
            .iter()
            .filter_map(|&f| new_refs.get(f).copied().flatten())
            .collect();
    }

    /// Apply an old→new vertex table, dropping removed vertices.
    pub fn renumber_vertices(&mut self, new_refs: &[Option<usize>]) {
        let mut renumbered = Vec::with_capacity(self.vertices.len());
        for v in self.vertices.iter().filter_map(|&v| new_refs.get(v).copied().flatten()) {
            if !renumbered.contains(&v) {
                renumbered.push(v);
            }
        }
        self.vertices = renumbered;
    }
}
