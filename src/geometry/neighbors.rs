//! **NeighborAnalyzer**
//!
//! Facets are neighbors when they share an edge traversed in opposite
//! directions, which is how two consistently oriented facets meet. Neighbor
//! links carry the angle between the two normals and drive the flood-fill
//! "smart selection".

use crate::context::EditContext;
use crate::errors::KernelResult;
use crate::geometry::{Geometry, Neighbor};
use hashbrown::HashMap;
use std::collections::{BTreeSet, VecDeque};
use std::fmt::Debug;
use tracing::{debug, instrument};

/// Longest chain of anti-parallel edges shared by two loops.
///
/// Edge `start1 + t` of the first loop is edge `start2 - t` of the second,
/// reversed, for `t` in `0..length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonEdge {
    pub start1: usize,
    pub start2: usize,
    pub length: usize,
}

/// Find the longest run of shared anti-parallel edges between two loops.
pub fn find_common_edge(f1: &[usize], f2: &[usize]) -> Option<CommonEdge> {
    let (n1, n2) = (f1.len(), f2.len());
    if n1 < 2 || n2 < 2 {
        return None;
    }
    let at1 = |k: usize| f1[k % n1];
    let at2 = |k: isize| f2[k.rem_euclid(n2 as isize) as usize];

    let mut best: Option<CommonEdge> = None;
    for i in 0..n1 {
        for j in 0..n2 {
            let jj = j as isize;
            if at1(i) != at2(jj + 1) || at1(i + 1) != at2(jj) {
                continue;
            }
            let mut length = 1;
            while length < n1 && length < n2 && at1(i + length + 1) == at2(jj - length as isize) {
                length += 1;
            }
            if best.is_none_or(|b| length > b.length) {
                best = Some(CommonEdge {
                    start1: i,
                    start2: j,
                    length,
                });
            }
        }
    }
    best
}

impl<S: Clone + Debug> Geometry<S> {
    /// Shared edge chain between two facets, if any.
    pub fn common_edge(&self, f1: usize, f2: usize) -> KernelResult<Option<CommonEdge>> {
        Ok(find_common_edge(self.facet(f1)?.indices(), self.facet(f2)?.indices()))
    }

    /// Recompute the neighbor links of every facet.
    ///
    /// Cancellation leaves the previous links in place. Returns the number of
    /// neighbor pairs found.
    #[instrument(skip_all, fields(facets = self.facets.len()))]
    pub fn analyze_neighbors(&mut self, ctx: &mut EditContext) -> KernelResult<usize> {
        let count = self.facets.len();
        let mut normals = Vec::with_capacity(count);
        for id in 0..count {
            normals.push(self.facet_geometry(id)?.normal());
        }

        let mut by_edge: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (id, facet) in self.facets.iter().enumerate() {
            for (a, b) in facet.edges() {
                let key = if a < b { (a, b) } else { (b, a) };
                let users = by_edge.entry(key).or_default();
                if users.last() != Some(&id) {
                    users.push(id);
                }
            }
        }
        let mut candidates: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); count];
        for users in by_edge.values() {
            for (k, &i) in users.iter().enumerate() {
                for &j in &users[k + 1..] {
                    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
                    candidates[lo].insert(hi);
                }
            }
        }

        let mut links: Vec<Vec<Neighbor>> = vec![Vec::new(); count];
        let mut pairs = 0;
        for i in 0..count {
            ctx.check_cancelled()?;
            ctx.progress(i, count);
            for &j in &candidates[i] {
                if find_common_edge(self.facets[i].indices(), self.facets[j].indices()).is_some() {
                    let angle = normals[i].dot(&normals[j]).clamp(-1.0, 1.0).acos().abs();
                    links[i].push(Neighbor { facet: j, angle });
                    links[j].push(Neighbor { facet: i, angle });
                    pairs += 1;
                }
            }
        }

        for (facet, neighbors) in self.facets.iter_mut().zip(links) {
            facet.neighbors = neighbors;
        }
        debug!(pairs, "neighbors analyzed");
        Ok(pairs)
    }

    /// Facets reachable from `source` through neighbor links whose angle is at
    /// most `max_angle` radians, `source` included, ascending.
    pub fn connected_facets(&self, source: usize, max_angle: crate::float_types::Real) -> KernelResult<Vec<usize>> {
        self.facet(source)?;
        let count = self.facets.len();
        let mut seen = vec![false; count];
        seen[source] = true;
        let mut queue = VecDeque::from([source]);
        while let Some(id) = queue.pop_front() {
            for link in self.facets[id].neighbors() {
                if link.facet < count && !seen[link.facet] && link.angle <= max_angle {
                    seen[link.facet] = true;
                    queue.push_back(link.facet);
                }
            }
        }
        Ok((0..count).filter(|&id| seen[id]).collect())
    }

    /// Apply an old→new facet table to every neighbor link.
    pub(crate) fn renumber_neighbors(&mut self, new_refs: &[Option<usize>]) {
        for facet in &mut self.facets {
            facet.neighbors = facet
                .neighbors
                .iter()
                .filter_map(|n| {
                    new_refs
                        .get(n.facet)
                        .copied()
                        .flatten()
                        .map(|facet| Neighbor { facet, angle: n.angle })
                })
                .collect();
        }
    }
}
