//! **Facets and their derived geometry**
//!
//! A [`Facet`] is an ordered loop of vertex indices plus opaque metadata.
//! Everything else (plane, 2D basis, projected loop, area, flags) lives in a
//! [`FacetGeometry`] computed by [`FacetGeometry::compute`] and cached in the
//! facet together with the vertex revision it was computed at.
//!
//! # Mathematical Foundation
//!
//! The normal is the first non-degenerate cross product `(p[k+1]-p[k]) × (p[k+2]-p[k+1])`.
//! With `U` the first edge and `V = N × U`, every vertex maps to
//! `(u, v) = ((p - p0)·U, (p - p0)·V)`. Twice the signed area is the shoelace sum
//! `Σ (u_j·v_{j+1} - u_{j+1}·v_j)`; a negative sum means the loop winds clockwise
//! around `N`, in which case `N`, the plane constant, `V` and every `v` are negated.
//! Finally the basis is moved to the corner of the (u, v) bounding box and
//! scaled by its extent so that projected coordinates cover `[0, 1]²`.

use crate::aabb::Aabb;
use crate::float_types::Real;
use crate::geometry::plane::Plane;
use crate::geometry::polygon2d::signed_area2;
use crate::geometry::vertex::VertexStore;
use crate::settings::KernelSettings;
use nalgebra::{Point2, Point3, Vector3};

/// Derived geometry of one facet.
#[derive(Debug, Clone, PartialEq)]
pub struct FacetGeometry {
    /// Oriented plane; its normal follows the right-hand rule around the loop
    pub plane: Plane,
    /// Model-space point mapped to `(0, 0)`
    pub origin: Point3<Real>,
    /// Basis vector spanning the bounding rectangle width (not unit)
    pub u: Vector3<Real>,
    /// Basis vector spanning the bounding rectangle height (not unit)
    pub v: Vector3<Real>,
    /// Unit direction of `u`
    pub nu: Vector3<Real>,
    /// Unit direction of `v`
    pub nv: Vector3<Real>,
    /// Loop projected in the `(u, v)` basis, one entry per facet index
    pub vertices2: Vec<Point2<Real>>,
    pub area: Real,
    /// Largest distance of vertices 3.. from the plane of the first three
    pub planarity_error: Real,
    pub collinear: bool,
    pub non_simple: bool,
    /// The loop was clockwise in the first basis and the orientation was corrected
    pub normal_flipped: bool,
    pub bounding_box: Aabb,
    pub center: Point3<Real>,
}

impl FacetGeometry {
    /// Derive plane, basis, projected loop, area and flags of the loop `indices`.
    ///
    /// Never fails: degenerate loops come back with `collinear` / `non_simple` set.
    /// Every index must be valid for `vertices`.
    pub fn compute(indices: &[usize], vertices: &VertexStore, settings: &KernelSettings) -> Self {
        let n = indices.len();
        let points: Vec<Point3<Real>> = indices.iter().map(|&i| vertices.at(i)).collect();
        let p0 = points.first().copied().unwrap_or_else(Point3::origin);

        let mut normal = Vector3::zeros();
        let mut collinear = true;
        for k in 0..n.saturating_sub(2) {
            let cross = (points[k + 1] - points[k]).cross(&(points[k + 2] - points[k + 1]));
            if cross.norm() >= settings.collinear_threshold {
                normal = cross.normalize();
                collinear = false;
                break;
            }
        }

        let bounding_box = Aabb::from_points(points.iter()).unwrap_or(Aabb::new(p0, p0));
        let center = bounding_box.center();

        let first_edge = points
            .iter()
            .skip(1)
            .map(|p| p - p0)
            .find(|e| e.norm_squared() > 0.0)
            .unwrap_or_else(Vector3::x);
        let in_plane = first_edge - normal * normal.dot(&first_edge);
        let nu = if in_plane.norm_squared() > 0.0 {
            in_plane.normalize()
        } else {
            first_edge.normalize()
        };
        let mut nv = normal.cross(&nu);

        let mut uv: Vec<Point2<Real>> = points
            .iter()
            .map(|p| {
                let d = p - p0;
                Point2::new(d.dot(&nu), d.dot(&nv))
            })
            .collect();

        let area2 = signed_area2(&uv);
        let mut normal_flipped = false;
        if area2 < 0.0 {
            normal = -normal;
            nv = -nv;
            for q in &mut uv {
                q.y = -q.y;
            }
            normal_flipped = true;
        }
        let non_simple = collinear || area2 == 0.0;
        let plane = Plane {
            normal,
            w: normal.dot(&p0.coords),
        };

        let planarity_error = points
            .iter()
            .skip(3)
            .map(|p| plane.signed_distance(p).abs())
            .fold(0.0, Real::max);

        let mut min = Point2::new(0.0, 0.0);
        let mut max = Point2::new(0.0, 0.0);
        for q in &uv {
            min = min.inf(q);
            max = max.sup(q);
        }
        let extent = |d: Real| if d > 0.0 { d } else { 1.0 };
        let width = extent(max.x - min.x);
        let height = extent(max.y - min.y);

        let origin = p0 + nu * min.x + nv * min.y;
        let vertices2 = uv
            .iter()
            .map(|q| Point2::new((q.x - min.x) / width, (q.y - min.y) / height))
            .collect();

        FacetGeometry {
            plane,
            origin,
            u: nu * width,
            v: nv * height,
            nu,
            nv,
            vertices2,
            area: (0.5 * area2).abs(),
            planarity_error,
            collinear,
            non_simple,
            normal_flipped,
            bounding_box,
            center,
        }
    }

    #[inline]
    pub const fn normal(&self) -> Vector3<Real> {
        self.plane.normal
    }

    /// Coordinates of a model-space point in this facet's `(u, v)` basis.
    pub fn project(&self, p: &Point3<Real>) -> Point2<Real> {
        let d = p - self.origin;
        let ratio = |axis: &Vector3<Real>| {
            let n2 = axis.norm_squared();
            if n2 > 0.0 { axis.dot(&d) / n2 } else { 0.0 }
        };
        Point2::new(ratio(&self.u), ratio(&self.v))
    }

    /// Model-space point at `(u, v)` in this facet's basis.
    #[inline]
    pub fn lift(&self, q: &Point2<Real>) -> Point3<Real> {
        self.origin + self.u * q.x + self.v * q.y
    }

    /// Project a direction (not a point) into the basis.
    pub fn project_direction(&self, d: &Vector3<Real>) -> nalgebra::Vector2<Real> {
        let ratio = |axis: &Vector3<Real>| {
            let n2 = axis.norm_squared();
            if n2 > 0.0 { axis.dot(d) / n2 } else { 0.0 }
        };
        nalgebra::Vector2::new(ratio(&self.u), ratio(&self.v))
    }
}

/// Neighbor link recorded by neighbor analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub facet: usize,
    /// Angle between the two normals, radians
    pub angle: Real,
}

/// Whether a facet's derived geometry can be used.
#[derive(Debug, Clone, PartialEq)]
pub enum FacetState {
    /// Indices or vertices changed since the last derivation
    Stale,
    /// Derived at vertex revision `revision`
    Derived {
        revision: u64,
        geometry: Box<FacetGeometry>,
    },
}

/// A planar polygon given by vertex indices, carrying metadata `S`.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet<S: Clone> {
    indices: Vec<usize>,
    /// Physical parameters, opaque to the kernel
    pub metadata: Option<S>,
    /// Structure the facet belongs to, `None` for all structures
    pub super_idx: Option<usize>,
    pub(crate) neighbors: Vec<Neighbor>,
    visible_edges: Vec<bool>,
    state: FacetState,
}

impl<S: Clone> Facet<S> {
    pub const fn new(indices: Vec<usize>, metadata: Option<S>) -> Self {
        Facet {
            indices,
            metadata,
            super_idx: None,
            neighbors: Vec::new(),
            visible_edges: Vec::new(),
            state: FacetState::Stale,
        }
    }

    /// Copy of this facet's metadata and structure with another loop.
    pub fn with_indices(&self, indices: Vec<usize>) -> Self {
        let mut facet = Facet::new(indices, self.metadata.clone());
        facet.super_idx = self.super_idx;
        facet
    }

    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Index at loop position `k`, wrapping in both directions.
    #[inline]
    pub fn index(&self, k: isize) -> usize {
        let n = self.indices.len() as isize;
        self.indices[k.rem_euclid(n) as usize]
    }

    /// Directed edges `(indices[k], indices[k+1])`, closing edge included.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.indices.len();
        (0..n).map(move |k| (self.indices[k], self.indices[(k + 1) % n]))
    }

    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    /// Per-edge visibility: an edge used twice by the loop (hole slit) is hidden.
    /// Empty until the geometry is derived.
    pub fn visible_edges(&self) -> &[bool] {
        &self.visible_edges
    }

    pub const fn state(&self) -> &FacetState {
        &self.state
    }

    /// Derived geometry, whatever revision it was computed at.
    pub fn cached_geometry(&self) -> Option<&FacetGeometry> {
        match &self.state {
            FacetState::Derived { geometry, .. } => Some(&**geometry),
            FacetState::Stale => None,
        }
    }

    /// `true` unless derived at exactly `revision`.
    pub fn is_stale(&self, revision: u64) -> bool {
        !matches!(self.state, FacetState::Derived { revision: r, .. } if r == revision)
    }

    pub(crate) fn set_indices(&mut self, indices: Vec<usize>) {
        self.indices = indices;
        self.invalidate();
    }

    pub(crate) fn indices_mut(&mut self) -> &mut Vec<usize> {
        self.invalidate();
        &mut self.indices
    }

    pub(crate) fn invalidate(&mut self) {
        self.state = FacetState::Stale;
        self.visible_edges.clear();
    }

    /// Reverse the loop, which reverses the normal.
    pub(crate) fn swap_normal(&mut self) {
        self.indices.reverse();
        self.invalidate();
    }

    /// Rotate the loop so that position `offset` becomes vertex #0.
    pub(crate) fn shift_vertex(&mut self, offset: usize) {
        if !self.indices.is_empty() {
            let n = self.indices.len();
            self.indices.rotate_left(offset % n);
            self.invalidate();
        }
    }

    pub(crate) fn derive(&mut self, vertices: &VertexStore, settings: &KernelSettings) {
        let geometry = FacetGeometry::compute(&self.indices, vertices, settings);
        self.visible_edges = self.edge_visibility();
        self.state = FacetState::Derived {
            revision: vertices.revision(),
            geometry: Box::new(geometry),
        };
    }

    fn edge_visibility(&self) -> Vec<bool> {
        let key = |(a, b): (usize, usize)| if a < b { (a, b) } else { (b, a) };
        let mut counts: hashbrown::HashMap<(usize, usize), usize> = hashbrown::HashMap::new();
        for edge in self.edges() {
            *counts.entry(key(edge)).or_insert(0) += 1;
        }
        self.edges().map(|edge| counts[&key(edge)] == 1).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(points: &[[Real; 3]]) -> VertexStore {
        VertexStore::from_points(points.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect())
    }

    #[test]
    fn unit_square_is_its_own_basis() {
        let vertices = store(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]);
        let g = FacetGeometry::compute(&[0, 1, 2, 3], &vertices, &KernelSettings::default());
        assert_eq!(g.normal(), Vector3::z());
        assert_eq!(g.area, 1.0);
        assert!(!g.normal_flipped && !g.non_simple && !g.collinear);
        assert_eq!(g.origin, Point3::origin());
        assert_eq!(g.vertices2[2], Point2::new(1.0, 1.0));
        assert_eq!(g.planarity_error, 0.0);
    }

    #[test]
    fn reflex_first_turn_is_flipped() {
        // counter-clockwise L starting at its reflex corner
        let vertices = store(&[
            [2.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 2.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
        ]);
        let g = FacetGeometry::compute(&[0, 1, 2, 3, 4, 5], &vertices, &KernelSettings::default());
        assert!(g.normal_flipped);
        assert_eq!(g.normal(), Vector3::z());
        assert!((g.area - 3.0).abs() < 1e-12);
        assert!(signed_area2(&g.vertices2) > 0.0);
    }

    #[test]
    fn clockwise_loop_keeps_cross_product_normal() {
        let vertices = store(&[[0.0, 0.0, 0.0], [0.0, 2.0, 0.0], [3.0, 2.0, 0.0], [3.0, 0.0, 0.0]]);
        let g = FacetGeometry::compute(&[0, 1, 2, 3], &vertices, &KernelSettings::default());
        assert_eq!(g.normal(), -Vector3::z());
        assert!(!g.normal_flipped, "cross product already follows the loop");
        assert!((g.area - 6.0).abs() < 1e-12);
        assert!(signed_area2(&g.vertices2) > 0.0);
    }

    #[test]
    fn leading_collinear_run() {
        let vertices = store(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 2.0, 0.0],
            [0.0, 2.0, 0.0],
        ]);
        let g = FacetGeometry::compute(&[0, 1, 2, 3, 4], &vertices, &KernelSettings::default());
        assert!(!g.collinear);
        assert_eq!(g.normal(), Vector3::z());
        assert!((g.area - 4.0).abs() < 1e-12);
    }

    #[test]
    fn collinear_loop_is_flagged() {
        let vertices = store(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        let g = FacetGeometry::compute(&[0, 1, 2], &vertices, &KernelSettings::default());
        assert!(g.collinear);
        assert!(g.non_simple);
        assert_eq!(g.area, 0.0);
        assert!(g.vertices2.iter().all(|q| q.x.is_finite() && q.y.is_finite()));
    }

    #[test]
    fn project_and_lift_agree() {
        let vertices = store(&[[1.0, 0.0, 0.0], [1.0, 3.0, 0.0], [1.0, 3.0, 2.0], [1.0, 0.0, 2.0]]);
        let g = FacetGeometry::compute(&[0, 1, 2, 3], &vertices, &KernelSettings::default());
        for (k, q) in g.vertices2.iter().enumerate() {
            assert!((g.lift(q) - vertices.at(k)).norm() < 1e-12);
            assert!((g.project(&vertices.at(k)) - q).norm() < 1e-12);
        }
    }

    #[test]
    fn slit_edges_are_hidden() {
        let vertices = store(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]);
        let mut facet: Facet<()> = Facet::new(vec![0, 1, 2, 0, 2, 3], None);
        facet.derive(&vertices, &KernelSettings::default());
        assert_eq!(facet.visible_edges(), &[true, true, false, false, true, true]);
        assert!(!facet.is_stale(vertices.revision()));
        facet.swap_normal();
        assert!(facet.is_stale(vertices.revision()));
    }
}
