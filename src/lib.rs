//! A **planar facet geometry kernel** for polygonal models edited by hand.
//!
//! A [`Geometry`] holds a vertex store and facets: closed loops of vertex ids
//! lying (nearly) in a plane. From each loop the kernel derives the facet's
//! plane, a local 2D basis, its projected outline, area and degeneracy flags
//! ([`FacetGeometry`]), and builds editing commands on top of that:
//!
//! - polygon booleans between coplanar facets (union, intersection, difference, xor)
//! - cutting facets with a plane, and against each other
//! - merging nearby vertices, adjacent coplanar facets and collinear sides
//! - ear-clipping triangulation
//! - neighbor analysis and flood-fill selection by normal angle
//! - move/rotate/scale/mirror/project of facets or vertices, alignment of one facet onto another
//! - lofts between two facets and extrusion of facets into prisms
//! - rectangles, ellipses and racetracks added as new facets
//!
//! Every command takes an [`EditContext`] carrying progress reporting, a reset
//! confirmation gate and a cancellation token.
//!
//! ```
//! use facetgeom::{EditContext, Geometry, Plane, Selection};
//! use nalgebra::Point3;
//!
//! let mut geometry: Geometry<()> = Geometry::from_parts(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     vec![vec![0, 1, 2, 3]],
//!     None,
//! )?;
//! let plane = Plane::from_equation(1.0, 0.0, 0.0, -0.5)?;
//! let outcome = geometry.split_selected_facets(&mut EditContext::default(), &Selection::of_facets([0]), &plane)?;
//! assert_eq!(outcome.created.len(), 2);
//! # Ok::<(), facetgeom::KernelError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(unused)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod aabb;
pub mod context;
pub mod errors;
pub mod float_types;
pub mod geometry;
pub mod settings;

pub use aabb::Aabb;
pub use context::{AlwaysReset, CancellationToken, EditContext, NeverReset, NoProgress, ProgressSink, ResetGate, TracingProgress};
pub use errors::{KernelError, KernelResult};
pub use float_types::Real;
pub use geometry::clip::{BooleanOp, ClipOrder};
pub use geometry::collapse::{CollapseOptions, CollapseReport};
pub use geometry::extrude::Extrusion;
pub use geometry::neighbors::CommonEdge;
pub use geometry::shapes::ShapeFrame;
pub use geometry::transform::{Alignment, TransformOutcome};
pub use geometry::{
    Axis, DeletedFacet, EditOutcome, Facet, FacetGeometry, FacetState, Geometry, Neighbor, Plane, Selection,
    Triangulation, UndoPoint, VertexStore,
};
pub use settings::KernelSettings;
