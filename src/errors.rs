//! Kernel errors

/// Everything a kernel command can refuse to do.
///
/// Geometric degeneracy (zero area, collinear or self-intersecting facets) is
/// never an error: it is reported through the flags of
/// [`FacetGeometry`](crate::geometry::FacetGeometry).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    /// A facet needs at least three vertex indices
    #[error("a facet needs at least 3 vertices, got {0}")]
    TooFewIndices(usize),
    /// A facet references a vertex that does not exist
    #[error("vertex index {index} is out of range (vertex count = {count})")]
    IndexOutOfRange { index: usize, count: usize },
    /// Two consecutive indices of a loop are equal
    #[error("vertex {0} appears twice in a row")]
    RepeatedIndex(usize),
    /// A binary operation was called with the wrong number of facets
    #[error("select exactly {expected} facets ({found} selected)")]
    FacetSelection { expected: usize, found: usize },
    /// An operation needs a minimum number of selected facets
    #[error("select at least {minimum} facets ({found} selected)")]
    TooFewFacets { minimum: usize, found: usize },
    /// Wrong number of selected vertices
    #[error("select exactly {expected} vertices ({found} selected)")]
    VertexSelection { expected: usize, found: usize },
    /// An operation needs a minimum number of selected vertices
    #[error("select at least {minimum} vertices ({found} selected)")]
    TooFewVertices { minimum: usize, found: usize },
    #[error("facet {0} does not exist")]
    NoSuchFacet(usize),
    #[error("structure {0} does not exist")]
    NoSuchStructure(usize),
    /// The inputs do not define a plane
    #[error("cannot define a plane: {0}")]
    DegeneratePlane(String),
    /// The inputs do not define a rotation axis
    #[error("cannot define an axis: direction has zero length")]
    DegenerateAxis,
    /// Derived geometry was requested for a facet edited since its last initialization
    #[error("facet {0} has stale geometry, initialize the geometry first")]
    StaleGeometry(usize),
    /// A numeric argument is out of its valid range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The cancellation token fired; the geometry was left untouched
    #[error("operation cancelled")]
    Cancelled,
    /// The reset gate refused the edit; the geometry was left untouched
    #[error("edit declined: simulation results must be reset first")]
    ResetDeclined,
    /// Growing a vertex or facet array failed
    #[error("out of memory while {0}")]
    OutOfMemory(&'static str),
}

pub type KernelResult<T> = Result<T, KernelError>;

/// Reserve `additional` slots in `vec`, reporting failure as [`KernelError::OutOfMemory`].
pub(crate) fn try_grow<T>(
    vec: &mut Vec<T>,
    additional: usize,
    what: &'static str,
) -> KernelResult<()> {
    vec.try_reserve(additional)
        .map_err(|_| KernelError::OutOfMemory(what))
}
