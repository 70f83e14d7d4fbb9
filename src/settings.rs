//! **Kernel thresholds**
//!
//! Every numeric threshold used by the editing algorithms lives in
//! [`KernelSettings`]. The defaults reproduce the constants geometry files
//! have always been edited with, so changing them changes which vertices get
//! merged and which facets count as degenerate.

use crate::float_types::Real;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelSettings {
    /// Fixed-point factor applied to 2D coordinates before integer clipping
    pub clip_scale: Real,
    /// Distance (normalized 2D units) under which a clip output point reuses an existing vertex
    pub clip_merge_distance: Real,
    /// Distance under which two intersection points are the same vertex
    pub intersection_merge_distance: Real,
    /// Distance (normalized 2D units) under which a point counts as lying on a facet edge
    pub on_edge_tolerance: Real,
    /// Side test threshold when classifying vertices against a cut line
    pub cut_side_epsilon: Real,
    /// Cross product norm under which three vertices are considered collinear
    pub collinear_threshold: Real,
    /// Facets with a smaller area are removed by null-facet cleanup
    pub null_area: Real,
    /// Loft quads above this planarity error are split into two triangles
    pub loft_planarity_tolerance: Real,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            clip_scale: 1e6,
            clip_merge_distance: 1e-5,
            intersection_merge_distance: 1e-9,
            on_edge_tolerance: 1e-6,
            cut_side_epsilon: 1e-10,
            collinear_threshold: 1e-11,
            null_area: 1e-20,
            loft_planarity_tolerance: 1e-5,
        }
    }
}

impl KernelSettings {
    pub const fn with_clip_scale(mut self, scale: Real) -> Self {
        self.clip_scale = scale;
        self
    }

    pub const fn with_clip_merge_distance(mut self, distance: Real) -> Self {
        self.clip_merge_distance = distance;
        self
    }

    pub const fn with_intersection_merge_distance(mut self, distance: Real) -> Self {
        self.intersection_merge_distance = distance;
        self
    }

    pub const fn with_on_edge_tolerance(mut self, tolerance: Real) -> Self {
        self.on_edge_tolerance = tolerance;
        self
    }

    pub const fn with_null_area(mut self, area: Real) -> Self {
        self.null_area = area;
        self
    }

    pub const fn with_loft_planarity_tolerance(mut self, tolerance: Real) -> Self {
        self.loft_planarity_tolerance = tolerance;
        self
    }
}
