//! Planar shapes added to a [`Geometry`] as single new facets.

use crate::context::EditContext;
use crate::errors::{KernelError, KernelResult};
use crate::float_types::{PI, Real};
use crate::geometry::{EditOutcome, Facet, Geometry, Selection};
use nalgebra::{Point3, Vector3};
use std::fmt::Debug;
use tracing::{debug, instrument};

/// Placement of a planar shape: its center and an orthonormal in-plane basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeFrame {
    pub center: Point3<Real>,
    /// Direction of the first shape axis
    pub axis1: Vector3<Real>,
    /// `normal × axis1`, so loops running from `axis1` to `axis2` face `normal`
    pub axis2: Vector3<Real>,
}

impl ShapeFrame {
    /// Frame around `center`. Only the part of `axis1` perpendicular to
    /// `normal` is used; neither vector needs to be unit length.
    pub fn new(center: Point3<Real>, axis1: Vector3<Real>, normal: Vector3<Real>) -> KernelResult<Self> {
        let length = normal.norm();
        if !(length > 0.0) || !length.is_finite() {
            return Err(KernelError::DegeneratePlane(
                "shape normal has zero length".to_string(),
            ));
        }
        let normal = normal / length;
        let in_plane = axis1 - normal * normal.dot(&axis1);
        let width = in_plane.norm();
        if !(width > 1e-12 * axis1.norm()) || !width.is_finite() {
            return Err(KernelError::DegeneratePlane(
                "shape axis is parallel to its normal".to_string(),
            ));
        }
        let axis1 = in_plane / width;
        Ok(ShapeFrame {
            center,
            axis1,
            axis2: normal.cross(&axis1),
        })
    }

    /// Point at coordinates `(a, b)` along the two axes.
    #[inline]
    pub fn at(&self, a: Real, b: Real) -> Point3<Real> {
        self.center + self.axis1 * a + self.axis2 * b
    }
}

fn positive(name: &str, value: Real) -> KernelResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(KernelError::InvalidParameter(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

/// Loop of an ellipse with diameters `length1` and `length2`, starting on `axis1`.
fn ellipse_points(frame: &ShapeFrame, length1: Real, length2: Real, steps: usize) -> Vec<Point3<Real>> {
    (0..steps)
        .map(|k| {
            let angle = 2.0 * PI * k as Real / steps as Real;
            frame.at(0.5 * length1 * angle.cos(), 0.5 * length2 * angle.sin())
        })
        .collect()
}

/// Loop of a racetrack: two circular arcs of `steps` segments joined by
/// straight sides of length `top_length`, starting at the bottom-left corner.
fn racetrack_points(
    frame: &ShapeFrame,
    length1: Real,
    length2: Real,
    top_length: Real,
    steps: usize,
) -> KernelResult<Vec<Point3<Real>>> {
    // length1 = 2 (r + delta), length2 = 2 r sin(alpha), top = 2 (r cos(alpha) + delta)
    let radius = (length1.powi(2) - 2.0 * length1 * top_length + length2.powi(2) + top_length.powi(2))
        / (4.0 * (length1 - top_length));
    let delta = 0.5 * length1 - radius;
    let cos_alpha = (0.5 * top_length - delta) / radius;
    if !(radius > 0.0) || !(-1.0..=1.0).contains(&cos_alpha) {
        return Err(KernelError::InvalidParameter(format!(
            "no racetrack with lengths {length1} x {length2} and straight side {top_length}"
        )));
    }
    let alpha = cos_alpha.acos();

    let mut points = Vec::with_capacity(2 * (steps + 1));
    for (shift, start) in [(delta, -alpha), (-delta, PI - alpha)] {
        for k in 0..=steps {
            let angle = start + 2.0 * alpha * k as Real / steps as Real;
            points.push(frame.at(shift + radius * angle.cos(), radius * angle.sin()));
        }
    }
    // first side runs along the bottom
    points.rotate_right(1);
    Ok(points)
}

impl<S: Clone + Debug> Geometry<S> {
    /// Rectangle of `length1` along the first axis and `length2` along the second.
    ///
    /// # Example
    /// ```
    /// use facetgeom::{EditContext, Geometry, ShapeFrame};
    /// use nalgebra::{Point3, Vector3};
    ///
    /// let mut geometry: Geometry<()> = Geometry::new();
    /// let frame = ShapeFrame::new(Point3::origin(), Vector3::x(), Vector3::z())?;
    /// let outcome = geometry.create_rectangle(&mut EditContext::new(), &frame, 2.0, 3.0, None)?;
    /// assert!((geometry.facet_geometry(outcome.created[0])?.area - 6.0).abs() < 1e-12);
    /// # Ok::<(), facetgeom::KernelError>(())
    /// ```
    #[instrument(skip_all, fields(length1 = length1, length2 = length2))]
    pub fn create_rectangle(
        &mut self,
        ctx: &mut EditContext,
        frame: &ShapeFrame,
        length1: Real,
        length2: Real,
        metadata: Option<S>,
    ) -> KernelResult<EditOutcome<S>> {
        positive("length1", length1)?;
        positive("length2", length2)?;
        let (a, b) = (0.5 * length1, 0.5 * length2);
        let points = vec![frame.at(-a, -b), frame.at(a, -b), frame.at(a, b), frame.at(-a, b)];
        self.add_shape(ctx, &points, metadata)
    }

    /// Ellipse with diameters `length1` and `length2`, approximated by `steps` vertices.
    #[instrument(skip_all, fields(steps = steps))]
    pub fn create_circle(
        &mut self,
        ctx: &mut EditContext,
        frame: &ShapeFrame,
        length1: Real,
        length2: Real,
        steps: usize,
        metadata: Option<S>,
    ) -> KernelResult<EditOutcome<S>> {
        positive("length1", length1)?;
        positive("length2", length2)?;
        if steps < 3 {
            return Err(KernelError::InvalidParameter(format!(
                "a circle needs at least 3 steps, got {steps}"
            )));
        }
        let points = ellipse_points(frame, length1, length2, steps);
        self.add_shape(ctx, &points, metadata)
    }

    /// Racetrack `length1` long and `length2` wide whose straight sides are
    /// `top_length` long; each end arc has `steps` segments.
    #[instrument(skip_all, fields(steps = steps))]
    #[allow(clippy::too_many_arguments)]
    pub fn create_racetrack(
        &mut self,
        ctx: &mut EditContext,
        frame: &ShapeFrame,
        length1: Real,
        length2: Real,
        top_length: Real,
        steps: usize,
        metadata: Option<S>,
    ) -> KernelResult<EditOutcome<S>> {
        positive("length1", length1)?;
        positive("length2", length2)?;
        if !(0.0..length1).contains(&top_length) {
            return Err(KernelError::InvalidParameter(format!(
                "straight side {top_length} must be shorter than the length {length1}"
            )));
        }
        if steps == 0 {
            return Err(KernelError::InvalidParameter(
                "a racetrack arc needs at least one step".to_string(),
            ));
        }
        let points = racetrack_points(frame, length1, length2, top_length, steps)?;
        self.add_shape(ctx, &points, metadata)
    }

    fn add_shape(
        &mut self,
        ctx: &mut EditContext,
        points: &[Point3<Real>],
        metadata: Option<S>,
    ) -> KernelResult<EditOutcome<S>> {
        ctx.confirm_reset()?;
        let first = self.vertices.extend(points)?;
        let id = self.push_facet(Facet::new((first..first + points.len()).collect(), metadata))?;
        self.initialize_geometry();
        debug!(facet = id, vertices = points.len(), "shape added");
        let mut outcome = EditOutcome::new(Selection::of_facets([id]));
        outcome.created.push(id);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NeverReset;

    fn flat_frame() -> ShapeFrame {
        ShapeFrame::new(Point3::origin(), Vector3::x(), Vector3::z()).unwrap()
    }

    #[test]
    fn rectangle_faces_the_normal() {
        let mut geometry: Geometry<()> = Geometry::new();
        let frame = ShapeFrame::new(
            Point3::new(1.0, 1.0, 0.0),
            Vector3::new(2.0, 0.0, 0.5),
            Vector3::new(0.0, 0.0, 3.0),
        )
        .unwrap();
        let outcome = geometry
            .create_rectangle(&mut EditContext::default(), &frame, 2.0, 1.0, None)
            .unwrap();
        assert_eq!(outcome.created, vec![0]);
        assert_eq!(outcome.selection.facet_ids(), vec![0]);

        let g = geometry.facet_geometry(0).unwrap();
        assert!((g.area - 2.0).abs() < 1e-12);
        assert!((g.normal() - Vector3::z()).norm() < 1e-12);
        assert!((geometry.vertices().at(0) - Point3::new(0.0, 0.5, 0.0)).norm() < 1e-12);
        assert!((geometry.vertices().at(2) - Point3::new(2.0, 1.5, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn circle_with_four_steps_is_a_diamond() {
        let mut geometry: Geometry<()> = Geometry::new();
        geometry
            .create_circle(&mut EditContext::default(), &flat_frame(), 2.0, 2.0, 4, None)
            .unwrap();
        assert_eq!(geometry.vertex_count(), 4);
        assert!((geometry.vertices().at(0) - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((geometry.vertices().at(1) - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
        assert!((geometry.facet_geometry(0).unwrap().area - 2.0).abs() < 1e-12);
    }

    #[test]
    fn racetrack_starts_on_its_bottom_side() {
        let mut geometry: Geometry<()> = Geometry::new();
        geometry
            .create_racetrack(&mut EditContext::default(), &flat_frame(), 4.0, 2.0, 2.0, 2, None)
            .unwrap();
        assert_eq!(geometry.vertex_count(), 6);
        let v = geometry.vertices();
        assert!((v.at(0) - Point3::new(-1.0, -1.0, 0.0)).norm() < 1e-12);
        assert!((v.at(1) - Point3::new(1.0, -1.0, 0.0)).norm() < 1e-12);
        assert!((v.at(2) - Point3::new(2.0, 0.0, 0.0)).norm() < 1e-12);
        let g = geometry.facet_geometry(0).unwrap();
        assert!((g.area - 6.0).abs() < 1e-12);
        assert!(g.normal().z > 0.0);
    }

    #[test]
    fn bad_parameters_are_rejected() {
        let mut geometry: Geometry<()> = Geometry::new();
        let mut ctx = EditContext::default();
        assert!(ShapeFrame::new(Point3::origin(), Vector3::z(), Vector3::z()).is_err());
        assert!(matches!(
            geometry.create_circle(&mut ctx, &flat_frame(), 1.0, 1.0, 2, None),
            Err(KernelError::InvalidParameter(_))
        ));
        assert!(matches!(
            geometry.create_racetrack(&mut ctx, &flat_frame(), 2.0, 1.0, 3.0, 4, None),
            Err(KernelError::InvalidParameter(_))
        ));
        assert!(matches!(
            geometry.create_rectangle(&mut ctx, &flat_frame(), -1.0, 1.0, None),
            Err(KernelError::InvalidParameter(_))
        ));
        assert_eq!(geometry.vertex_count(), 0);
    }

    #[test]
    fn declined_gate_adds_nothing() {
        let mut geometry: Geometry<()> = Geometry::new();
        let mut ctx = EditContext::new().with_gate(NeverReset);
        let result = geometry.create_rectangle(&mut ctx, &flat_frame(), 1.0, 1.0, None);
        assert_eq!(result.err(), Some(KernelError::ResetDeclined));
        assert_eq!(geometry.vertex_count(), 0);
        assert_eq!(geometry.facet_count(), 0);
    }
}
