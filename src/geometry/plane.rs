//! Planes, rotation axes and the line/plane intersection used by the
//! intersection builder and the splitter.

use crate::errors::{KernelError, KernelResult};
use crate::float_types::{Real, is_zero};
use nalgebra::{Point3, Rotation3, Unit, Vector3};

/// Oriented plane `normal · p = w` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<Real>,
    pub w: Real,
}

impl Plane {
    /// Plane through `point` with the given normal (normalized here).
    pub fn from_point_normal(point: Point3<Real>, normal: Vector3<Real>) -> KernelResult<Self> {
        let length = normal.norm();
        if !(length > 0.0) || !length.is_finite() {
            return Err(KernelError::DegeneratePlane(
                "normal vector has zero length".to_string(),
            ));
        }
        let normal = normal / length;
        Ok(Plane {
            normal,
            w: normal.dot(&point.coords),
        })
    }

    /// Plane `a·x + b·y + c·z + d = 0`.
    pub fn from_equation(a: Real, b: Real, c: Real, d: Real) -> KernelResult<Self> {
        let normal = Vector3::new(a, b, c);
        let length = normal.norm();
        if !(length > 0.0) {
            return Err(KernelError::DegeneratePlane(
                "a, b and c cannot all be zero".to_string(),
            ));
        }
        Ok(Plane {
            normal: normal / length,
            w: -d / length,
        })
    }

    /// Plane through three points, oriented by `(p2 - p1) × (p3 - p1)`.
    pub fn from_points(p1: Point3<Real>, p2: Point3<Real>, p3: Point3<Real>) -> KernelResult<Self> {
        let normal = (p2 - p1).cross(&(p3 - p1));
        if normal.norm() < 1e-8 {
            return Err(KernelError::DegeneratePlane(
                "the three points are collinear".to_string(),
            ));
        }
        Self::from_point_normal(p1, normal)
    }

    /// Coefficient `d` of the equation form `N·p + d = 0`.
    #[inline]
    pub fn d(&self) -> Real {
        -self.w
    }

    /// Closest point of the plane to the origin.
    #[inline]
    pub fn base(&self) -> Point3<Real> {
        Point3::from(self.normal * self.w)
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    pub fn flipped(&self) -> Self {
        Plane {
            normal: -self.normal,
            w: -self.w,
        }
    }

    #[inline]
    pub fn signed_distance(&self, p: &Point3<Real>) -> Real {
        self.normal.dot(&p.coords) - self.w
    }

    /// Intersection of the line `origin + s·direction` with the plane.
    ///
    /// Returns `None` when the line is parallel to the plane, when `origin`
    /// lies on the plane, or (with `within_segment`) when `s` is outside `[0, 1]`.
    pub fn intersect_line(
        &self,
        origin: &Point3<Real>,
        direction: &Vector3<Real>,
        within_segment: bool,
    ) -> Option<Point3<Real>> {
        let along = self.normal.dot(direction);
        let offset = self.signed_distance(origin);
        if is_zero(along) || is_zero(offset) {
            return None;
        }
        let s = -offset / along;
        if within_segment && !(0.0..=1.0).contains(&s) {
            return None;
        }
        Some(origin + direction * s)
    }

    /// Mirror image of `p` through the plane.
    #[inline]
    pub fn mirror_point(&self, p: &Point3<Real>) -> Point3<Real> {
        p - self.normal * (2.0 * self.signed_distance(p))
    }

    /// Orthogonal projection of `p` onto the plane.
    #[inline]
    pub fn project_point(&self, p: &Point3<Real>) -> Point3<Real> {
        p - self.normal * self.signed_distance(p)
    }
}

/// Rotation axis through `origin`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    pub origin: Point3<Real>,
    pub direction: Unit<Vector3<Real>>,
}

impl Axis {
    pub fn new(origin: Point3<Real>, direction: Vector3<Real>) -> KernelResult<Self> {
        let length = direction.norm();
        if !(length > 0.0) || !length.is_finite() {
            return Err(KernelError::DegenerateAxis);
        }
        Ok(Axis {
            origin,
            direction: Unit::new_unchecked(direction / length),
        })
    }

    /// Axis from the first towards the second point.
    pub fn through(a: Point3<Real>, b: Point3<Real>) -> KernelResult<Self> {
        Self::new(a, b - a)
    }

    /// Rotate `p` by `angle` radians around the axis, right-hand rule.
    pub fn rotate_point(&self, p: &Point3<Real>, angle: Real) -> Point3<Real> {
        let rotation = Rotation3::from_axis_angle(&self.direction, angle);
        self.origin + rotation * (p - self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::FRAC_PI_2;

    #[test]
    fn equation_form_round_trips() {
        let plane = Plane::from_equation(2.0, 0.0, 0.0, -1.0).unwrap();
        assert_eq!(plane.normal, Vector3::x());
        assert!((plane.w - 0.5).abs() < 1e-15);
        assert!((plane.d() + 0.5).abs() < 1e-15);
        assert!(Plane::from_equation(0.0, 0.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn collinear_points_have_no_plane() {
        let err = Plane::from_points(
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!(matches!(err, Err(KernelError::DegeneratePlane(_))));
    }

    #[test]
    fn segment_intersection_respects_bounds() {
        let plane = Plane::from_point_normal(Point3::new(0.5, 0.0, 0.0), Vector3::x()).unwrap();
        let hit = plane.intersect_line(&Point3::origin(), &Vector3::new(1.0, 1.0, 0.0), true);
        assert_eq!(hit, Some(Point3::new(0.5, 0.5, 0.0)));
        let miss = plane.intersect_line(&Point3::new(1.0, 0.0, 0.0), &Vector3::x(), true);
        assert!(miss.is_none());
        let line = plane.intersect_line(&Point3::new(1.0, 0.0, 0.0), &Vector3::x(), false);
        assert_eq!(line, Some(Point3::new(0.5, 0.0, 0.0)));
        let parallel = plane.intersect_line(&Point3::origin(), &Vector3::y(), false);
        assert!(parallel.is_none());
    }

    #[test]
    fn mirror_and_project() {
        let plane = Plane::from_point_normal(Point3::new(0.0, 0.0, 1.0), Vector3::z()).unwrap();
        let p = Point3::new(3.0, 4.0, 3.0);
        assert_eq!(plane.mirror_point(&p), Point3::new(3.0, 4.0, -1.0));
        assert_eq!(plane.project_point(&p), Point3::new(3.0, 4.0, 1.0));
    }

    #[test]
    fn quarter_turn_about_z() {
        let axis = Axis::new(Point3::new(1.0, 0.0, 0.0), Vector3::z()).unwrap();
        let p = axis.rotate_point(&Point3::new(2.0, 0.0, 0.0), FRAC_PI_2);
        assert!((p - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
        assert_eq!(Axis::new(Point3::origin(), Vector3::zeros()), Err(KernelError::DegenerateAxis));
    }
}
