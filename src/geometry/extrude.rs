//! **Extrude**
//!
//! Sweeps each selected facet into a prism. The facet's loop is copied once
//! per ring (a single ring for straight extrusions, `steps` rings around an
//! arc), consecutive rings are joined by quads and the last ring, reversed,
//! closes the end. The source facet stays in place as the start cap, so the
//! swept solid is closed: every new edge is matched by its reverse.

use crate::context::EditContext;
use crate::errors::{KernelError, KernelResult};
use crate::float_types::Real;
use crate::geometry::plane::Axis;
use crate::geometry::{EditOutcome, Facet, Geometry, Selection};
use nalgebra::{Point3, Vector3};
use std::fmt::Debug;
use tracing::{debug, instrument};

/// How [`Geometry::extrude_selected_facets`] moves the copied loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extrusion {
    /// Along each facet's own normal; negative distances go against it
    AlongNormal(Real),
    /// By the same vector for every facet
    Offset(Vector3<Real>),
    /// Around the axis through `radius_base + radius * radius_direction`
    /// running along `normal × radius_direction`, by `angle` radians in
    /// `steps` rings.
    Arc {
        radius_base: Point3<Real>,
        radius_direction: Vector3<Real>,
        radius: Real,
        angle: Real,
        steps: usize,
    },
}

impl Extrusion {
    fn check(&self) -> KernelResult<()> {
        let fine = match *self {
            Extrusion::AlongNormal(distance) => distance != 0.0 && distance.is_finite(),
            Extrusion::Offset(offset) => offset.norm() > 0.0 && offset.norm().is_finite(),
            Extrusion::Arc {
                radius, angle, steps, ..
            } => radius.is_finite() && angle != 0.0 && angle.is_finite() && steps > 0,
        };
        if fine {
            Ok(())
        } else {
            Err(KernelError::InvalidParameter(format!("{self:?} sweeps nothing")))
        }
    }

    /// Rings of the swept loop `points`, the last one being the end cap.
    fn rings(&self, points: &[Point3<Real>], normal: &Vector3<Real>) -> KernelResult<Vec<Vec<Point3<Real>>>> {
        let shifted = |offset: Vector3<Real>| -> Vec<Point3<Real>> { points.iter().map(|p| p + offset).collect() };
        match *self {
            Extrusion::AlongNormal(distance) => Ok(vec![shifted(normal * distance)]),
            Extrusion::Offset(offset) => Ok(vec![shifted(offset)]),
            Extrusion::Arc {
                radius_base,
                radius_direction,
                radius,
                angle,
                steps,
            } => {
                let direction = Axis::new(radius_base, radius_direction)?.direction.into_inner();
                let axis = Axis::new(radius_base + direction * radius, normal.cross(&direction))?;
                Ok((1..=steps)
                    .map(|step| {
                        let turn = angle * step as Real / steps as Real;
                        points.iter().map(|p| axis.rotate_point(p, turn)).collect::<Vec<_>>()
                    })
                    .collect())
            },
        }
    }
}

impl<S: Clone + Debug> Geometry<S> {
    /// Extrude every selected facet.
    ///
    /// New side and cap facets copy the metadata of the facet they were swept
    /// from and become the selection. Collinear facets have no normal and are
    /// reported in `skipped`.
    #[instrument(skip_all, fields(extrusion = ?extrusion))]
    pub fn extrude_selected_facets(
        &mut self,
        ctx: &mut EditContext,
        selection: &Selection,
        extrusion: &Extrusion,
    ) -> KernelResult<EditOutcome<S>> {
        let ids = self.selected_facets(selection)?;
        if ids.is_empty() {
            return Err(KernelError::TooFewFacets { minimum: 1, found: 0 });
        }
        extrusion.check()?;

        let mut plans = Vec::with_capacity(ids.len());
        let mut skipped = Vec::new();
        for (n, &id) in ids.iter().enumerate() {
            ctx.check_cancelled()?;
            ctx.progress(n, ids.len());
            let g = self.facet_geometry(id)?;
            if g.collinear {
                skipped.push(id);
                continue;
            }
            let points: Vec<Point3<Real>> = self.facets[id].indices().iter().map(|&i| self.vertices.at(i)).collect();
            plans.push((id, extrusion.rings(&points, &g.normal())?));
        }
        ctx.confirm_reset()?;

        let mut outcome = EditOutcome::new(Selection::new());
        outcome.skipped = skipped;
        for (id, rings) in plans {
            let mut previous = self.facets[id].indices().to_vec();
            let n = previous.len();
            for ring in &rings {
                let first = self.vertices.extend(ring)?;
                let current: Vec<usize> = (first..first + n).collect();
                for j in 0..n {
                    let next = (j + 1) % n;
                    let side = self.facets[id].with_indices(vec![previous[j], current[j], current[next], previous[next]]);
                    self.push_swept(&mut outcome, side)?;
                }
                previous = current;
            }
            previous.reverse();
            let cap = self.facets[id].with_indices(previous);
            self.push_swept(&mut outcome, cap)?;
        }
        ctx.progress(ids.len(), ids.len());
        self.initialize_geometry();
        debug!(created = outcome.created.len(), skipped = outcome.skipped.len(), "facets extruded");
        Ok(outcome)
    }

    fn push_swept(&mut self, outcome: &mut EditOutcome<S>, facet: Facet<S>) -> KernelResult<()> {
        let id = self.push_facet(facet)?;
        outcome.created.push(id);
        outcome.selection.select_facet(id);
        Ok(())
    }
}
