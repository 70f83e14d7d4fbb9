//! Scalar type and crate-wide tolerance.

use core::str::FromStr;
use std::sync::OnceLock;

/// Scalar type used for every coordinate in the kernel.
pub type Real = f64;

/// Lazily-initialized tolerance used for "is this zero" tests across the crate.
/// It can be overridden:
///  1) **Build-time**: set env var `FACETGEOM_TOLERANCE` (e.g. `FACETGEOM_TOLERANCE=1e-8 cargo build`)
///  2) **Runtime**: call [`set_tolerance`] once before using the library
static TOLERANCE_CELL: OnceLock<Real> = OnceLock::new();

#[inline]
const fn default_tolerance() -> Real {
    1e-9
}

/// Returns the current tolerance.
pub fn tolerance() -> Real {
    *TOLERANCE_CELL.get_or_init(|| {
        if let Some(environment_variable) = option_env!("FACETGEOM_TOLERANCE") {
            if let Ok(value) = Real::from_str(environment_variable) {
                return value.max(Real::EPSILON);
            }
        }
        default_tolerance()
    })
}

/// Set the tolerance programmatically once (subsequent calls are ignored).
pub fn set_tolerance(value: Real) {
    let _ = TOLERANCE_CELL.set(value.max(Real::EPSILON));
}

/// `true` when `value` is within [`tolerance`] of zero.
#[inline]
pub fn is_zero(value: Real) -> bool {
    value.abs() < tolerance()
}

/// Archimedes' constant (π)
pub const PI: Real = core::f64::consts::PI;

/// π/2
pub const FRAC_PI_2: Real = core::f64::consts::FRAC_PI_2;
