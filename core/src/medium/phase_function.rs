//! Phase Function

use super::HenyeyGreenstein;
use crate::geometry::*;
use crate::pbrt::*;
use std::fmt;

/// Models scattering properties in volumetric media.
#[derive(Copy, Clone, Debug)]
pub enum PhaseFunction {
    HenyeyGreenstein(HenyeyGreenstein),
}

impl PhaseFunction {
    /// Returns the value of the phase function for the given pair of directions.
    ///
    /// * `wo` - Outgoing direction.
    /// * `wi` - Incident direction.
    pub fn p(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        match self {
            PhaseFunction::HenyeyGreenstein(f) => f.p(wo, wi),
        }
    }
}

impl Default for PhaseFunction {
    /// Returns an isotropic phase function.
    fn default() -> Self {
        PhaseFunction::HenyeyGreenstein(HenyeyGreenstein::new(0.0))
    }
}

impl fmt::Display for PhaseFunction {
    /// Formats the value using the given formatter.
    ///
    /// * `f` - Formatter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HenyeyGreenstein(h) => write!(f, "[PhaseFunction HenyeyGreenstein g: {}]", h.g),
        }
    }
}
