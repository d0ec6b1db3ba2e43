//! Henyey-Greenstein

use crate::geometry::*;
use crate::pbrt::*;

/// Henyey-Greenstein phase function.
#[derive(Copy, Clone, Debug)]
pub struct HenyeyGreenstein {
    /// The asymmetry parameter. It is the average value of the product of the
    /// phase function being approximated and the cosine of the angle between two
    /// directions. Isotropic phase functions use g = 0.
    pub g: Float,
}

impl HenyeyGreenstein {
    /// Returns a new `HenyeyGreenstein`.
    ///
    /// * `g` - The asymmetry parameter; clamped to (-1, 1).
    pub fn new(g: Float) -> Self {
        Self {
            g: clamp(g, -0.999, 0.999),
        }
    }

    /// Returns the value of the phase function for the given pair of directions.
    ///
    /// * `wo` - Outgoing direction.
    /// * `wi` - Incident direction.
    pub fn p(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        phase_hg(wo.dot(wi), self.g)
    }
}

/// Computes the Henyey-Greenstein phase function which can be used by other
/// phase function
///
/// * `cos_theta` - Angle between two direction vectors.
/// * `g`         - Asymmetry parametery.
#[inline]
pub fn phase_hg(cos_theta: Float, g: Float) -> Float {
    let denom = 1.0 + g * g + 2.0 * g * cos_theta;
    INV_FOUR_PI * (1.0 - g * g) / (denom * denom.sqrt())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
