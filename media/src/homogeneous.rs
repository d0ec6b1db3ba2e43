//! Homogeneous Medium

use beams_core::medium::*;
use beams_core::pbrt::*;
use beams_core::spectrum::*;

/// Implements a homogeneous medium representing a region of space with constant
/// σa and σs values throughout its extent.
#[derive(Clone, Debug)]
pub struct HomogeneousMedium {
    /// Scattering coefficient `σs` is the probability of an out-scattering
    /// event occurring per unit distance
    sigma_s: Spectrum,

    /// Total reduction in radiance due to absorption and out-scattering
    /// `σt = σs + σa`. This combined effect of absorption and out-scattering is
    /// called attenuation or extinction.
    sigma_t: Spectrum,

    /// Extinction averaged over the spectrum; used for free-flight sampling.
    sigma_t_avg: Float,

    /// Henyey-Greenstein phase function.
    phase: PhaseFunction,
}

impl HomogeneousMedium {
    /// Create a new `HomogeneousMedium `.
    ///
    /// * `sigma_a` - Absorption cross section `σa`.
    /// * `sigma_s` - Scattering coefficient `σs`.
    /// * `g`       - The asymmetry parameter for Henyey-Greenstein phase
    ///               function.
    pub fn new(sigma_a: Spectrum, sigma_s: Spectrum, g: Float) -> Self {
        let sigma_t = sigma_s + sigma_a;
        let sigma_t_avg = sigma_t.average();
        if sigma_t_avg <= 0.0 {
            warn!("Homogeneous medium has no extinction; free-flight distances are unbounded");
        }
        Self {
            sigma_s,
            sigma_t,
            sigma_t_avg,
            phase: PhaseFunction::HenyeyGreenstein(HenyeyGreenstein::new(g)),
        }
    }

    /// Returns the extinction coefficient.
    pub fn sigma_t(&self) -> Spectrum {
        self.sigma_t
    }
}

impl Medium for HomogeneousMedium {
    /// Returns the beam transmittance over the given distance.
    ///
    /// * `dist` - Distance travelled inside the medium.
    fn transmittance(&self, dist: Float) -> Spectrum {
        (-self.sigma_t * min(dist, Float::MAX)).exp()
    }

    /// Returns the probability that a sampled free-flight distance exceeds `dist`.
    ///
    /// * `dist` - Distance travelled inside the medium.
    fn survival_probability(&self, dist: Float) -> Float {
        (-self.sigma_t_avg * dist).exp()
    }

    /// Samples a free-flight distance proportional to the average extinction.
    ///
    /// * `u` - Sample value in [0, 1).
    fn sample_distance(&self, u: Float) -> Float {
        if self.sigma_t_avg <= 0.0 {
            INFINITY
        } else {
            -(1.0 - u).ln() / self.sigma_t_avg
        }
    }

    /// Returns the scattering coefficient.
    fn sigma_s(&self) -> Spectrum {
        self.sigma_s
    }

    /// Returns the phase function.
    fn phase(&self) -> &PhaseFunction {
        &self.phase
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
