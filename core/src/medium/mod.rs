//! Medium

use crate::pbrt::*;
use crate::spectrum::*;
use std::fmt;
use std::sync::Arc;

mod henyey_greenstein;
mod phase_function;

// Re-exports
pub use henyey_greenstein::*;
pub use phase_function::*;

/// Medium trait to handle volumetric scattering properties along a straight segment.
pub trait Medium {
    /// Returns the beam transmittance over the given distance.
    ///
    /// * `dist` - Distance travelled inside the medium.
    fn transmittance(&self, dist: Float) -> Spectrum;

    /// Returns the probability that a free-flight distance sampled by `sample_distance()` exceeds `dist`.
    ///
    /// * `dist` - Distance travelled inside the medium.
    fn survival_probability(&self, dist: Float) -> Float;

    /// Samples a free-flight distance.
    ///
    /// * `u` - Sample value in [0, 1).
    fn sample_distance(&self, u: Float) -> Float;

    /// Returns the scattering coefficient.
    fn sigma_s(&self) -> Spectrum;

    /// Returns the phase function.
    fn phase(&self) -> &PhaseFunction;
}

/// Atomic reference counted `Medium`.
pub type ArcMedium = Arc<dyn Medium + Send + Sync>;

/// Identifies a medium in a scene's medium table. Beams and queries only interact when their ids match.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediumId(pub u32);

impl MediumId {
    /// Returns the id as an index into a medium table.
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MediumId {
    /// Formats the value using the given formatter.
    ///
    /// * `f` - Formatter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "medium#{}", self.0)
    }
}

/// Looks up a medium by id.
///
/// * `media` - Medium table.
/// * `id`    - Medium id.
pub fn lookup_medium<'a>(media: &'a [ArcMedium], id: MediumId) -> Result<&'a ArcMedium, String> {
    media
        .get(id.index())
        .ok_or_else(|| format!("Unknown {id}; {} media are registered", media.len()))
}
