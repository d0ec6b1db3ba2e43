//! Photon Beams

use crate::geometry::*;
use crate::medium::*;
use crate::pbrt::*;
use crate::spectrum::*;
use bitflags::bitflags;

mod bounds;
mod intersect;
mod radius;

// Re-exports
pub use bounds::*;
pub use intersect::*;
pub use radius::*;

bitflags! {
    /// How attenuation along a beam is weighted.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct BeamFlags: u32 {
        /// Beam ends at a sampled free-flight distance. Attenuation is divided by the survival probability.
        const SHORT_BEAM = 0b01;

        /// Beam runs to the medium boundary. Full transmittance is applied.
        const LONG_BEAM = 0b10;
    }
}

bitflags! {
    /// Records where the ray that produced a beam started and ended.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct RaySamplingFlags: u32 {
        /// The ray origin lies inside the medium.
        const ORIGIN_IN_MEDIUM = 0b01;

        /// The ray end lies inside the medium.
        const END_IN_MEDIUM = 0b10;
    }
}

/// Radius of a beam varying linearly along its length.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BeamRadius {
    /// Radius at the beam origin.
    pub start: Float,

    /// Radius at the beam end.
    pub end: Float,

    /// Square of the largest radius along the beam.
    pub max_sqr: Float,

    /// Radius change per unit length.
    pub change: Float,
}

impl BeamRadius {
    /// Create a new `BeamRadius`.
    ///
    /// * `start`  - Radius at the beam origin.
    /// * `end`    - Radius at the beam end.
    /// * `length` - Beam length.
    pub fn new(start: Float, end: Float, length: Float) -> Result<Self, String> {
        if !(start > 0.0 && start.is_finite()) || !(end > 0.0 && end.is_finite()) {
            return Err(format!("Beam radius must be positive and finite (start {start}, end {end})"));
        }
        let change = if length > 0.0 { (end - start) / length } else { 0.0 };
        let r = max(start, end);
        Ok(Self {
            start,
            end,
            max_sqr: r * r,
            change,
        })
    }

    /// Returns the largest radius along the beam.
    #[inline]
    pub fn max(&self) -> Float {
        self.max_sqr.sqrt()
    }

    /// Returns the radius at a distance along the beam.
    ///
    /// * `t` - Distance from the beam origin.
    #[inline]
    pub fn at(&self, t: Float) -> Float {
        self.start + t * self.change
    }
}

/// A photon beam: a segment of a ray through a participating medium carrying the
/// throughput of the light path that produced it.
#[derive(Clone, Debug)]
pub struct Beam {
    /// Beam origin and unit direction.
    pub ray: Ray,

    /// Length of the beam along `ray.d`.
    pub length: Float,

    /// Medium the beam travels through.
    pub medium: MediumId,

    /// Path throughput at the beam origin.
    pub throughput: Spectrum,

    /// Probability density of sampling the beam ray.
    pub ray_sample_pdf: Float,

    /// Probability density of sampling the beam ray in reverse.
    pub ray_sample_rev_pdf: Float,

    /// Where the beam's ray started and ended.
    pub ray_sampling_flags: RaySamplingFlags,

    /// Short or long beam.
    pub flags: BeamFlags,

    /// Radius, set once by radius estimation.
    radius: Option<BeamRadius>,
}

impl Beam {
    /// Create a new beam. The radius is left unset.
    ///
    /// * `ray`        - Beam origin and direction; the direction is normalized.
    /// * `length`     - Length of the beam.
    /// * `medium`     - Medium the beam travels through.
    /// * `throughput` - Path throughput at the beam origin.
    /// * `flags`      - Short or long beam.
    pub fn new(ray: Ray, length: Float, medium: MediumId, throughput: Spectrum, flags: BeamFlags) -> Self {
        Self {
            ray: Ray::new(ray.o, ray.d.normalize()),
            length,
            medium,
            throughput,
            ray_sample_pdf: 1.0,
            ray_sample_rev_pdf: 1.0,
            ray_sampling_flags: RaySamplingFlags::ORIGIN_IN_MEDIUM | RaySamplingFlags::END_IN_MEDIUM,
            flags,
            radius: None,
        }
    }

    /// Sets the ray sampling densities and flags.
    ///
    /// * `pdf`     - Probability density of sampling the ray.
    /// * `rev_pdf` - Probability density of sampling the ray in reverse.
    /// * `flags`   - Where the ray started and ended.
    pub fn with_ray_sampling(mut self, pdf: Float, rev_pdf: Float, flags: RaySamplingFlags) -> Self {
        self.ray_sample_pdf = pdf;
        self.ray_sample_rev_pdf = rev_pdf;
        self.ray_sampling_flags = flags;
        self
    }

    /// Returns the radius if it has been estimated.
    #[inline]
    pub fn radius(&self) -> Option<&BeamRadius> {
        self.radius.as_ref()
    }

    /// Sets the radius. The radius can only be set once.
    ///
    /// * `start` - Radius at the beam origin.
    /// * `end`   - Radius at the beam end.
    pub fn set_radius(&mut self, start: Float, end: Float) -> Result<(), String> {
        if self.radius.is_some() {
            return Err("Beam radius has already been set".to_string());
        }
        self.radius = Some(BeamRadius::new(start, end, self.length)?);
        Ok(())
    }

    /// Returns true for short beams.
    #[inline]
    pub fn is_short(&self) -> bool {
        self.flags.contains(BeamFlags::SHORT_BEAM)
    }

    /// Returns the beam end point.
    pub fn end(&self) -> Point3f {
        self.ray.at(self.length)
    }

    /// Returns true if the beam geometry is usable in an index.
    pub fn is_valid(&self) -> bool {
        !self.ray.has_nans()
            && self.length.is_finite()
            && self.length >= 0.0
            && approx_unit(self.ray.d.length_squared())
    }
}

#[inline]
fn approx_unit(len_sqr: Float) -> bool {
    abs(len_sqr - 1.0) < 1e-3
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
