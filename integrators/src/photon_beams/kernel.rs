//! Photon Beam Density Estimation

use super::BeamQuery;
use beams_core::beam::*;
use beams_core::medium::*;
use beams_core::pbrt::*;
use beams_core::spectrum::*;

/// Normalized 1-D Epanechnikov kernel evaluated at a distance from the beam axis.
///
/// * `dist_sqr` - Square of the distance from the beam axis.
/// * `radius`   - Kernel radius.
#[inline]
pub fn epanechnikov_1d(dist_sqr: Float, radius: Float) -> Float {
    let radius_sqr = radius * radius;
    if radius <= 0.0 || dist_sqr >= radius_sqr {
        0.0
    } else {
        0.75 / radius * (1.0 - dist_sqr / radius_sqr)
    }
}

/// Attenuation along a segment of a beam or query ray. Short segments end at a sampled free-flight distance, so the
/// transmittance is divided by the probability of reaching `t`.
///
/// * `medium` - The medium.
/// * `flags`  - Short or long.
/// * `t`      - Distance along the segment.
pub fn attenuation(medium: &dyn Medium, flags: BeamFlags, t: Float) -> Spectrum {
    let tr = medium.transmittance(t);
    if flags.contains(BeamFlags::SHORT_BEAM) {
        let p = medium.survival_probability(t);
        if p > 0.0 {
            tr / p
        } else {
            Spectrum::ZERO
        }
    } else {
        tr
    }
}

/// Returns the radiance a beam contributes to a query ray at their closest approach, before dividing by the cell
/// selection pdf.
///
/// * `beam`   - The beam.
/// * `radius` - Beam radius.
/// * `query`  - The query.
/// * `medium` - Medium shared by the beam and the query.
/// * `isect`  - Closest approach; `t1` is on the query ray and `t2` on the beam.
pub fn beam_contribution(
    beam: &Beam,
    radius: &BeamRadius,
    query: &BeamQuery,
    medium: &dyn Medium,
    isect: &BeamBeamIntersection,
) -> Spectrum {
    let kernel = epanechnikov_1d(isect.distance * isect.distance, radius.at(isect.t2));
    if kernel == 0.0 || isect.sin_theta <= 0.0 {
        return Spectrum::ZERO;
    }

    let phase = medium.phase().p(&-query.ray.d, &-beam.ray.d);
    let att = attenuation(medium, beam.flags, isect.t2) * attenuation(medium, query.flags, isect.t1);
    beam.throughput * att * medium.sigma_s() * (phase * kernel / isect.sin_theta)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
