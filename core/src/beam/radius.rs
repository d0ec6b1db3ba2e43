//! Beam Radius Estimation

use super::*;

/// Estimates beam radii for progressive rendering. The radius at the start of every beam shrinks with each
/// iteration as `r_i = r_1 i^(α - 1)` and grows along the beam by `spread` per unit length.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RadiusEstimator {
    /// Radius used in the first iteration.
    pub initial_radius: Float,

    /// Radius reduction parameter in (0, 1]. 1 keeps the radius constant.
    pub alpha: Float,

    /// Radius growth per unit length along a beam.
    pub spread: Float,
}

impl Default for RadiusEstimator {
    fn default() -> Self {
        Self {
            initial_radius: 0.01,
            alpha: 0.75,
            spread: 0.0,
        }
    }
}

impl RadiusEstimator {
    /// Create a new `RadiusEstimator`.
    ///
    /// * `initial_radius` - Radius used in the first iteration.
    /// * `alpha`          - Radius reduction parameter in (0, 1].
    /// * `spread`         - Radius growth per unit length along a beam.
    pub fn new(initial_radius: Float, alpha: Float, spread: Float) -> Result<Self, String> {
        if !(initial_radius > 0.0 && initial_radius.is_finite()) {
            return Err(format!("Initial beam radius must be positive, got {initial_radius}"));
        }
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(format!("Radius reduction alpha must be in (0, 1], got {alpha}"));
        }
        if !(spread >= 0.0 && spread.is_finite()) {
            return Err(format!("Beam radius spread must be non-negative, got {spread}"));
        }
        Ok(Self {
            initial_radius,
            alpha,
            spread,
        })
    }

    /// Returns the beam start radius for an iteration.
    ///
    /// * `iteration` - 1-based iteration number. 0 is treated as 1.
    pub fn radius_for_iteration(&self, iteration: u32) -> Float {
        let i = max(iteration, 1) as Float;
        self.initial_radius * i.powf(self.alpha - 1.0)
    }

    /// Sets the radius of every beam.
    ///
    /// * `beams`     - The beams. Their radius must not have been set.
    /// * `iteration` - 1-based iteration number.
    pub fn estimate(&self, beams: &mut [Beam], iteration: u32) -> Result<Float, String> {
        let r = self.radius_for_iteration(iteration);
        for (i, beam) in beams.iter_mut().enumerate() {
            let end = r + self.spread * beam.length;
            beam.set_radius(r, end).map_err(|e| format!("Beam {i}: {e}"))?;
        }
        debug!("Iteration {iteration}: beam radius {r} for {} beams", beams.len());
        Ok(r)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::*;

    fn beams(n: usize) -> Vec<Beam> {
        (0..n)
            .map(|i| {
                Beam::new(
                    Ray::new(Point3f::default(), Vector3f::new(0.0, 1.0, 0.0)),
                    i as Float + 1.0,
                    MediumId(0),
                    Spectrum::ONE,
                    BeamFlags::SHORT_BEAM,
                )
            })
            .collect()
    }

    #[test]
    fn invalid_parameters() {
        assert!(RadiusEstimator::new(0.0, 0.5, 0.0).is_err());
        assert!(RadiusEstimator::new(0.1, 0.0, 0.0).is_err());
        assert!(RadiusEstimator::new(0.1, 1.5, 0.0).is_err());
        assert!(RadiusEstimator::new(0.1, 0.5, -1.0).is_err());
        assert!(RadiusEstimator::new(0.1, 1.0, 0.0).is_ok());
    }

    #[test]
    fn radius_shrinks_with_iterations() {
        let est = RadiusEstimator::new(0.2, 0.5, 0.0).unwrap();
        assert_eq!(est.radius_for_iteration(0), 0.2);
        assert_eq!(est.radius_for_iteration(1), 0.2);
        assert!(approx_eq!(f32, est.radius_for_iteration(4), 0.1, epsilon = 1e-6));

        let constant = RadiusEstimator::new(0.2, 1.0, 0.0).unwrap();
        assert_eq!(constant.radius_for_iteration(100), 0.2);
    }

    #[test]
    fn estimate_sets_cones_once() {
        let est = RadiusEstimator::new(0.1, 1.0, 0.05).unwrap();
        let mut bs = beams(3);
        assert_eq!(est.estimate(&mut bs, 1), Ok(0.1));
        for b in bs.iter() {
            let r = b.radius().unwrap();
            assert_eq!(r.start, 0.1);
            assert!(approx_eq!(f32, r.end, 0.1 + 0.05 * b.length, epsilon = 1e-6));
        }
        assert!(est.estimate(&mut bs, 2).is_err());
    }
}
