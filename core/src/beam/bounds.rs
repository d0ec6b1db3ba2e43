//! Beam Bounds

use super::*;

/// Bounding data derived from a beam once its radius is known. Computed by an explicit pass before an index is
/// built and stored alongside the beam array.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BeamBounds {
    /// Beam origin and unit direction.
    ray: Ray,

    /// Beam length.
    length: Float,

    /// Beam radius.
    radius: BeamRadius,

    /// Half-extent per axis of a unit disk perpendicular to the beam direction.
    pub margins: Vector3f,

    /// Bounds of the whole beam including its radius.
    pub aabb: Bounds3f,
}

impl BeamBounds {
    /// Create bounds for a beam.
    ///
    /// * `beam` - The beam. Its radius must have been set.
    pub fn new(beam: &Beam) -> Result<Self, String> {
        let radius = *beam
            .radius()
            .ok_or_else(|| "Beam radius has not been estimated".to_string())?;
        if !beam.is_valid() {
            return Err(format!("Invalid beam geometry {:?} length {}", beam.ray, beam.length));
        }

        // A zero direction component yields the full radius on that axis.
        let d = beam.ray.d;
        let margins = Vector3f::new(
            max(0.0, 1.0 - d.x * d.x).sqrt(),
            max(0.0, 1.0 - d.y * d.y).sqrt(),
            max(0.0, 1.0 - d.z * d.z).sqrt(),
        );

        let mut bounds = Self {
            ray: beam.ray,
            length: beam.length,
            radius,
            margins,
            aabb: Bounds3f::EMPTY,
        };
        bounds.aabb = bounds
            .segment_aabb(0.0, 0.5)
            .union(&bounds.segment_aabb(0.5, 1.0));
        Ok(bounds)
    }

    /// Returns the bounds of the whole beam.
    #[inline]
    pub fn whole_aabb(&self) -> Bounds3f {
        self.aabb
    }

    /// Returns the bounds of the part of the beam between two fractions of its length.
    ///
    /// * `t_min` - Start of the segment as a fraction of the beam length in [0, 1].
    /// * `t_max` - End of the segment as a fraction of the beam length in [0, 1].
    pub fn segment_aabb(&self, t_min: Float, t_max: Float) -> Bounds3f {
        let d0 = t_min * self.length;
        let d1 = t_max * self.length;
        let m0 = self.margins * self.radius.at(d0);
        let m1 = self.margins * self.radius.at(d1);
        let p0 = self.ray.at(d0);
        let p1 = self.ray.at(d1);
        bounds3(p0 - m0, p0 + m0).union(&bounds3(p1 - m1, p1 + m1))
    }

    /// Returns the bounds of the part of the beam inside a box, or `None` if the beam misses the box.
    ///
    /// * `bbox` - The clipping box.
    pub fn clipped_aabb(&self, bbox: &Bounds3f) -> Option<Bounds3f> {
        let expanded = bbox.expand(self.radius.max());
        let (t0, t1) = expanded.intersect_p(&self.ray, 0.0, self.length)?;
        let clipped = if t0.is_finite() && t1.is_finite() && self.length > 0.0 {
            let inv_length = 1.0 / self.length;
            self.segment_aabb(
                clamp(t0 * inv_length, 0.0, 1.0),
                clamp(t1 * inv_length, 0.0, 1.0),
            )
        } else {
            self.aabb
        };
        let result = clipped.intersect(bbox);
        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    /// Returns the beam radius.
    #[inline]
    pub fn radius(&self) -> &BeamRadius {
        &self.radius
    }
}

/// Computes the derived bounds for every beam.
///
/// * `beams` - The beams. Their radius must have been set.
pub fn compute_beam_bounds(beams: &[Beam]) -> Result<Vec<BeamBounds>, String> {
    beams
        .iter()
        .enumerate()
        .map(|(i, beam)| BeamBounds::new(beam).map_err(|e| format!("Beam {i}: {e}")))
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::*;
    use proptest::prelude::*;

    fn beam(o: Point3f, d: Vector3f, length: Float, r0: Float, r1: Float) -> Beam {
        let mut b = Beam::new(Ray::new(o, d), length, MediumId(0), Spectrum::ONE, BeamFlags::LONG_BEAM);
        b.set_radius(r0, r1).unwrap();
        b
    }

    #[test]
    fn unset_radius_is_rejected() {
        let b = Beam::new(
            Ray::new(Point3f::default(), Vector3f::new(1.0, 0.0, 0.0)),
            1.0,
            MediumId(0),
            Spectrum::ONE,
            BeamFlags::LONG_BEAM,
        );
        assert!(BeamBounds::new(&b).is_err());
        assert!(compute_beam_bounds(&[b]).is_err());
    }

    #[test]
    fn axis_aligned_beam() {
        let b = beam(
            Point3f::new(1.0, 2.0, 3.0),
            Vector3f::new(1.0, 0.0, 0.0),
            4.0,
            0.5,
            0.5,
        );
        let bb = BeamBounds::new(&b).unwrap();
        assert_eq!(bb.margins, Vector3f::new(0.0, 1.0, 1.0));
        assert_eq!(bb.aabb.p_min, Point3f::new(1.0, 1.5, 2.5));
        assert_eq!(bb.aabb.p_max, Point3f::new(5.0, 2.5, 3.5));
        assert_eq!(bb.whole_aabb(), bb.segment_aabb(0.0, 1.0));
    }

    #[test]
    fn cone_grows_along_beam() {
        let b = beam(Point3f::default(), Vector3f::new(0.0, 0.0, 1.0), 10.0, 0.1, 1.1);
        let bb = BeamBounds::new(&b).unwrap();
        let first = bb.segment_aabb(0.0, 0.1);
        let last = bb.segment_aabb(0.9, 1.0);
        assert!(approx_eq!(f32, first.p_max.x, 0.2, epsilon = 1e-5));
        assert!(approx_eq!(f32, last.p_max.x, 1.1, epsilon = 1e-5));
        assert!(approx_eq!(f32, bb.aabb.p_min.y, -1.1, epsilon = 1e-5));
    }

    #[test]
    fn clipped_aabb_misses_and_hits() {
        let b = beam(Point3f::default(), Vector3f::new(1.0, 0.0, 0.0), 10.0, 0.1, 0.1);
        let bb = BeamBounds::new(&b).unwrap();

        let far = bounds3(Point3f::new(0.0, 5.0, 5.0), Point3f::new(1.0, 6.0, 6.0));
        assert!(bb.clipped_aabb(&far).is_none());

        let cell = bounds3(Point3f::new(2.0, -1.0, -1.0), Point3f::new(3.0, 1.0, 1.0));
        let c = bb.clipped_aabb(&cell).unwrap();
        assert!(cell.encloses(&c));
        assert!(approx_eq!(f32, c.p_max.y, 0.1, epsilon = 1e-5));
        assert!(approx_eq!(f32, c.p_min.x, 2.0, epsilon = 1e-5));
    }

    prop_compose! {
        fn unit_vector()(
            x in -1.0f32..1.0f32,
            y in -1.0f32..1.0f32,
            z in -1.0f32..1.0f32
        ) -> Vector3f {
            let v = Vector3f::new(x, y, z);
            if v.length_squared() < 1e-4 {
                Vector3f::new(0.0, 1.0, 0.0)
            } else {
                v.normalize()
            }
        }
    }

    proptest! {
        #[test]
        fn segments_are_inside_whole_bounds(
            d in unit_vector(),
            length in 0.1f32..20.0f32,
            r0 in 0.01f32..1.0f32,
            r1 in 0.01f32..1.0f32,
            t0 in 0.0f32..1.0f32,
            t1 in 0.0f32..1.0f32,
        ) {
            let b = beam(Point3f::new(1.0, -2.0, 0.5), d, length, r0, r1);
            let bb = BeamBounds::new(&b).unwrap();
            let seg = bb.segment_aabb(min(t0, t1), max(t0, t1));
            let slack = 1e-4 * (1.0 + length);
            prop_assert!(bb.aabb.expand(slack).encloses(&seg));
            prop_assert!(!bb.margins.has_nans());

            // The point on the beam axis is always inside.
            let p = b.ray.at(t0 * length);
            prop_assert!(bb.aabb.expand(slack).contains(&p));
        }
    }
}
