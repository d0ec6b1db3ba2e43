//! Beam-Beam Intersection

use crate::geometry::*;
use crate::pbrt::*;

/// Threshold on `|cos²θ - 1|` below which two directions are treated as parallel.
const PARALLEL_EPSILON: Float = 1e-5;

/// Closest approach between two line segments.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BeamBeamIntersection {
    /// Distance between the two lines at their closest approach.
    pub distance: Float,

    /// Sine of the angle between the two directions.
    pub sin_theta: Float,

    /// Parameter of the closest point on the first line.
    pub t1: Float,

    /// Parameter of the closest point on the second line.
    pub t2: Float,
}

/// Computes the closest approach of two lines with unit directions, restricted to an open parameter range on each.
/// Returns `None` if the lines are parallel, further apart than `sqrt(max_dist_sqr)`, or the closest points fall
/// outside either range.
///
/// * `ray1`         - First line.
/// * `range1`       - Valid parameter range `(min, max)` on the first line.
/// * `ray2`         - Second line.
/// * `range2`       - Valid parameter range `(min, max)` on the second line.
/// * `max_dist_sqr` - Square of the largest distance accepted.
pub fn test_intersection(
    ray1: &Ray,
    range1: (Float, Float),
    ray2: &Ray,
    range2: (Float, Float),
    max_dist_sqr: Float,
) -> Option<BeamBeamIntersection> {
    let d1 = ray1.d;
    let d2 = ray2.d;
    let d1xd2 = d1.cross(&d2);
    let sin_theta_sqr = d1xd2.length_squared();

    // Distance test without normalizing the cross product.
    let ad = (ray2.o - ray1.o).dot(&d1xd2);
    if ad * ad >= max_dist_sqr * sin_theta_sqr {
        return None;
    }

    let b = d1.dot(&d2);
    let one_minus_b_sqr = 1.0 - b * b;
    if abs(one_minus_b_sqr) < PARALLEL_EPSILON {
        return None;
    }

    let o1_o2 = ray1.o - ray2.o;
    let d = d1.dot(&o1_o2);
    let e = d2.dot(&o1_o2);
    let inv_denom = 1.0 / one_minus_b_sqr;

    let t1 = (b * e - d) * inv_denom;
    if !(t1 > range1.0 && t1 < range1.1) {
        return None;
    }

    let t2 = (e - b * d) * inv_denom;
    if !(t2 > range2.0 && t2 < range2.1) {
        return None;
    }

    let sin_theta = sin_theta_sqr.sqrt();
    Some(BeamBeamIntersection {
        distance: abs(ad) / sin_theta,
        sin_theta,
        t1,
        t2,
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
