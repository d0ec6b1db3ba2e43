//! 3-D Axis Aligned Bounding Boxes.

#![allow(dead_code)]
use super::{gamma, max, min, point3, vector3, Float, Point3, Ray, Vector3, INFINITY};
use num_traits::Num;

/// 3-D Axis Aligned Bounding Box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds3<T> {
    /// Minimum bounds.
    pub p_min: Point3<T>,

    /// Maximum bounds.
    pub p_max: Point3<T>,
}

/// 3-D bounding box containing `Float` points.
pub type Bounds3f = Bounds3<Float>;

impl Bounds3f {
    /// An empty bounding box that can be grown with `union`.
    pub const EMPTY: Self = Self {
        p_min: Point3 {
            x: INFINITY,
            y: INFINITY,
            z: INFINITY,
        },
        p_max: Point3 {
            x: -INFINITY,
            y: -INFINITY,
            z: -INFINITY,
        },
    };

    /// Returns the parametric range `[t0, t1]` over which the ray overlaps the
    /// box, clipped to `[t_min, t_max]`. Returns `None` if there is no overlap.
    ///
    /// Zero direction components produce infinite reciprocals and are handled
    /// by the slab comparisons without special casing.
    ///
    /// * `ray`   - The ray.
    /// * `t_min` - Start of the parametric range.
    /// * `t_max` - End of the parametric range.
    pub fn intersect_p(&self, ray: &Ray, t_min: Float, t_max: Float) -> Option<(Float, Float)> {
        let mut t0 = t_min;
        let mut t1 = t_max;
        for i in 0..3 {
            // Update interval for _i_th bounding box slab.
            let inv_ray_dir = 1.0 / ray.d[i];
            let mut t_near = (self.p_min[i] - ray.o[i]) * inv_ray_dir;
            let mut t_far = (self.p_max[i] - ray.o[i]) * inv_ray_dir;

            // Update parametric interval from slab intersection t values.
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }

            // A NaN appears when the origin lies on a slab plane of a zero
            // direction component; the slab does not constrain the ray then.
            if t_near.is_nan() || t_far.is_nan() {
                if ray.o[i] < self.p_min[i] || ray.o[i] > self.p_max[i] {
                    return None;
                }
                continue;
            }

            // Update `t_far` to ensure robust ray-bounds intersection.
            t_far *= 1.0 + 2.0 * gamma(3);
            t0 = if t_near > t0 { t_near } else { t0 };
            t1 = if t_far < t1 { t_far } else { t1 };
            if t0 > t1 {
                return None;
            }
        }
        Some((t0, t1))
    }
}

/// Creates a new 3-D bounding box from 2 points. The minimum and maximum bounds
/// are used for each coordinate axis.
///
/// * `p1` - First point.
/// * `p2` - Second point.
pub fn bounds3<T: Num + PartialOrd + Copy>(p1: Point3<T>, p2: Point3<T>) -> Bounds3<T> {
    Bounds3 {
        p_min: point3(min(p1.x, p2.x), min(p1.y, p2.y), min(p1.z, p2.z)),
        p_max: point3(max(p1.x, p2.x), max(p1.y, p2.y), max(p1.z, p2.z)),
    }
}

impl<T: Num + PartialOrd + Copy> Bounds3<T> {
    /// Returns true if the bounds describes an empty box where any of the
    /// components of `p_max` are less than `p_min`.
    pub fn is_empty(&self) -> bool {
        self.p_max.x < self.p_min.x || self.p_max.y < self.p_min.y || self.p_max.z < self.p_min.z
    }

    /// Returns the vector along the box diagonal from the minimum point to
    /// the maximum point.
    pub fn diagonal(&self) -> Vector3<T> {
        self.p_max - self.p_min
    }

    /// Returns true if extents of another bounding box overlap with this one.
    ///
    /// * `other` - The other bounding box.
    pub fn overlaps(&self, other: &Self) -> bool {
        let x = (self.p_max.x >= other.p_min.x) && (self.p_min.x <= other.p_max.x);
        let y = (self.p_max.y >= other.p_min.y) && (self.p_min.y <= other.p_max.y);
        let z = (self.p_max.z >= other.p_min.z) && (self.p_min.z <= other.p_max.z);
        x && y && z
    }

    /// Returns true if a point is inside the bounding box.
    ///
    /// * `p` - The point.
    pub fn contains(&self, p: &Point3<T>) -> bool {
        (p.x >= self.p_min.x && p.x <= self.p_max.x)
            && (p.y >= self.p_min.y && p.y <= self.p_max.y)
            && (p.z >= self.p_min.z && p.z <= self.p_max.z)
    }

    /// Returns true if the other box lies entirely inside this one.
    ///
    /// * `other` - The other bounding box.
    pub fn encloses(&self, other: &Self) -> bool {
        self.contains(&other.p_min) && self.contains(&other.p_max)
    }

    /// Pad the bounding box by a constant factor in all dimensions.
    ///
    /// * `delta` - Padding amount.
    pub fn expand(&self, delta: T) -> Self {
        Bounds3 {
            p_min: self.p_min - vector3(delta, delta, delta),
            p_max: self.p_max + vector3(delta, delta, delta),
        }
    }

    /// Return a bounding box containing itself and a point.
    ///
    /// * `p` - The point.
    pub fn union_point(&self, p: &Point3<T>) -> Self {
        Bounds3 {
            p_min: self.p_min.min(p),
            p_max: self.p_max.max(p),
        }
    }

    /// Return a bounding box containing both bounding boxes.
    ///
    /// * `other` - The other bounding box.
    pub fn union(&self, other: &Self) -> Self {
        Bounds3 {
            p_min: self.p_min.min(&other.p_min),
            p_max: self.p_max.max(&other.p_max),
        }
    }

    /// Return a bounding box containing the intersection of both bounding boxes.
    /// The result is empty if they do not overlap.
    ///
    /// * `other` - The other bounding box.
    pub fn intersect(&self, other: &Self) -> Self {
        Bounds3 {
            p_min: self.p_min.max(&other.p_min),
            p_max: self.p_max.min(&other.p_max),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
