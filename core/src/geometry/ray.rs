//! Rays

#![allow(dead_code)]
use super::{Float, Point3f, Vector3f};

/// A semi-infinite line given by an origin and a direction.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Ray {
    /// Origin.
    pub o: Point3f,

    /// Direction.
    pub d: Vector3f,
}

impl Ray {
    /// Returns a new ray.
    ///
    /// * `o` - Origin.
    /// * `d` - Direction.
    pub fn new(o: Point3f, d: Vector3f) -> Self {
        Self { o, d }
    }

    /// Returns true if either coordinate is NaN.
    pub fn has_nans(&self) -> bool {
        self.o.has_nans() || self.d.has_nans()
    }

    /// Get position along the ray at given parameter.
    ///
    /// * `t` - Parameter to evaluate.
    pub fn at(&self, t: Float) -> Point3f {
        self.o + self.d * t
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
