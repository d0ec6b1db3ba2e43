//! 3-D Points

#![allow(dead_code)]
use super::{max, min, Float, Vector3};
use num_traits::Num;
use std::ops::{Add, AddAssign, Sub};

/// A 3-D point containing numeric values.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point3<T> {
    /// X-coordinate.
    pub x: T,

    /// Y-coordinate.
    pub y: T,

    /// Z-coordinate.
    pub z: T,
}

/// 3-D point containing `Float` values.
pub type Point3f = Point3<Float>;

/// Creates a new 3-D point.
///
/// * `x` - X-coordinate.
/// * `y` - Y-coordinate.
/// * `z` - Z-coordinate.
pub fn point3<T>(x: T, y: T, z: T) -> Point3<T> {
    Point3 { x, y, z }
}

impl_coordinates!(Point3);

impl<T: PartialOrd + Copy> Point3<T> {
    /// Return the component-wise minimum with another point.
    ///
    /// * `other` - The other point.
    pub fn min(&self, other: &Self) -> Self {
        point3(min(self.x, other.x), min(self.y, other.y), min(self.z, other.z))
    }

    /// Return the component-wise maximum with another point.
    ///
    /// * `other` - The other point.
    pub fn max(&self, other: &Self) -> Self {
        point3(max(self.x, other.x), max(self.y, other.y), max(self.z, other.z))
    }
}

impl<T: num_traits::Float> Point3<T> {
    /// Returns the distance to another point.
    ///
    /// * `other` - The other point.
    pub fn distance(self, other: Self) -> T {
        (self - other).length()
    }
}

impl<T: Num> Add<Vector3<T>> for Point3<T> {
    type Output = Self;

    /// Offset the point by the given vector.
    ///
    /// * `v` - The offset.
    fn add(self, v: Vector3<T>) -> Self::Output {
        point3(self.x + v.x, self.y + v.y, self.z + v.z)
    }
}

impl<T: Num + Copy> AddAssign<Vector3<T>> for Point3<T> {
    /// Offset the point by the given vector.
    ///
    /// * `v` - The offset.
    fn add_assign(&mut self, v: Vector3<T>) {
        *self = *self + v;
    }
}

impl<T: Num> Sub for Point3<T> {
    type Output = Vector3<T>;

    /// Returns the vector from the given point to this one.
    ///
    /// * `other` - The other point.
    fn sub(self, other: Self) -> Self::Output {
        Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl<T: Num> Sub<Vector3<T>> for Point3<T> {
    type Output = Self;

    /// Offset the point by the negated vector.
    ///
    /// * `v` - The offset.
    fn sub(self, v: Vector3<T>) -> Self::Output {
        point3(self.x - v.x, self.y - v.y, self.z - v.z)
    }
}

impl<T> From<Vector3<T>> for Point3<T> {
    /// Convert a vector from the origin to a 3-D point.
    ///
    /// * `v` - 3-D vector.
    fn from(v: Vector3<T>) -> Self {
        point3(v.x, v.y, v.z)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
