//! Geometry

use super::pbrt::*;

// Define macros for property based testing.
#[cfg(test)]
#[macro_export]
macro_rules! prop_range {
    ($name: ident, $t: ty, $r: expr) => {
        prop_compose! {
            fn $name()(f in $r) -> $t {
                f
            }
        }
    };
}

#[cfg(test)]
#[macro_export]
macro_rules! prop_vector3 {
    ($name: ident, $t: ty, $xr: expr, $yr: expr, $zr: expr) => {
        prop_compose! {
            fn $name()(x in $xr, y in $yr, z in $zr) -> Vector3<$t> {
                Vector3 { x, y, z }
            }
        }
    };
}

#[cfg(test)]
#[macro_export]
macro_rules! prop_point3 {
    ($name: ident, $t: ty, $xr: expr, $yr: expr, $zr: expr) => {
        prop_compose! {
            fn $name()(x in $xr, y in $yr, z in $zr) -> Point3<$t> {
                Point3 { x, y, z }
            }
        }
    };
}

// Shared coordinate accessors for `Point3` and `Vector3`.
macro_rules! impl_coordinates {
    ($name: ident) => {
        impl<T> $name<T> {
            /// Creates a new value from its coordinates.
            ///
            /// * `x` - X-coordinate.
            /// * `y` - Y-coordinate.
            /// * `z` - Z-coordinate.
            pub fn new(x: T, y: T, z: T) -> Self {
                Self { x, y, z }
            }

            /// Returns true if any coordinate is NaN.
            pub fn has_nans(&self) -> bool
            where
                T: num_traits::Float,
            {
                self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
            }
        }

        impl<T> std::ops::Index<usize> for $name<T> {
            type Output = T;

            /// Index by axis number (0..3).
            ///
            /// * `i` - Axis index.
            fn index(&self, i: usize) -> &Self::Output {
                match i {
                    0 => &self.x,
                    1 => &self.y,
                    2 => &self.z,
                    _ => panic!("Invalid axis {i} for {}", stringify!($name)),
                }
            }
        }

        impl<T> std::ops::IndexMut<usize> for $name<T> {
            /// Index by axis number (0..3) to get a mutable coordinate.
            ///
            /// * `i` - Axis index.
            fn index_mut(&mut self, i: usize) -> &mut Self::Output {
                match i {
                    0 => &mut self.x,
                    1 => &mut self.y,
                    2 => &mut self.z,
                    _ => panic!("Invalid axis {i} for {}", stringify!($name)),
                }
            }
        }
    };
}

mod bounds3;
mod point3;
mod ray;
mod vector3;

// Re-export
pub use bounds3::*;
pub use point3::*;
pub use ray::*;
pub use vector3::*;
