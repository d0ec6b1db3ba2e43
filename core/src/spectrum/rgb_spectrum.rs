//! RGB Spectrum.

#![allow(dead_code)]

use crate::pbrt::*;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub};

/// Number of spectral samples to use for `RGBSpectrum`.
pub const RGB_SAMPLES: usize = 3;

/// RGBSpectrum represents an spectral power distribution (SPD) with
/// a weighted sum of red, green and blue components.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RGBSpectrum {
    /// The sampled spectral values.
    c: [Float; RGB_SAMPLES],
}

impl RGBSpectrum {
    /// Black.
    pub const ZERO: Self = Self { c: [0.0; RGB_SAMPLES] };

    /// White.
    pub const ONE: Self = Self { c: [1.0; RGB_SAMPLES] };

    /// Create a new `RGBSpectrum` with a constant value across all
    /// wavelengths.
    ///
    /// * `v` - Constant value.
    pub fn new(v: Float) -> Self {
        let ret = Self { c: [v; RGB_SAMPLES] };
        debug_assert!(!ret.has_nans());
        ret
    }

    /// Create a new `RGBSpectrum` from red, green and blue components.
    ///
    /// * `rgb` - The RGB components.
    pub fn from_rgb(rgb: [Float; RGB_SAMPLES]) -> Self {
        let ret = Self { c: rgb };
        debug_assert!(!ret.has_nans());
        ret
    }

    /// Returns the RGB components.
    pub fn to_rgb(&self) -> [Float; RGB_SAMPLES] {
        self.c
    }

    /// Returns true if any sample is NaN.
    pub fn has_nans(&self) -> bool {
        self.c.iter().any(|v| v.is_nan())
    }

    /// Returns true if all samples are zero.
    pub fn is_black(&self) -> bool {
        self.c.iter().all(|&v| v == 0.0)
    }

    /// Returns the mean of the samples.
    pub fn average(&self) -> Float {
        self.c.iter().sum::<Float>() / RGB_SAMPLES as Float
    }

    /// Returns the largest sample value.
    pub fn max_component_value(&self) -> Float {
        self.c.iter().fold(-INFINITY, |m, &v| max(m, v))
    }

    /// Returns `e^v` for each sample value `v`.
    pub fn exp(&self) -> Self {
        Self {
            c: [self.c[0].exp(), self.c[1].exp(), self.c[2].exp()],
        }
    }
}

impl Index<usize> for RGBSpectrum {
    type Output = Float;

    /// Index the spectrum samples.
    ///
    /// * `i` - Sample index.
    fn index(&self, i: usize) -> &Self::Output {
        &self.c[i]
    }
}

impl IndexMut<usize> for RGBSpectrum {
    /// Index the spectrum samples for mutation.
    ///
    /// * `i` - Sample index.
    fn index_mut(&mut self, i: usize) -> &mut Self::Output {
        &mut self.c[i]
    }
}

impl Add for RGBSpectrum {
    type Output = Self;

    /// Adds the given spectrum and returns the result.
    ///
    /// * `other` - The spectrum to add.
    fn add(self, other: Self) -> Self::Output {
        Self {
            c: [self.c[0] + other.c[0], self.c[1] + other.c[1], self.c[2] + other.c[2]],
        }
    }
}

impl AddAssign for RGBSpectrum {
    /// Performs the `+=` operation.
    ///
    /// * `other` - The spectrum to add.
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for RGBSpectrum {
    type Output = Self;

    /// Subtracts the given spectrum and returns the result.
    ///
    /// * `other` - The spectrum to subtract.
    fn sub(self, other: Self) -> Self::Output {
        Self {
            c: [self.c[0] - other.c[0], self.c[1] - other.c[1], self.c[2] - other.c[2]],
        }
    }
}

impl Mul for RGBSpectrum {
    type Output = Self;

    /// Multiplies each sample with the corresponding sample of another spectrum.
    ///
    /// * `other` - The other spectrum.
    fn mul(self, other: Self) -> Self::Output {
        Self {
            c: [self.c[0] * other.c[0], self.c[1] * other.c[1], self.c[2] * other.c[2]],
        }
    }
}

impl MulAssign for RGBSpectrum {
    /// Performs the `*=` operation.
    ///
    /// * `other` - The other spectrum.
    fn mul_assign(&mut self, other: Self) {
        *self = *self * other;
    }
}

impl Mul<Float> for RGBSpectrum {
    type Output = Self;

    /// Scales the spectrum.
    ///
    /// * `f` - The scaling factor.
    fn mul(self, f: Float) -> Self::Output {
        Self {
            c: [self.c[0] * f, self.c[1] * f, self.c[2] * f],
        }
    }
}

impl Mul<RGBSpectrum> for Float {
    type Output = RGBSpectrum;

    /// Scales the spectrum.
    ///
    /// * `s` - The spectrum.
    fn mul(self, s: RGBSpectrum) -> Self::Output {
        s * self
    }
}

impl MulAssign<Float> for RGBSpectrum {
    /// Scales the spectrum in place.
    ///
    /// * `f` - The scaling factor.
    fn mul_assign(&mut self, f: Float) {
        *self = *self * f;
    }
}

impl Div<Float> for RGBSpectrum {
    type Output = Self;

    /// Scales the spectrum by 1/f.
    ///
    /// * `f` - The scaling factor.
    fn div(self, f: Float) -> Self::Output {
        debug_assert!(f != 0.0);
        let inv = 1.0 / f;
        self * inv
    }
}

impl DivAssign<Float> for RGBSpectrum {
    /// Scales the spectrum by 1/f in place.
    ///
    /// * `f` - The scaling factor.
    fn div_assign(&mut self, f: Float) {
        *self = *self / f;
    }
}

impl Neg for RGBSpectrum {
    type Output = Self;

    /// Negates each sample.
    fn neg(self) -> Self::Output {
        Self {
            c: [-self.c[0], -self.c[1], -self.c[2]],
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
