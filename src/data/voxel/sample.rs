//! Native sample types and their conversions to and from `f64`.

use bytemuck::{Pod, Zeroable};

use crate::data::voxel::DataType;

/// How a complex sample is reduced to a real number when read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComplexReadMode {
    #[default]
    Magnitude,
    Phase,
    Real,
    Imaginary,
}

impl ComplexReadMode {
    /// Magnitude -> Phase -> Real -> Imaginary -> Magnitude
    pub fn next(&self) -> ComplexReadMode {
        match self {
            ComplexReadMode::Magnitude => ComplexReadMode::Phase,
            ComplexReadMode::Phase => ComplexReadMode::Real,
            ComplexReadMode::Real => ComplexReadMode::Imaginary,
            ComplexReadMode::Imaginary => ComplexReadMode::Magnitude,
        }
    }
}

/// Interleaved `(re, im)` pair of `f32`, 8 bytes per sample.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Complex {
    pub re : f32,
    pub im : f32,
}

impl Complex {
    pub fn new(re : f32, im : f32) -> Self { Complex { re, im } }
}

/// A type that can be stored in a `TypedBuffer`.
///
/// `from_f64` carries the storage policy of the type: `u8` and `u16`
/// clamp to `[0, 255]`, the wide integers saturate at their own range,
/// and floats store the value as is.
pub trait Sample : Pod + Default + Send + Sync + std::fmt::Debug + 'static {
    const DATA_TYPE : DataType;
    /// Nominal `max_value` of a fresh buffer of this type.
    const DEFAULT_MAX : f64;

    fn to_f64(self) -> f64;

    fn from_f64(value : f64) -> Self;

    /// Real-valued read. Only `Complex` looks at `mode`.
    #[inline]
    fn read_as(self, _mode : ComplexReadMode) -> f64 { self.to_f64() }

    /// Builds a sample from one 8-bit RGB channel. `None` for types
    /// that cannot represent packed channels.
    #[inline]
    fn from_channel(_channel : u8) -> Option<Self> { None }
}

impl Sample for u8 {
    const DATA_TYPE : DataType = DataType::Byte;
    const DEFAULT_MAX : f64 = 255.0;

    #[inline]
    fn to_f64(self) -> f64 { self as f64 }
    #[inline]
    fn from_f64(value : f64) -> Self { value.clamp(0.0, 255.0) as u8 }
    #[inline]
    fn from_channel(channel : u8) -> Option<Self> { Some(channel) }
}

impl Sample for u16 {
    const DATA_TYPE : DataType = DataType::Short;
    const DEFAULT_MAX : f64 = 255.0;

    #[inline]
    fn to_f64(self) -> f64 { self as f64 }
    #[inline]
    fn from_f64(value : f64) -> Self { value.clamp(0.0, 255.0) as u16 }
    #[inline]
    fn from_channel(channel : u8) -> Option<Self> { Some(channel as u16) }
}

impl Sample for i32 {
    const DATA_TYPE : DataType = DataType::Integer;
    const DEFAULT_MAX : f64 = i32::MAX as f64;

    #[inline]
    fn to_f64(self) -> f64 { self as f64 }
    // `as` saturates and truncates toward zero
    #[inline]
    fn from_f64(value : f64) -> Self { value as i32 }
    #[inline]
    fn from_channel(channel : u8) -> Option<Self> { Some(channel as i32) }
}

impl Sample for i64 {
    const DATA_TYPE : DataType = DataType::Long;
    const DEFAULT_MAX : f64 = i64::MAX as f64;

    #[inline]
    fn to_f64(self) -> f64 { self as f64 }
    #[inline]
    fn from_f64(value : f64) -> Self { value as i64 }
    #[inline]
    fn from_channel(channel : u8) -> Option<Self> { Some(channel as i64) }
}

impl Sample for f32 {
    const DATA_TYPE : DataType = DataType::Float;
    const DEFAULT_MAX : f64 = 1.0;

    #[inline]
    fn to_f64(self) -> f64 { self as f64 }
    #[inline]
    fn from_f64(value : f64) -> Self { value as f32 }
}

impl Sample for f64 {
    const DATA_TYPE : DataType = DataType::Double;
    const DEFAULT_MAX : f64 = 1.0;

    #[inline]
    fn to_f64(self) -> f64 { self }
    #[inline]
    fn from_f64(value : f64) -> Self { value }
}

impl Sample for Complex {
    const DATA_TYPE : DataType = DataType::Complex;
    const DEFAULT_MAX : f64 = 1.0;

    /// Magnitude.
    #[inline]
    fn to_f64(self) -> f64 { (self.re as f64).hypot(self.im as f64) }

    /// Real part set, imaginary part zeroed.
    #[inline]
    fn from_f64(value : f64) -> Self { Complex { re : value as f32, im : 0.0 } }

    #[inline]
    fn read_as(self, mode : ComplexReadMode) -> f64 {
        match mode {
            ComplexReadMode::Magnitude => self.to_f64(),
            ComplexReadMode::Phase => (self.im as f64).atan2(self.re as f64),
            ComplexReadMode::Real => self.re as f64,
            ComplexReadMode::Imaginary => self.im as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_integers_clamp() {
        assert_eq!(u8::from_f64(300.0), 255);
        assert_eq!(u8::from_f64(-4.0), 0);
        assert_eq!(u16::from_f64(300.0), 255);
        assert_eq!(u16::from_f64(17.9), 17);
    }

    #[test]
    fn wide_integers_saturate() {
        assert_eq!(i32::from_f64(1e20), i32::MAX);
        assert_eq!(i32::from_f64(-1e20), i32::MIN);
        assert_eq!(i32::from_f64(-2.7), -2);
        assert_eq!(i64::from_f64(f64::NAN), 0);
    }

    #[test]
    fn complex_read_modes() {
        let c = Complex::new(3.0, 4.0);
        assert_eq!(c.read_as(ComplexReadMode::Magnitude), 5.0);
        assert_eq!(c.read_as(ComplexReadMode::Real), 3.0);
        assert_eq!(c.read_as(ComplexReadMode::Imaginary), 4.0);
        assert!((c.read_as(ComplexReadMode::Phase) - (4.0f64).atan2(3.0)).abs() < 1e-12);

        let mut mode = ComplexReadMode::default();
        for _ in 0..4 {
            mode = mode.next();
        }
        assert_eq!(mode, ComplexReadMode::Magnitude);
    }

    #[test]
    fn only_integer_family_takes_channels() {
        assert_eq!(u16::from_channel(200), Some(200));
        assert_eq!(f32::from_channel(200), None);
        assert_eq!(Complex::from_channel(1), None);
    }
}
