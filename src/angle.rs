//! Raw-to-canonical angle conversion.

use core::f32::consts::TAU;

use crate::utils::{self, RESOLUTION};

/// Full scale of the canonical angle, in degrees
pub const FULL_SCALE_DEGREES: f32 = 360.0;

const DEGREES_PER_COUNT: f32 = FULL_SCALE_DEGREES / RESOLUTION as f32;
const RADIANS_PER_COUNT: f32 = TAU / RESOLUTION as f32;

/// Convert a raw angle code to degrees in `[0, 360)`
///
/// The input is masked to 12 bits first, so out-of-range codes wrap.
#[must_use]
pub fn decode(raw: u16) -> f32 {
    f32::from(utils::wrap_12bit(raw)) * DEGREES_PER_COUNT
}

/// Rotation direction in which the angle increases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Clockwise positive
    #[default]
    Forward,
    /// Counter-clockwise positive
    Reverse,
}

/// A calibrated 12-bit angle reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Angle {
    raw: u16,
}

impl Angle {
    /// Create an angle from a raw code, masking it to 12 bits
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self {
            raw: utils::wrap_12bit(raw),
        }
    }

    /// Apply a software zero offset and direction to a raw reading
    #[must_use]
    pub const fn calibrated(raw: u16, zero_offset: u16, direction: Direction) -> Self {
        let relative = utils::wrap_12bit(raw.wrapping_sub(zero_offset));
        let oriented = match direction {
            Direction::Forward => relative,
            Direction::Reverse => utils::wrap_12bit(RESOLUTION - relative),
        };
        Self::from_raw(oriented)
    }

    /// Raw 12-bit code (0-4095)
    #[must_use]
    pub const fn raw(&self) -> u16 {
        self.raw
    }

    /// Angle in degrees, in `[0, 360)`
    #[must_use]
    pub fn degrees(&self) -> f32 {
        decode(self.raw)
    }

    /// Angle in radians, in `[0, 2π)`
    #[must_use]
    pub fn radians(&self) -> f32 {
        f32::from(self.raw) * RADIANS_PER_COUNT
    }
}

impl From<Angle> for f32 {
    fn from(angle: Angle) -> f32 {
        angle.degrees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_endpoints() {
        assert_eq!(decode(0), 0.0);
        assert_eq!(decode(2048), 180.0);
        let max = decode(4095);
        assert!(max < FULL_SCALE_DEGREES);
        assert!((max - 359.912_1).abs() < 1e-3);
    }

    #[test]
    fn decode_is_monotonic_and_wraps() {
        let mut previous = decode(0);
        for raw in 1..RESOLUTION {
            let current = decode(raw);
            assert!(current > previous, "not monotonic at {raw}");
            previous = current;
        }
        assert_eq!(decode(RESOLUTION), 0.0);
        assert_eq!(decode(RESOLUTION + 1), decode(1));
    }

    #[test]
    fn radians_stay_below_full_turn() {
        assert_eq!(Angle::from_raw(0).radians(), 0.0);
        assert!(Angle::from_raw(4095).radians() < TAU);
        assert!((Angle::from_raw(1024).radians() - TAU / 4.0).abs() < 1e-6);
    }

    #[test]
    fn zero_offset_wraps_below_zero() {
        let angle = Angle::calibrated(100, 200, Direction::Forward);
        assert_eq!(angle.raw(), 3996);
        assert_eq!(Angle::calibrated(200, 200, Direction::Forward).raw(), 0);
    }

    #[test]
    fn reverse_mirrors_without_leaving_range() {
        assert_eq!(Angle::calibrated(0, 0, Direction::Reverse).raw(), 0);
        assert_eq!(Angle::calibrated(1, 0, Direction::Reverse).raw(), 4095);
        assert_eq!(Angle::calibrated(1024, 0, Direction::Reverse).raw(), 3072);
    }
}
