//! Magnet diagnostics and self-test results for AS5600

use crate::{angle::Angle, register::StatusRegister};

/// Magnet state derived from the `STATUS` register (0x0B)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagnetStatus {
    /// Magnet detected and field strength within range
    Ok,
    /// No magnet detected
    NotDetected,
    /// Magnet detected but field too strong (AGC minimum gain overflow)
    TooStrong,
    /// Magnet detected but field too weak (AGC maximum gain overflow)
    TooWeak,
}

impl From<StatusRegister> for MagnetStatus {
    fn from(status: StatusRegister) -> Self {
        if !status.magnet_detected() {
            MagnetStatus::NotDetected
        } else if status.mh() {
            MagnetStatus::TooStrong
        } else if status.ml() {
            MagnetStatus::TooWeak
        } else {
            MagnetStatus::Ok
        }
    }
}

/// Outcome of a successful [`As5600::test`](crate::As5600::test)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    /// Magnet state at the start of the test
    pub magnet: MagnetStatus,
    /// Automatic gain control value
    ///
    /// 0-255 in 5 V operation, 0-128 in 3.3 V operation. The gain should sit
    /// near the middle of its range; values at either end mean the air gap
    /// should be adjusted.
    pub agc: u8,
    /// CORDIC magnitude
    pub magnitude: u16,
    /// Every angle read during the test, in order
    pub angles: Vec<Angle>,
}

impl SelfTestReport {
    /// `true` when the magnet is present and neither too strong nor too weak
    #[must_use]
    pub fn magnetic_field_ok(&self) -> bool {
        self.magnet == MagnetStatus::Ok
    }

    /// Spread of the raw codes read during the test
    ///
    /// A stationary magnet should report a spread of a few counts at most.
    #[must_use]
    pub fn raw_spread(&self) -> u16 {
        let min = self.angles.iter().map(Angle::raw).min().unwrap_or(0);
        let max = self.angles.iter().map(Angle::raw).max().unwrap_or(0);
        max - min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnet_status_prefers_detection_bit() {
        assert_eq!(MagnetStatus::from(StatusRegister(0)), MagnetStatus::NotDetected);
        assert_eq!(MagnetStatus::from(StatusRegister(0b0001_0000)), MagnetStatus::NotDetected);
        assert_eq!(MagnetStatus::from(StatusRegister(0b0010_1000)), MagnetStatus::TooStrong);
        assert_eq!(MagnetStatus::from(StatusRegister(0b0011_0000)), MagnetStatus::TooWeak);
        assert_eq!(MagnetStatus::from(StatusRegister(0b0010_0000)), MagnetStatus::Ok);
    }

    #[test]
    fn raw_spread_of_readings() {
        let report = SelfTestReport {
            magnet: MagnetStatus::Ok,
            agc: 128,
            magnitude: 2000,
            angles: vec![Angle::from_raw(10), Angle::from_raw(14), Angle::from_raw(12)],
        };
        assert_eq!(report.raw_spread(), 4);
        assert!(report.magnetic_field_ok());
    }
}
