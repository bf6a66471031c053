//! Register addresses for AS5600 sensor.

/// Register addresses for AS5600
///
/// Two-byte registers are addressed by their high byte; the low byte
/// follows at the next address and the device auto-increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
#[repr(u8)]
pub enum Register {
    /// Number of times ZPOS and MPOS have been burned
    Zmco = 0x00,
    /// Zero position (start position)
    ZPos = 0x01,
    /// Maximum position (stop position)
    MPos = 0x03,
    /// Maximum angle
    MAng = 0x05,
    /// Configuration
    Conf = 0x07,

    /// Magnet status
    Status = 0x0B,
    /// Unscaled and unmodified angle (12-bit)
    RawAngle = 0x0C,
    /// Angle scaled by ZPOS/MPOS/MANG, with 10-LSB hysteresis at the limits (12-bit)
    Angle = 0x0E,
    /// Automatic gain control
    Agc = 0x1A,
    /// CORDIC magnitude (12-bit)
    Magnitude = 0x1B,

    /// Burn command
    Burn = 0xFF,
}

impl Register {
    /// Width of the register in bytes
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Register::Zmco | Register::Status | Register::Agc | Register::Burn => 1,
            _ => 2,
        }
    }
}

impl From<Register> for u8 {
    fn from(reg: Register) -> u8 {
        reg as u8
    }
}

bitfield::bitfield! {
    /// STATUS
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct StatusRegister(u8);
    impl Debug;
    u8;
    /// Magnet detected
    pub md, _: 5;
    /// AGC maximum gain overflow, magnet too weak
    pub ml, _: 4;
    /// AGC minimum gain overflow, magnet too strong
    pub mh, _: 3;
}

impl StatusRegister {
    /// Check if a magnet is in range of the sensor
    #[must_use]
    #[inline(always)]
    pub fn magnet_detected(&self) -> bool {
        self.md()
    }

    /// Check if the magnetic field strength is within acceptable range
    #[must_use]
    #[inline(always)]
    pub fn magnetic_field_ok(&self) -> bool {
        !self.mh() && !self.ml()
    }
}

bitfield::bitfield! {
    /// CONF
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConfRegister(u16);
    impl Debug;
    u8;
    /// Watchdog
    pub wd, set_wd: 13;
    /// Fast filter threshold
    pub fth, set_fth: 12, 10;
    /// Slow filter
    ///
    /// - `00` = 16x
    /// - `01` = 8x
    /// - `10` = 4x
    /// - `11` = 2x
    pub sf, set_sf: 9, 8;
    /// PWM frequency
    pub pwmf, set_pwmf: 7, 6;
    /// Output stage
    ///
    /// - `00` = analog (full range from 0% to 100% between GND and VDD)
    /// - `01` = analog (reduced range from 10% to 90% between GND and VDD)
    /// - `10` = digital PWM
    pub outs, set_outs: 5, 4;
    /// Hysteresis in LSBs (0-3)
    pub hyst, set_hyst: 3, 2;
    /// Power mode
    ///
    /// - `00` = NOM
    /// - `01` = LPM1
    /// - `10` = LPM2
    /// - `11` = LPM3
    pub pm, set_pm: 1, 0;
}

bitfield::bitfield! {
    /// RAW ANGLE / ANGLE / MAGNITUDE
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct TwelveBitRegister(u16);
    impl Debug;
    u16;
    /// 12-bit value; the upper nibble of the high byte is unused
    pub value, _: 11, 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits_decode() {
        let status = StatusRegister(0b0010_0000);
        assert!(status.magnet_detected());
        assert!(status.magnetic_field_ok());

        let weak = StatusRegister(0b0011_0000);
        assert!(weak.magnet_detected());
        assert!(weak.ml());
        assert!(!weak.magnetic_field_ok());

        let none = StatusRegister(0);
        assert!(!none.magnet_detected());
    }

    #[test]
    fn conf_fields_round_trip_through_setters() {
        let mut conf = ConfRegister::default();
        conf.set_pm(0b11);
        conf.set_hyst(0b10);
        conf.set_sf(0b01);
        conf.set_wd(true);
        assert_eq!(conf.0, 0b10_0001_0000_1011);
        assert_eq!(conf.hyst(), 0b10);
    }

    #[test]
    fn twelve_bit_register_drops_upper_nibble() {
        assert_eq!(TwelveBitRegister(0xFFFF).value(), 0x0FFF);
        assert_eq!(TwelveBitRegister(0x0800).value(), 2048);
    }

    #[test]
    fn register_widths() {
        assert_eq!(Register::Status.width(), 1);
        assert_eq!(Register::Agc.width(), 1);
        assert_eq!(Register::RawAngle.width(), 2);
        assert_eq!(Register::Angle.width(), 2);
        assert_eq!(Register::Magnitude.width(), 2);
        assert_eq!(Register::Conf.width(), 2);
        assert_eq!(u8::from(Register::Magnitude), 0x1B);
    }
}
