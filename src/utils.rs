/// Number of distinct raw angle codes (12-bit)
pub const RESOLUTION: u16 = 1 << 12;

const DATA_MASK: u16 = RESOLUTION - 1;

/// Assemble a 12-bit value from a big-endian register pair
///
/// The high byte is masked to its low nibble before concatenation.
#[must_use]
pub fn assemble_12bit(bytes: [u8; 2]) -> u16 {
    (u16::from(bytes[0] & 0x0F) << 8) | u16::from(bytes[1])
}

/// Wrap any value into the 12-bit range
#[must_use]
pub const fn wrap_12bit(value: u16) -> u16 {
    value & DATA_MASK
}

/// Shortest signed distance in raw counts from `from` to `to`
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn shortest_delta(from: u16, to: u16) -> i16 {
    let half = RESOLUTION / 2;
    let forward = wrap_12bit(to.wrapping_sub(from));
    if forward >= half {
        forward as i16 - RESOLUTION as i16
    } else {
        forward as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_and_masks_high_nibble() {
        assert_eq!(assemble_12bit([0x00, 0x00]), 0);
        assert_eq!(assemble_12bit([0x0F, 0xFF]), 4095);
        assert_eq!(assemble_12bit([0xF8, 0x00]), 2048);
        assert_eq!(assemble_12bit([0x01, 0x23]), 0x123);
    }

    #[test]
    fn wraps_at_resolution() {
        assert_eq!(wrap_12bit(4096), 0);
        assert_eq!(wrap_12bit(4097), 1);
        assert_eq!(wrap_12bit(0u16.wrapping_sub(1)), 4095);
    }

    #[test]
    fn shortest_delta_crosses_zero() {
        assert_eq!(shortest_delta(4090, 5), 11);
        assert_eq!(shortest_delta(5, 4090), -11);
        assert_eq!(shortest_delta(100, 200), 100);
        assert_eq!(shortest_delta(0, 2048), -2048);
    }
}
