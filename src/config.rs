//! Encoder configuration supplied at open time.

use std::time::Duration;

use crate::{
    angle::Direction,
    channel::{AS5600_ADDRESS, DEFAULT_IO_DEADLINE},
    utils,
};

/// Number of consecutive reads the self-test performs by default
pub const DEFAULT_SELF_TEST_READS: usize = 8;

/// Encoder configuration.
///
/// Everything the driver needs is passed here explicitly; nothing is read
/// from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// 7-bit slave address. The AS5600 answers on `0x36` only.
    pub address: u8,

    /// Upper bound for a single register transaction. A transaction that
    /// completes later than this is reported as
    /// [`ChannelError::IoTimeout`](crate::ChannelError::IoTimeout).
    /// The check runs after the transaction returns, so a stalled adapter
    /// blocks for the kernel's adapter timeout, not for this deadline.
    pub io_deadline: Duration,

    /// Consecutive angle reads performed by the self-test.
    pub self_test_reads: usize,

    /// Direction in which the reported angle increases.
    pub direction: Direction,

    /// Raw code reported as zero (0-4095).
    pub zero_offset: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: AS5600_ADDRESS,
            io_deadline: DEFAULT_IO_DEADLINE,
            self_test_reads: DEFAULT_SELF_TEST_READS,
            direction: Direction::Forward,
            zero_offset: 0,
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    #[must_use]
    pub fn with_io_deadline(mut self, deadline: Duration) -> Self {
        self.io_deadline = deadline;
        self
    }

    /// At least one read is always performed.
    #[must_use]
    pub fn with_self_test_reads(mut self, reads: usize) -> Self {
        self.self_test_reads = reads.max(1);
        self
    }

    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// The offset is wrapped into the 12-bit range.
    #[must_use]
    pub fn with_zero_offset(mut self, raw: u16) -> Self {
        self.zero_offset = utils::wrap_12bit(raw);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device() {
        let config = Config::default();
        assert_eq!(config.address, 0x36);
        assert_eq!(config.io_deadline, Duration::from_millis(5));
        assert_eq!(config.self_test_reads, DEFAULT_SELF_TEST_READS);
        assert_eq!(config.direction, Direction::Forward);
        assert_eq!(config.zero_offset, 0);
    }

    #[test]
    fn builder_clamps_values() {
        let config = Config::default()
            .with_self_test_reads(0)
            .with_zero_offset(4096 + 7);
        assert_eq!(config.self_test_reads, 1);
        assert_eq!(config.zero_offset, 7);
    }
}
