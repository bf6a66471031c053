//! Owned I2C register channel with bounded-time transactions.

use core::fmt::Debug;
use std::time::{Duration, Instant};

use embedded_hal::i2c::I2c;
use log::{trace, warn};

use crate::error::ChannelError;

/// Fixed 7-bit slave address of the AS5600
pub const AS5600_ADDRESS: u8 = 0x36;

/// Default deadline for a single register transaction
pub const DEFAULT_IO_DEADLINE: Duration = Duration::from_millis(5);

/// Register-level access to a single device
///
/// Implementations perform no retries. A transaction is one
/// write-address/read-data pair (or one write) and must not be interleaved
/// with another transaction on the same bus.
pub trait RegisterBus {
    /// Transport error type
    type Error: Debug;

    /// Read `buf.len()` bytes starting at register `reg`
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] after [`RegisterBus::close`],
    /// [`ChannelError::IoTimeout`] if the transaction overran its deadline and
    /// [`ChannelError::Io`] for transport failures.
    fn read_into(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), ChannelError<Self::Error>>;

    /// Write `data` starting at register `reg`
    ///
    /// # Errors
    ///
    /// Same as [`RegisterBus::read_into`].
    fn write_register(&mut self, reg: u8, data: &[u8]) -> Result<(), ChannelError<Self::Error>>;

    /// Release the underlying handle. Calling this more than once is a no-op.
    fn close(&mut self);

    /// Whether [`RegisterBus::close`] has been called
    fn is_closed(&self) -> bool;

    /// Read `len` bytes starting at register `reg` into a new buffer
    ///
    /// # Errors
    ///
    /// Same as [`RegisterBus::read_into`].
    fn read_register(&mut self, reg: u8, len: u8) -> Result<Vec<u8>, ChannelError<Self::Error>> {
        let mut buf = vec![0u8; usize::from(len)];
        self.read_into(reg, &mut buf)?;
        Ok(buf)
    }
}

/// A bus channel exclusively owning one I2C handle bound to one slave address
#[derive(Debug)]
pub struct BusChannel<I2C> {
    i2c: Option<I2C>,
    address: u8,
    deadline: Duration,
}

impl<I2C, E> BusChannel<I2C>
where
    I2C: I2c<Error = E>,
{
    /// Create a channel over an already opened bus
    pub fn new(i2c: I2C, address: u8, deadline: Duration) -> Self {
        Self {
            i2c: Some(i2c),
            address,
            deadline,
        }
    }

    /// Slave address every transaction is sent to
    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Per-transaction deadline
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Release the I2C bus, consuming the channel
    ///
    /// Returns `None` if the channel was already closed.
    pub fn release(mut self) -> Option<I2C> {
        self.i2c.take()
    }

    fn timed<T>(
        &mut self,
        reg: u8,
        f: impl FnOnce(&mut I2C, u8) -> Result<T, E>,
    ) -> Result<T, ChannelError<E>> {
        let address = self.address;
        let deadline = self.deadline;
        let i2c = self.i2c.as_mut().ok_or(ChannelError::Closed)?;

        let start = Instant::now();
        let result = f(i2c, address);
        let elapsed = start.elapsed();

        let value = result.map_err(ChannelError::Io)?;
        if elapsed > deadline {
            warn!(
                "Transaction on register 0x{reg:02X} took {elapsed:?}, deadline {deadline:?}"
            );
            return Err(ChannelError::IoTimeout { elapsed });
        }
        Ok(value)
    }
}

impl<I2C, E> RegisterBus for BusChannel<I2C>
where
    I2C: I2c<Error = E>,
    E: Debug,
{
    type Error = E;

    fn read_into(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), ChannelError<E>> {
        trace!("Reading {} byte(s) from register 0x{reg:02X}", buf.len());
        self.timed(reg, |i2c, address| i2c.write_read(address, &[reg], buf))?;
        trace!("Register 0x{reg:02X} value: {buf:02X?}");
        Ok(())
    }

    fn write_register(&mut self, reg: u8, data: &[u8]) -> Result<(), ChannelError<E>> {
        trace!("Writing {data:02X?} to register 0x{reg:02X}");
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(reg);
        frame.extend_from_slice(data);
        self.timed(reg, |i2c, address| i2c.write(address, &frame))
    }

    fn close(&mut self) {
        if self.i2c.take().is_some() {
            trace!("Closed channel to 0x{:02X}", self.address);
        }
    }

    fn is_closed(&self) -> bool {
        self.i2c.is_none()
    }
}
