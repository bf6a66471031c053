//! Error types for the bus channel and the encoder context.

use core::time::Duration;
use std::io;

/// Failure of a single register transaction on a [`BusChannel`](crate::BusChannel)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError<E> {
    /// The transaction finished but took longer than the configured deadline
    #[error("bus transaction exceeded its deadline ({elapsed:?})")]
    IoTimeout {
        /// Time the transaction actually took
        elapsed: Duration,
    },
    /// Transport-level failure reported by the I2C implementation
    #[error("bus transport error: {0:?}")]
    Io(E),
    /// The channel has been closed and no longer owns a handle
    #[error("channel closed")]
    Closed,
}

/// Error type for AS5600 operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error<E> {
    /// The device path does not exist
    #[error("i2c device not found")]
    DeviceNotFound,
    /// The device path exists but access was refused
    #[error("permission denied opening i2c device")]
    PermissionDenied,
    /// Opening the device path failed for another reason
    #[error("failed to open i2c device: {0}")]
    DeviceOpenFailed(io::ErrorKind),
    /// Another live channel in this process already owns the device path
    #[error("i2c device already open in this process")]
    AlreadyOpen,
    /// Binding the slave address to the bus handle failed
    #[error("failed to bind slave address 0x{address:02x}")]
    BusBindFailed {
        /// Slave address that could not be bound
        address: u8,
    },
    /// The bus opened but the device did not answer the presence probe
    #[error("encoder did not answer presence probe: {0}")]
    EncoderOpenFailed(ChannelError<E>),
    /// A register read failed
    #[error("read failed: {0}")]
    ReadFailed(ChannelError<E>),
    /// A register write failed
    #[error("write failed: {0}")]
    WriteFailed(ChannelError<E>),
    /// The underlying bus channel is closed
    #[error("channel closed")]
    ChannelClosed,
    /// Status register reports no magnet in range (raw STATUS value)
    #[error("magnet not detected (status 0x{0:02x})")]
    MagnetNotDetected(u8),
    /// The encoder context was closed
    #[error("encoder context closed")]
    ContextClosed,
    /// Sample rate must be finite and positive
    #[error("sample rate must be finite and positive")]
    InvalidRate,
}

impl<E> Error<E> {
    /// Wrap a failed read, passing channel closure through unchanged
    pub(crate) fn read(err: ChannelError<E>) -> Self {
        match err {
            ChannelError::Closed => Error::ChannelClosed,
            other => Error::ReadFailed(other),
        }
    }

    /// Wrap a failed write, passing channel closure through unchanged
    pub(crate) fn write(err: ChannelError<E>) -> Self {
        match err {
            ChannelError::Closed => Error::ChannelClosed,
            other => Error::WriteFailed(other),
        }
    }

    /// `true` for errors after which the sampling loop cannot continue
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ChannelClosed | Error::ContextClosed)
    }
}
