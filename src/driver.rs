//! Blocking driver for AS5600 magnetic position sensor

use core::fmt::Debug;

use log::{debug, info, warn};

use crate::{
    angle::{Angle, Direction},
    channel::RegisterBus,
    config::Config,
    diagnostics::{MagnetStatus, SelfTestReport},
    error::Error,
    register::{ConfRegister, Register, StatusRegister, TwelveBitRegister},
    utils,
};

/// CONF bits 14 and 15 are reserved
const CONF_MASK: u16 = 0x3FFF;

/// Lifecycle of an encoder context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Channel open, no sampling loop running
    Open,
    /// A sampling loop currently owns the context
    Sampling,
    /// Closed; every operation fails with [`Error::ContextClosed`]
    Closed,
}

/// AS5600 encoder context
///
/// Owns exactly one register bus. All register transactions go through
/// `&mut self`, so two transactions can never interleave on the channel.
#[derive(Debug)]
pub struct As5600<C> {
    bus: C,
    state: State,
    zero_offset: u16,
    direction: Direction,
    self_test_reads: usize,
}

impl<C, E> As5600<C>
where
    C: RegisterBus<Error = E>,
    E: Debug,
{
    /// Take ownership of an open bus and check that the device answers
    ///
    /// The presence probe reads the `STATUS` register. Magnet presence is
    /// not required here; [`Self::test`] checks it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EncoderOpenFailed`] if the probe read fails. The bus
    /// is closed before returning.
    pub fn attach(bus: C, config: &Config) -> Result<Self, Error<E>> {
        let mut encoder = Self {
            bus,
            state: State::Open,
            zero_offset: utils::wrap_12bit(config.zero_offset),
            direction: config.direction,
            self_test_reads: config.self_test_reads.max(1),
        };

        let mut status = [0u8; 1];
        if let Err(err) = encoder.bus.read_into(Register::Status.into(), &mut status) {
            warn!("AS5600 presence probe failed: {err:?}");
            encoder.bus.close();
            return Err(Error::EncoderOpenFailed(err));
        }
        debug!("AS5600 present, status 0x{:02X}", status[0]);

        Ok(encoder)
    }

    /// Release the register bus, consuming the driver
    pub fn release(self) -> C {
        self.bus
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: State) {
        if self.state != State::Closed && self.state != state {
            debug!("AS5600 state {:?} -> {state:?}", self.state);
            self.state = state;
        }
    }

    fn ensure_open(&self) -> Result<(), Error<E>> {
        if self.state == State::Closed {
            Err(Error::ContextClosed)
        } else {
            Ok(())
        }
    }

    fn read_register<const N: usize>(&mut self, register: Register) -> Result<[u8; N], Error<E>> {
        debug_assert_eq!(N, register.width(), "{register:?} read with the wrong width");
        self.ensure_open()?;
        let mut buf = [0u8; N];
        self.bus
            .read_into(register.into(), &mut buf)
            .map_err(Error::read)?;
        Ok(buf)
    }

    fn read_12bit(&mut self, register: Register) -> Result<u16, Error<E>> {
        let bytes = self.read_register::<2>(register)?;
        Ok(TwelveBitRegister(utils::assemble_12bit(bytes)).value())
    }

    /// Get the unscaled 12-bit angle code (0-4095)
    ///
    /// No software zero offset or direction is applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadFailed`] on transport faults,
    /// [`Error::ChannelClosed`] if the bus was closed and
    /// [`Error::ContextClosed`] after [`Self::close`].
    pub fn raw_angle(&mut self) -> Result<u16, Error<E>> {
        self.read_12bit(Register::RawAngle)
    }

    /// Get the calibrated angle
    ///
    /// Every call performs a fresh register transaction; nothing is cached.
    /// The software zero offset and direction are applied to the raw code,
    /// so the result is always in `[0, 360)` degrees.
    ///
    /// # Errors
    ///
    /// See [`Self::raw_angle`]. Reads are never retried.
    pub fn read_angle(&mut self) -> Result<Angle, Error<E>> {
        let raw = self.raw_angle()?;
        Ok(Angle::calibrated(raw, self.zero_offset, self.direction))
    }

    /// Get the angle as scaled by the device's own ZPOS/MPOS/MANG settings
    ///
    /// # Errors
    ///
    /// See [`Self::raw_angle`].
    pub fn scaled_angle(&mut self) -> Result<Angle, Error<E>> {
        self.read_12bit(Register::Angle).map(Angle::from_raw)
    }

    /// Get the `STATUS` register
    ///
    /// # Errors
    ///
    /// See [`Self::raw_angle`].
    pub fn status(&mut self) -> Result<StatusRegister, Error<E>> {
        self.read_register::<1>(Register::Status)
            .map(|[byte]| StatusRegister(byte))
    }

    /// Get the magnet state
    ///
    /// # Errors
    ///
    /// See [`Self::raw_angle`].
    pub fn magnet_status(&mut self) -> Result<MagnetStatus, Error<E>> {
        self.status().map(MagnetStatus::from)
    }

    /// Get the automatic gain control value
    ///
    /// # Errors
    ///
    /// See [`Self::raw_angle`].
    pub fn agc(&mut self) -> Result<u8, Error<E>> {
        self.read_register::<1>(Register::Agc).map(|[byte]| byte)
    }

    /// Get the 12-bit CORDIC magnitude
    ///
    /// # Errors
    ///
    /// See [`Self::raw_angle`].
    pub fn magnitude(&mut self) -> Result<u16, Error<E>> {
        self.read_12bit(Register::Magnitude)
    }

    /// Get the `CONF` register
    ///
    /// # Errors
    ///
    /// See [`Self::raw_angle`].
    pub fn conf(&mut self) -> Result<ConfRegister, Error<E>> {
        self.read_register::<2>(Register::Conf)
            .map(|bytes| ConfRegister(u16::from_be_bytes(bytes) & CONF_MASK))
    }

    /// Write the `CONF` register
    ///
    /// The setting is volatile; it is lost on power cycle and never burned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteFailed`] on transport faults,
    /// [`Error::ChannelClosed`] if the bus was closed and
    /// [`Error::ContextClosed`] after [`Self::close`].
    pub fn configure(&mut self, conf: ConfRegister) -> Result<(), Error<E>> {
        self.ensure_open()?;
        let bytes = (conf.0 & CONF_MASK).to_be_bytes();
        debug!("Writing CONF 0x{:04X}", conf.0 & CONF_MASK);
        self.bus
            .write_register(Register::Conf.into(), &bytes)
            .map_err(Error::write)
    }

    /// Set the zero position to the current raw angle
    ///
    /// Returns the new offset.
    ///
    /// # Errors
    ///
    /// See [`Self::raw_angle`]. The offset is unchanged on error.
    pub fn zero(&mut self) -> Result<u16, Error<E>> {
        let raw = self.raw_angle()?;
        self.zero_offset = raw;
        info!("AS5600 zeroed at raw {raw}");
        Ok(raw)
    }

    /// Set the raw code reported as zero
    pub fn set_zero_offset(&mut self, raw: u16) {
        self.zero_offset = utils::wrap_12bit(raw);
    }

    /// Raw code currently reported as zero
    #[must_use]
    pub fn zero_offset(&self) -> u16 {
        self.zero_offset
    }

    /// Set the direction in which the angle increases
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Validate wiring and magnet placement
    ///
    /// Reads `STATUS`, `AGC` and `MAGNITUDE`, then performs the configured
    /// number of consecutive angle reads. Every read must succeed.
    ///
    /// # Errors
    ///
    /// - [`Error::MagnetNotDetected`] if the status register reports no magnet
    /// - [`Error::ReadFailed`] if any read in the sequence fails
    /// - [`Error::ChannelClosed`] / [`Error::ContextClosed`] on lifecycle misuse
    pub fn test(&mut self) -> Result<SelfTestReport, Error<E>> {
        let status = self.status()?;
        let magnet = MagnetStatus::from(status);
        match magnet {
            MagnetStatus::NotDetected => {
                warn!("Self-test: no magnet detected (status 0x{:02X})", status.0);
                return Err(Error::MagnetNotDetected(status.0));
            }
            MagnetStatus::TooStrong | MagnetStatus::TooWeak => {
                warn!("Self-test: magnetic field out of range ({magnet:?})");
            }
            MagnetStatus::Ok => {}
        }

        let agc = self.agc()?;
        let magnitude = self.magnitude()?;

        let mut angles = Vec::with_capacity(self.self_test_reads);
        for _ in 0..self.self_test_reads {
            angles.push(self.read_angle()?);
        }

        let report = SelfTestReport {
            magnet,
            agc,
            magnitude,
            angles,
        };
        info!(
            "Self-test passed: {magnet:?}, agc {agc}, magnitude {magnitude}, spread {}",
            report.raw_spread()
        );
        Ok(report)
    }

    /// Close the context and release the bus handle
    ///
    /// Calling this more than once is a no-op.
    pub fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        self.bus.close();
        self.state = State::Closed;
        info!("AS5600 closed");
    }

    /// Whether the owned bus channel has been closed underneath the context
    #[must_use]
    pub fn is_channel_closed(&self) -> bool {
        self.bus.is_closed()
    }
}

#[cfg(feature = "linux")]
mod linux {
    use std::path::Path;

    use super::As5600;
    use crate::{
        channel::BusChannel,
        config::Config,
        error::Error,
        linux::{LinuxBus, LinuxBusError},
    };

    /// AS5600 on a Linux `/dev/i2c-N` character device
    pub type LinuxAs5600 = As5600<BusChannel<LinuxBus>>;

    impl As5600<BusChannel<LinuxBus>> {
        /// Open the encoder on the I2C bus at `path` with the default
        /// configuration
        ///
        /// # Errors
        ///
        /// See [`Self::open_with_config`].
        pub fn open(path: impl AsRef<Path>) -> Result<Self, Error<LinuxBusError>> {
            Self::open_with_config(path, &Config::default())
        }

        /// Open the encoder on the I2C bus at `path`
        ///
        /// # Errors
        ///
        /// - [`Error::DeviceNotFound`], [`Error::PermissionDenied`],
        ///   [`Error::DeviceOpenFailed`] when the path cannot be opened
        /// - [`Error::AlreadyOpen`] if this process already holds the path
        /// - [`Error::BusBindFailed`] if the slave address cannot be bound
        /// - [`Error::EncoderOpenFailed`] if the device does not answer
        pub fn open_with_config(
            path: impl AsRef<Path>,
            config: &Config,
        ) -> Result<Self, Error<LinuxBusError>> {
            let channel = BusChannel::open(path, config)?;
            Self::attach(channel, config)
        }
    }
}

#[cfg(feature = "linux")]
pub use self::linux::LinuxAs5600;
