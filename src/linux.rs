//! Linux `/dev/i2c-N` backend.

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, Operation, SevenBitAddress};
use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
use log::{debug, info, warn};

use crate::{
    channel::BusChannel,
    config::Config,
    error::Error,
};

static OPEN_PATHS: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

/// Process-wide claim on a device path, released on drop
#[derive(Debug)]
struct PathClaim {
    path: PathBuf,
}

impl PathClaim {
    fn acquire(path: PathBuf) -> Option<Self> {
        let mut open = OPEN_PATHS.lock().unwrap_or_else(PoisonError::into_inner);
        if open.insert(path.clone()) {
            Some(Self { path })
        } else {
            None
        }
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        let mut open = OPEN_PATHS.lock().unwrap_or_else(PoisonError::into_inner);
        open.remove(&self.path);
    }
}

/// Errors from the Linux I2C character device
#[derive(Debug, thiserror::Error)]
pub enum LinuxBusError {
    /// Error reported by the kernel I2C driver
    #[error(transparent)]
    Device(#[from] LinuxI2CError),
    /// A transaction addressed a different slave than the one bound at open
    #[error("handle is bound to 0x{bound:02x}, transaction addressed 0x{requested:02x}")]
    AddressMismatch {
        /// Address bound at open time
        bound: u8,
        /// Address the transaction asked for
        requested: u8,
    },
    /// The adapter returned fewer bytes than the read asked for
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead {
        /// Bytes requested
        expected: usize,
        /// Bytes the adapter returned
        got: usize,
    },
    /// The operation sequence cannot be issued as one bus transaction
    #[error("cannot issue {operations} operations as one transaction")]
    UnsupportedTransaction {
        /// Number of operations in the rejected transaction
        operations: usize,
    },
}

impl i2c::Error for LinuxBusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// An open `/dev/i2c-N` handle with its slave address bound
///
/// The file descriptor is closed when the value is dropped.
pub struct LinuxBus {
    device: LinuxI2CDevice,
    address: u8,
    claim: PathClaim,
}

impl core::fmt::Debug for LinuxBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LinuxBus")
            .field("path", &self.claim.path)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LinuxBus {
    /// Open the device at `path` and bind `address` to it
    ///
    /// # Errors
    ///
    /// - [`Error::DeviceNotFound`] if the path does not exist
    /// - [`Error::PermissionDenied`] if access is refused
    /// - [`Error::AlreadyOpen`] if this process already holds the path open
    /// - [`Error::BusBindFailed`] if the slave address cannot be bound
    pub fn open(path: &Path, address: u8) -> Result<Self, Error<LinuxBusError>> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| classify_open_error(path, &err))?;

        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let claim = PathClaim::acquire(key).ok_or_else(|| {
            warn!("{} is already open in this process", path.display());
            Error::AlreadyOpen
        })?;

        let device = LinuxI2CDevice::new(path, u16::from(address)).map_err(|err| {
            warn!(
                "Could not bind {} to slave 0x{address:02X}: {err}",
                path.display()
            );
            Error::BusBindFailed { address }
        })?;

        info!("Opened {} at 0x{address:02X}", path.display());
        Ok(Self {
            device,
            address,
            claim,
        })
    }

    /// Path this handle was opened on
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.claim.path
    }

    fn check_address(&self, requested: u8) -> Result<(), LinuxBusError> {
        if requested == self.address {
            Ok(())
        } else {
            Err(LinuxBusError::AddressMismatch {
                bound: self.address,
                requested,
            })
        }
    }
}

fn classify_open_error<E>(path: &Path, err: &io::Error) -> Error<E> {
    debug!("Opening {} failed: {err}", path.display());
    match err.kind() {
        io::ErrorKind::NotFound => Error::DeviceNotFound,
        io::ErrorKind::PermissionDenied => Error::PermissionDenied,
        kind => Error::DeviceOpenFailed(kind),
    }
}

impl ErrorType for LinuxBus {
    type Error = LinuxBusError;
}

/// Copy an SMBus block into `read`, failing unless it fills it exactly
fn fill_from_block(block: &[u8], read: &mut [u8]) -> Result<(), LinuxBusError> {
    if block.len() != read.len() {
        return Err(LinuxBusError::ShortRead {
            expected: read.len(),
            got: block.len(),
        });
    }
    read.copy_from_slice(block);
    Ok(())
}

/// Reject operation sequences that would need a stop condition in between
fn check_transaction(operations: &[Operation<'_>]) -> Result<(), LinuxBusError> {
    match operations {
        [] | [_] | [Operation::Write(_), Operation::Read(_)] => Ok(()),
        _ => Err(LinuxBusError::UnsupportedTransaction {
            operations: operations.len(),
        }),
    }
}

impl I2c<SevenBitAddress> for LinuxBus {
    /// Only a single read, a single write, or a write followed by a read
    /// are supported. Longer sequences are rejected.
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.check_address(address)?;
        check_transaction(operations)?;
        if let [Operation::Write(data), Operation::Read(buf)] = operations {
            return self.write_read(address, data, buf);
        }
        for op in operations {
            match op {
                Operation::Read(buf) => self.device.read(buf)?,
                Operation::Write(data) => self.device.write(data)?,
            }
        }
        Ok(())
    }

    /// Single-byte register pointer followed by a read of up to 32 bytes
    /// uses the SMBus block read, which keeps both phases under one
    /// repeated start. Other shapes fall back to a write then a read.
    fn write_read(
        &mut self,
        address: SevenBitAddress,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.check_address(address)?;
        match (write, u8::try_from(read.len())) {
            ([reg], Ok(len)) if len <= 32 => {
                let block = self.device.smbus_read_i2c_block_data(*reg, len)?;
                fill_from_block(&block, read).inspect_err(|err| {
                    warn!("Register 0x{reg:02X}: {err}");
                })
            }
            _ => {
                self.device.write(write)?;
                self.device.read(read)?;
                Ok(())
            }
        }
    }
}

impl BusChannel<LinuxBus> {
    /// Open a bus channel on a Linux I2C character device
    ///
    /// # Errors
    ///
    /// See [`LinuxBus::open`].
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self, Error<LinuxBusError>> {
        let bus = LinuxBus::open(path.as_ref(), config.address)?;
        Ok(BusChannel::new(bus, config.address, config.io_deadline))
    }
}
