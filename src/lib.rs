#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

mod angle;
mod channel;
mod config;
mod diagnostics;
mod driver;
mod error;
#[cfg(feature = "linux")]
mod linux;
mod register;
mod sampler;
mod utils;
mod velocity;

pub use angle::{Angle, Direction, FULL_SCALE_DEGREES, decode};
pub use channel::{AS5600_ADDRESS, BusChannel, DEFAULT_IO_DEADLINE, RegisterBus};
pub use config::{Config, DEFAULT_SELF_TEST_READS};
pub use diagnostics::{MagnetStatus, SelfTestReport};
pub use driver::{As5600, State};
#[cfg(feature = "linux")]
pub use driver::LinuxAs5600;
pub use error::{ChannelError, Error};
#[cfg(feature = "linux")]
pub use linux::{LinuxBus, LinuxBusError};
pub use register::{ConfRegister, Register, StatusRegister};
pub use sampler::{
    CancelToken, DEFAULT_RATE_HZ, LoopStats, MAX_PERIOD, Pacing, Sample, SamplerHandle, Samples,
};
pub use utils::RESOLUTION;
pub use velocity::{DEFAULT_WINDOW, VelocityEstimator};
