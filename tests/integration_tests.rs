//! Integration tests for AS5600 driver using mocked I2C.

use std::thread;
use std::time::Duration;

use as5600_i2c::{
    As5600, BusChannel, ChannelError, ConfRegister, Config, DEFAULT_IO_DEADLINE, Direction, Error,
    MagnetStatus, State,
};
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

const ADDR: u8 = 0x36;

/// Status with only the magnet-detected bit set
const STATUS_MD: u8 = 0b0010_0000;

/// Helper to create a single-register read expectation.
fn read(register: u8, response: &[u8]) -> I2cTransaction {
    I2cTransaction::write_read(ADDR, vec![register], response.to_vec())
}

/// Helper to create the presence probe every attach performs.
fn probe() -> I2cTransaction {
    read(0x0B, &[STATUS_MD])
}

/// Helper to create a raw angle read returning `raw`.
fn raw_angle(raw: u16) -> I2cTransaction {
    read(0x0C, &raw.to_be_bytes())
}

fn attach(
    mock: &I2cMock,
    config: &Config,
) -> As5600<BusChannel<I2cMock>> {
    let channel = BusChannel::new(mock.clone(), ADDR, config.io_deadline);
    As5600::attach(channel, config).unwrap()
}

#[test]
fn reads_half_scale_angle() {
    let expectations = [probe(), raw_angle(2048)];
    let mut mock = I2cMock::new(&expectations);
    let mut sensor = attach(&mock, &Config::default());

    let angle = sensor.read_angle().unwrap();
    assert_eq!(angle.raw(), 2048);
    assert_eq!(angle.degrees(), 180.0);

    mock.done();
}

#[test]
fn masks_high_nibble_of_angle_register() {
    let expectations = [probe(), read(0x0C, &[0xFF, 0xFF]), read(0x0C, &[0xF0, 0x00])];
    let mut mock = I2cMock::new(&expectations);
    let mut sensor = attach(&mock, &Config::default());

    assert_eq!(sensor.read_angle().unwrap().raw(), 4095);
    assert_eq!(sensor.read_angle().unwrap().raw(), 0);

    mock.done();
}

#[test]
fn every_read_is_a_fresh_transaction() {
    let angles = [0x000, 0x400, 0x400, 0xC00];
    let mut expectations = vec![probe()];
    expectations.extend(angles.iter().map(|&raw| raw_angle(raw)));

    let mut mock = I2cMock::new(&expectations);
    let mut sensor = attach(&mock, &Config::default());

    for &expected in &angles {
        assert_eq!(sensor.read_angle().unwrap().raw(), expected);
    }

    mock.done();
}

#[test]
fn transport_error_surfaces_as_read_failed() {
    let expectations = [
        probe(),
        read(0x0C, &[0x00, 0x00]).with_error(ErrorKind::Other),
    ];
    let mut mock = I2cMock::new(&expectations);
    let mut sensor = attach(&mock, &Config::default());

    let result = sensor.read_angle();
    assert_eq!(result, Err(Error::ReadFailed(ChannelError::Io(ErrorKind::Other))));
    assert_eq!(sensor.state(), State::Open);

    mock.done();
}

#[test]
fn failed_probe_is_encoder_open_failed() {
    let expectations = [read(0x0B, &[0x00]).with_error(ErrorKind::NoAcknowledge(
        embedded_hal::i2c::NoAcknowledgeSource::Address,
    ))];
    let mut mock = I2cMock::new(&expectations);
    let channel = BusChannel::new(mock.clone(), ADDR, DEFAULT_IO_DEADLINE);

    let result = As5600::attach(channel, &Config::default());
    assert!(matches!(
        result,
        Err(Error::EncoderOpenFailed(ChannelError::Io(ErrorKind::NoAcknowledge(_))))
    ));

    mock.done();
}

#[test]
fn self_test_passes_with_magnet() {
    let expectations = [
        probe(),
        read(0x0B, &[STATUS_MD]),
        read(0x1A, &[0x80]),
        read(0x1B, &[0x07, 0xD0]),
        raw_angle(1000),
        raw_angle(1001),
        raw_angle(999),
    ];
    let mut mock = I2cMock::new(&expectations);
    let mut sensor = attach(&mock, &Config::default().with_self_test_reads(3));

    let report = sensor.test().unwrap();
    assert_eq!(report.magnet, MagnetStatus::Ok);
    assert_eq!(report.agc, 0x80);
    assert_eq!(report.magnitude, 2000);
    assert_eq!(report.angles.len(), 3);
    assert_eq!(report.raw_spread(), 2);

    mock.done();
}

#[test]
fn self_test_fails_without_magnet() {
    let expectations = [probe(), read(0x0B, &[0x00])];
    let mut mock = I2cMock::new(&expectations);
    let mut sensor = attach(&mock, &Config::default());

    assert_eq!(sensor.test(), Err(Error::MagnetNotDetected(0x00)));

    mock.done();
}

#[test]
fn self_test_fails_on_read_error() {
    let expectations = [
        probe(),
        read(0x0B, &[STATUS_MD]),
        read(0x1A, &[0x80]),
        read(0x1B, &[0x07, 0xD0]),
        raw_angle(1000),
        read(0x0C, &[0, 0]).with_error(ErrorKind::Bus),
    ];
    let mut mock = I2cMock::new(&expectations);
    let mut sensor = attach(&mock, &Config::default().with_self_test_reads(4));

    assert_eq!(
        sensor.test(),
        Err(Error::ReadFailed(ChannelError::Io(ErrorKind::Bus)))
    );

    mock.done();
}

#[test]
fn zero_and_direction_apply_to_reads() {
    let expectations = [probe(), raw_angle(1000), raw_angle(1100), raw_angle(1100)];
    let mut mock = I2cMock::new(&expectations);
    let mut sensor = attach(&mock, &Config::default());

    assert_eq!(sensor.zero().unwrap(), 1000);
    assert_eq!(sensor.read_angle().unwrap().raw(), 100);

    sensor.set_direction(Direction::Reverse);
    assert_eq!(sensor.read_angle().unwrap().raw(), 3996);

    mock.done();
}

#[test]
fn configure_writes_conf_register() {
    let expectations = [
        probe(),
        I2cTransaction::write(ADDR, vec![0x07, 0x21, 0x0B]),
        read(0x07, &[0xE1, 0x0B]),
    ];
    let mut mock = I2cMock::new(&expectations);
    let mut sensor = attach(&mock, &Config::default());

    let mut conf = ConfRegister::default();
    conf.set_pm(0b11);
    conf.set_hyst(0b10);
    conf.set_sf(0b01);
    conf.set_wd(true);
    sensor.configure(conf).unwrap();

    // reserved top bits are dropped on read
    assert_eq!(sensor.conf().unwrap(), conf);

    mock.done();
}

#[test]
fn reads_diagnostic_registers() {
    let expectations = [
        probe(),
        read(0x0B, &[0b0010_1000]),
        read(0x1A, &[0x42]),
        read(0x1B, &[0xF1, 0x23]),
        read(0x0E, &[0x04, 0x00]),
    ];
    let mut mock = I2cMock::new(&expectations);
    let mut sensor = attach(&mock, &Config::default());

    assert_eq!(sensor.magnet_status().unwrap(), MagnetStatus::TooStrong);
    assert_eq!(sensor.agc().unwrap(), 0x42);
    assert_eq!(sensor.magnitude().unwrap(), 0x123);
    assert_eq!(sensor.scaled_angle().unwrap().degrees(), 90.0);

    mock.done();
}

#[test]
fn close_is_idempotent_and_terminal() {
    let expectations = [probe()];
    let mut mock = I2cMock::new(&expectations);
    let mut sensor = attach(&mock, &Config::default());

    sensor.close();
    sensor.close();
    assert_eq!(sensor.state(), State::Closed);
    assert!(sensor.is_channel_closed());
    assert_eq!(sensor.read_angle(), Err(Error::ContextClosed));
    assert_eq!(sensor.test(), Err(Error::ContextClosed));
    assert_eq!(sensor.configure(ConfRegister::default()), Err(Error::ContextClosed));

    mock.done();
}

/// I2C bus that answers correctly, turning slow after `fast_calls` transactions.
#[derive(Debug)]
struct SlowI2c {
    fast_calls: usize,
    delay: Duration,
}

impl ErrorType for SlowI2c {
    type Error = ErrorKind;
}

impl I2c for SlowI2c {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fast_calls == 0 {
            thread::sleep(self.delay);
        } else {
            self.fast_calls -= 1;
        }
        for op in operations {
            if let Operation::Read(buf) = op {
                buf.fill(0x20);
            }
        }
        Ok(())
    }
}

#[test]
fn slow_probe_is_encoder_open_failed() {
    let deadline = Duration::from_millis(1);
    let slow = SlowI2c {
        fast_calls: 0,
        delay: Duration::from_millis(20),
    };
    let channel = BusChannel::new(slow, ADDR, deadline);

    match As5600::attach(channel, &Config::default().with_io_deadline(deadline)) {
        Err(Error::EncoderOpenFailed(ChannelError::IoTimeout { elapsed })) => {
            assert!(elapsed > deadline);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn slow_angle_read_is_read_failed_timeout() {
    let deadline = Duration::from_millis(1);
    let slow = SlowI2c {
        fast_calls: 1,
        delay: Duration::from_millis(20),
    };
    let channel = BusChannel::new(slow, ADDR, deadline);
    let mut sensor = As5600::attach(channel, &Config::default().with_io_deadline(deadline)).unwrap();

    assert!(matches!(
        sensor.read_angle(),
        Err(Error::ReadFailed(ChannelError::IoTimeout { .. }))
    ));
    // a timeout is not fatal; the context stays usable
    assert_eq!(sensor.state(), State::Open);
    assert!(!sensor.is_channel_closed());
}

#[cfg(feature = "linux")]
#[test]
fn opening_missing_device_is_device_not_found() {
    let result = as5600_i2c::LinuxAs5600::open("/dev/i2c-does-not-exist");
    assert!(matches!(result, Err(Error::DeviceNotFound)));
}
