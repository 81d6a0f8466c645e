//! Scd41 CO2 / temperature / humidity sensor driver
//!
//! Copyright 2019 Ryan Kurte

#[macro_use]
extern crate log;

extern crate embedded_hal;

use core::fmt::Debug;
use core::marker::PhantomData;

use embedded_hal::blocking::delay::DelayMs;

pub mod base;
pub mod convert;
pub mod device;
pub mod state;

use base::{decode_words, Base, FrameError, Transport};
pub use device::{Command, DEFAULT_ADDRESS};
pub use state::{State, StatePolicy};
use device::*;

/// Default timeout applied to every bus read
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Scd41 error object
#[derive(Debug, PartialEq)]
pub enum Error<ConnErr> {
    /// No transport bound, see [`Scd41::initialize`]
    NotInitialized,
    /// Underlying transport error
    Conn(ConnErr),
    /// CRC mismatch on response word `index`
    Crc { index: usize, expected: u8, actual: u8 },
    /// Response buffer did not match the expected frame shape
    FrameLength { expected: usize, actual: usize },
    /// Self test reported a malfunction, contains the raw status word
    Malfunction(u16),
    /// Command is not permitted from the current state
    InvalidState { state: State, command: Command },
    /// Forced recalibration could not be performed
    RecalibrationFailed,
}

impl <ConnErr> From<FrameError> for Error<ConnErr> {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Length{ expected, actual } => Error::FrameLength{ expected, actual },
            FrameError::Crc{ index, expected, actual } => Error::Crc{ index, expected, actual },
        }
    }
}

/// Scd41 measurement object
#[derive(PartialEq, Clone, Debug)]
pub struct Measurement {
    /// CO2 concentration in parts-per-million (PPM)
    /// Range: 0 - 40,000, zero for temperature / humidity only samples
    pub co2: u16,
    /// Temperature in degrees celsius
    /// Range: -10 - 60 C
    pub temp: f32,
    /// Relative Humidity (%)
    /// Range: 0 - 100
    pub rh: f32,
}

impl Measurement {
    /// Build a measurement from raw CO2, temperature and humidity words
    pub fn from_words(words: [u16; 3]) -> Self {
        Measurement {
            co2: convert::co2_ppm(words[0]),
            temp: convert::temperature_c(words[1]),
            rh: convert::humidity_pct(words[2]),
        }
    }
}

/// Driver configuration
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Device I2C address
    pub address: u8,
    /// Timeout passed to the transport for every read
    pub timeout_ms: u32,
    /// Handling of commands that the current state does not permit
    pub policy: StatePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: DEFAULT_ADDRESS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            policy: StatePolicy::default(),
        }
    }
}

/// Scd41 sensor object
/// This is generic over an I2C connector, a delay provider and the connector error type.
///
/// The connector is only held between [`Scd41::initialize`] and [`Scd41::release`].
/// All operations block (including mandated settle delays) and take `&mut self`,
/// callers sharing an instance between threads must wrap it in a mutex.
pub struct Scd41<Conn, Delay, Err> {
    conn: Option<Conn>,
    delay: Delay,
    config: Config,
    state: State,
    serial: Option<u64>,
    _err: PhantomData<Err>,
}

impl <Conn, Delay, Err> Scd41<Conn, Delay, Err> where
    Conn: Transport<Err>,
    Delay: DelayMs<u32>,
    Err: Debug,
{
    /// Create a new, unbound, Scd41 sensor instance
    pub fn new(delay: Delay, config: Config) -> Self {
        Scd41 {
            conn: None,
            delay,
            config,
            state: State::Uninitialized,
            serial: None,
            _err: PhantomData,
        }
    }

    /// Bind a connector and bring the sensor into a known idle state
    ///
    /// This wakes the sensor, stops any periodic measurement left running, reads the serial
    /// number and optionally runs the (10s) self test. Returns the serial number.
    ///
    /// Any connector already bound is dropped, call [`Scd41::release`] first to recover it.
    pub fn initialize(&mut self, conn: Conn, run_self_test: bool) -> Result<u64, Error<Err>> {
        if self.conn.replace(conn).is_some() {
            warn!("Dropping previously bound connector");
        }
        self.state = State::Uninitialized;
        self.serial = None;

        // The sensor does not acknowledge wake up, so a NACK here is expected
        match self.wakeup() {
            Ok(()) => (),
            Err(Error::Conn(e)) => {
                debug!("Wake up not acknowledged: {:?}", e);
                self.settle(Command::WakeUp);
                self.transition(Command::WakeUp);
            },
            Err(e) => return Err(e),
        }

        self.stop_periodic_measure()?;

        let serial = self.read_serial_number()?;
        info!("Serial number: 0x{:012X}", serial);

        if run_self_test {
            self.perform_self_test()?;
        }

        info!("Initialized");

        Ok(serial)
    }

    /// Release the bound connector, returning it to the caller
    pub fn release(&mut self) -> Option<Conn> {
        self.state = State::Uninitialized;
        self.conn.take()
    }

    /// Current tracked sensor state
    pub fn state(&self) -> State {
        self.state
    }

    /// Serial number read during initialisation (or the last explicit read)
    pub fn serial(&self) -> Option<u64> {
        self.serial
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a connector is currently bound
    pub fn is_bound(&self) -> bool {
        self.conn.is_some()
    }

    /// Wake the sensor from sleep into idle
    pub fn wakeup(&mut self) -> Result<(), Error<Err>> {
        self.command(Command::WakeUp, None)
    }

    /// Power down the sensor
    pub fn sleep(&mut self) -> Result<(), Error<Err>> {
        self.command(Command::PowerDown, None)
    }

    /// Reload user settings from EEPROM
    /// Periodic measurement is stopped first as the sensor ignores reinit while measuring
    pub fn reinit(&mut self) -> Result<(), Error<Err>> {
        self.stop_periodic_measure()?;
        self.command(Command::Reinit, None)
    }

    /// Run the sensor self test, this blocks for 10 seconds
    pub fn perform_self_test(&mut self) -> Result<(), Error<Err>> {
        let [status] = self.fetch::<1>(Command::PerformSelfTest, None)?;

        // Malfunction is signalled in the first response byte
        if status >> 8 != 0 {
            return Err(Error::Malfunction(status));
        }

        info!("Passed self test (no malfunction detected)");

        Ok(())
    }

    /// Reset all configuration and calibration to factory defaults
    pub fn perform_factory_reset(&mut self) -> Result<(), Error<Err>> {
        self.command(Command::PerformFactoryReset, None)
    }

    /// Start periodic measurement with a 5 second update interval
    pub fn start_periodic_measure(&mut self) -> Result<(), Error<Err>> {
        self.command(Command::StartPeriodicMeasurement, None)
    }

    /// Start low power periodic measurement with a ~30 second update interval
    pub fn start_low_power_periodic_measure(&mut self) -> Result<(), Error<Err>> {
        self.command(Command::StartLowPowerMeasurement, None)
    }

    /// Stop periodic measurement
    /// This is safe to issue when already idle
    pub fn stop_periodic_measure(&mut self) -> Result<(), Error<Err>> {
        self.command(Command::StopPeriodicMeasurement, None)
    }

    /// Trigger a single shot measurement, blocking until the sample is available
    pub fn measure_single_shot(&mut self) -> Result<(), Error<Err>> {
        self.command(Command::MeasureSingleShot, None)
    }

    /// Trigger a temperature / humidity only single shot, the CO2 value of the result reads zero
    pub fn measure_single_shot_rht_only(&mut self) -> Result<(), Error<Err>> {
        self.command(Command::MeasureSingleShotRhtOnly, None)
    }

    /// Read measurement data from the buffer
    pub fn read_measurement(&mut self) -> Result<Measurement, Error<Err>> {
        let words = self.read::<3>(Command::ReadMeasurement)?;

        Ok(Measurement::from_words(words))
    }

    /// Check whether measurement data is available in the buffer
    pub fn is_measurement_data_ready(&mut self) -> Result<bool, Error<Err>> {
        let [status] = self.read::<1>(Command::GetDataReadyStatus)?;

        Ok(status & DATA_READY_MASK != 0)
    }

    /// Read the 48-bit serial number
    pub fn read_serial_number(&mut self) -> Result<u64, Error<Err>> {
        let [w1, w2, w3] = self.read::<3>(Command::GetSerialNumber)?;

        let serial = (w1 as u64) << 32 | (w2 as u64) << 16 | (w3 as u64);
        self.serial = Some(serial);

        Ok(serial)
    }

    /// Set Temperature Offset in degrees celsius
    /// Allows compensation for self-heating in the enclosure
    pub fn set_temperature_offset(&mut self, offset: f32) -> Result<(), Error<Err>> {
        self.command(Command::SetTemperatureOffset, Some(convert::temperature_offset_word(offset)))
    }

    pub fn get_temperature_offset(&mut self) -> Result<f32, Error<Err>> {
        let [raw] = self.fetch::<1>(Command::GetTemperatureOffset, None)?;
        Ok(convert::temperature_offset_c(raw))
    }

    /// Set Altitude Compensation in meters above sea level
    pub fn set_sensor_altitude(&mut self, altitude: u16) -> Result<(), Error<Err>> {
        self.command(Command::SetSensorAltitude, Some(altitude))
    }

    pub fn get_sensor_altitude(&mut self) -> Result<u16, Error<Err>> {
        let [altitude] = self.fetch::<1>(Command::GetSensorAltitude, None)?;
        Ok(altitude)
    }

    /// Set ambient pressure compensation in Pa, overriding altitude compensation
    /// This may be issued during periodic measurement
    pub fn set_ambient_pressure(&mut self, pressure_pa: u32) -> Result<(), Error<Err>> {
        self.command(Command::SetAmbientPressure, Some(convert::pressure_word(pressure_pa)))
    }

    /// Enable or disable Automatic Self-Calibration
    pub fn set_automatic_self_calibration(&mut self, enabled: bool) -> Result<(), Error<Err>> {
        self.command(Command::SetAutomaticCalibration, Some(enabled as u16))
    }

    pub fn get_automatic_self_calibration(&mut self) -> Result<bool, Error<Err>> {
        let [enabled] = self.fetch::<1>(Command::GetAutomaticCalibration, None)?;
        Ok(enabled != 0)
    }

    /// Perform Forced Recalibration against a reference CO2 concentration
    /// Returns the applied correction in ppm
    pub fn perform_forced_recalibration(&mut self, target_ppm: u16) -> Result<i16, Error<Err>> {
        let [raw] = self.fetch::<1>(Command::PerformForcedRecalibration, Some(target_ppm))?;

        if raw == FRC_FAILED {
            return Err(Error::RecalibrationFailed);
        }

        Ok(raw.wrapping_sub(FRC_OFFSET) as i16)
    }

    fn conn(&mut self) -> Result<&mut Conn, Error<Err>> {
        self.conn.as_mut().ok_or(Error::NotInitialized)
    }

    /// Apply the state policy to a command
    fn check(&self, command: Command) -> Result<(), Error<Err>> {
        if self.state.permits(command) {
            return Ok(());
        }

        match self.config.policy {
            StatePolicy::Strict => Err(Error::InvalidState{ state: self.state, command }),
            StatePolicy::Lenient => {
                warn!("Issuing {:?} from state {:?}", command, self.state);
                Ok(())
            },
        }
    }

    fn settle(&mut self, command: Command) {
        let ms = command.delay_ms();
        if ms > 0 {
            self.delay.delay_ms(ms);
        }
    }

    fn transition(&mut self, command: Command) {
        let next = self.state.after(command);
        if next != self.state {
            debug!("State {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    /// Write a command with optional data and wait out its delay
    fn command(&mut self, command: Command, data: Option<u16>) -> Result<(), Error<Err>> {
        let address = self.config.address;

        self.conn()?;
        self.check(command)?;

        self.conn()?.write_command(address, command, data)?;
        self.settle(command);
        self.transition(command);

        Ok(())
    }

    /// Ensure the decoded frame size matches the command's response table
    fn check_shape<const N: usize>(command: Command) -> Result<(), Error<Err>> {
        let words = command.response_words();
        if words != N {
            return Err(Error::FrameLength{ expected: words * WORD_LEN, actual: N * WORD_LEN });
        }
        Ok(())
    }

    /// Write a command then read N words in one transaction
    fn read<const N: usize>(&mut self, command: Command) -> Result<[u16; N], Error<Err>> {
        Self::check_shape::<N>(command)?;

        let address = self.config.address;
        let timeout_ms = self.config.timeout_ms;

        self.conn()?;
        self.check(command)?;

        let mut buff = [0u8; 9];
        let buff = &mut buff[..N * WORD_LEN];

        self.conn()?.read_command(address, command, buff, timeout_ms)?;
        self.settle(command);

        let words = decode_words::<N>(buff)?;
        self.transition(command);

        Ok(words)
    }

    /// Write a command, wait for execution, then read N words
    fn fetch<const N: usize>(&mut self, command: Command, data: Option<u16>) -> Result<[u16; N], Error<Err>> {
        Self::check_shape::<N>(command)?;

        let address = self.config.address;
        let timeout_ms = self.config.timeout_ms;

        self.conn()?;
        self.check(command)?;

        self.conn()?.write_command(address, command, data)?;
        self.settle(command);

        let mut buff = [0u8; 9];
        let buff = &mut buff[..N * WORD_LEN];

        self.conn()?.read_response(address, buff, timeout_ms)?;

        let words = decode_words::<N>(buff)?;
        self.transition(command);

        Ok(words)
    }
}
