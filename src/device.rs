//! Scd41 device definitions
//!
//! Copyright 2019 Ryan Kurte

/// Scd41 default I2C address
/// (note this is shifted left 1 bit on the wire)
pub const DEFAULT_ADDRESS: u8 = 0x62;

pub const CRC_POLY: u8 = 0x31;
pub const CRC_INIT: u8 = 0xff;
pub const CRC_XOR: u8 = 0x00;

/// Length of a data word with trailing CRC on the wire
pub const WORD_LEN: usize = 3;

/// Data ready status bits, any set bit indicates a fresh sample
pub const DATA_READY_MASK: u16 = 0x07FF;

/// Forced recalibration response when the calibration could not be performed
pub const FRC_FAILED: u16 = 0xFFFF;

/// Offset applied to the forced recalibration correction word
pub const FRC_OFFSET: u16 = 0x8000;

/// Scd41 I2C Command
/// Commands are big endian 16-bit unsigned integers, any associated data word is followed by a CRC-8 checksum
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[repr(u16)]
pub enum Command {
    /// Start periodic measurement, signal update interval is 5 seconds
    StartPeriodicMeasurement = 0x21B1,

    /// Read a measurement from the buffer
    /// Returns CO2, temperature and humidity words
    ReadMeasurement = 0xEC05,

    /// Stop periodic measurement
    /// The sensor only responds to other commands 500ms after this
    StopPeriodicMeasurement = 0x3F86,

    /// Set temperature offset
    /// Data is a u16 in degrees celsius * 65536 / 175
    SetTemperatureOffset = 0x241D,

    GetTemperatureOffset = 0x2318,

    /// Set sensor altitude
    /// Data is a u16 in meters above sea level
    SetSensorAltitude = 0x2427,

    GetSensorAltitude = 0x2322,

    /// Set ambient pressure, may be issued during periodic measurement
    /// Data is a u16 in Pa / 100
    SetAmbientPressure = 0xE000,

    /// Perform forced recalibration (FRC)
    /// Data is the reference CO2 concentration in ppm, returns the correction
    PerformForcedRecalibration = 0x362F,

    /// Enable or Disable Automatic Self Calibration (ASC)
    /// Data is a u16, 1 enables ASC and 0 disables ASC
    SetAutomaticCalibration = 0x2416,

    GetAutomaticCalibration = 0x2313,

    /// Start low power periodic measurement, signal update interval is approximately 30 seconds
    StartLowPowerMeasurement = 0x21AC,

    /// Fetch data ready status
    GetDataReadyStatus = 0xE4B8,

    /// Persist settings to EEPROM
    PersistSettings = 0x3615,

    /// Read the 48-bit serial number as three words
    GetSerialNumber = 0x3682,

    /// Perform self test, a zero response indicates no malfunction
    PerformSelfTest = 0x3639,

    /// Reset all configuration to factory defaults
    PerformFactoryReset = 0x3632,

    /// Reload user settings from EEPROM
    Reinit = 0x3646,

    /// On-demand measurement of CO2, temperature and humidity
    MeasureSingleShot = 0x219D,

    /// On-demand measurement of temperature and humidity only
    MeasureSingleShotRhtOnly = 0x2196,

    /// Put the sensor from idle to sleep
    PowerDown = 0x36E0,

    /// Wake the sensor from sleep into idle
    /// Note the sensor does not acknowledge this command
    WakeUp = 0x36F6,
}

impl Command {
    /// 16-bit opcode for the command
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Number of CRC protected words the device returns for this command
    pub fn response_words(self) -> usize {
        use Command::*;

        match self {
            ReadMeasurement | GetSerialNumber => 3,
            GetTemperatureOffset
            | GetSensorAltitude
            | GetAutomaticCalibration
            | GetDataReadyStatus
            | PerformSelfTest
            | PerformForcedRecalibration => 1,
            _ => 0,
        }
    }

    /// Minimum time in milliseconds before the bus may be used again
    pub fn delay_ms(self) -> u32 {
        use Command::*;

        match self {
            WakeUp => 20,
            StopPeriodicMeasurement => 500,
            MeasureSingleShot => 5000,
            MeasureSingleShotRhtOnly => 50,
            Reinit => 20,
            PerformSelfTest => 10_000,
            PerformFactoryReset => 1200,
            PerformForcedRecalibration => 400,
            PersistSettings => 800,
            SetTemperatureOffset
            | GetTemperatureOffset
            | SetSensorAltitude
            | GetSensorAltitude
            | SetAmbientPressure
            | SetAutomaticCalibration
            | GetAutomaticCalibration => 1,
            StartPeriodicMeasurement
            | StartLowPowerMeasurement
            | ReadMeasurement
            | GetDataReadyStatus
            | GetSerialNumber
            | PowerDown => 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_opcodes() {
        assert_eq!(Command::StartPeriodicMeasurement.code(), 0x21B1);
        assert_eq!(Command::ReadMeasurement.code(), 0xEC05);
        assert_eq!(Command::GetDataReadyStatus.code(), 0xE4B8);
        assert_eq!(Command::WakeUp.code(), 0x36F6);
        assert_eq!(Command::PowerDown.code(), 0x36E0);
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(Command::ReadMeasurement.response_words(), 3);
        assert_eq!(Command::GetSerialNumber.response_words(), 3);
        assert_eq!(Command::GetDataReadyStatus.response_words(), 1);
        assert_eq!(Command::PerformSelfTest.response_words(), 1);
        assert_eq!(Command::StartPeriodicMeasurement.response_words(), 0);
    }

    #[test]
    fn test_delays() {
        assert_eq!(Command::WakeUp.delay_ms(), 20);
        assert_eq!(Command::StopPeriodicMeasurement.delay_ms(), 500);
        assert_eq!(Command::MeasureSingleShot.delay_ms(), 5000);
        assert_eq!(Command::PerformSelfTest.delay_ms(), 10_000);
        assert_eq!(Command::PerformFactoryReset.delay_ms(), 1200);
        assert_eq!(Command::ReadMeasurement.delay_ms(), 0);
    }
}
