//! Scd41 operating state tracking
//!
//! Copyright 2019 Ryan Kurte

use crate::device::Command;

/// Sensor operating state as tracked by the driver
/// The device resets to its own default on power-up, so this is never persisted
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum State {
    /// No transport bound, or the device has not yet been woken
    Uninitialized,
    /// Powered down
    Asleep,
    /// Awake and accepting configuration commands
    Idle,
    /// Periodic (or low power periodic) measurement running
    PeriodicMeasuring,
    /// Single shot measurement issued and settle delay elapsed
    SingleShotPending,
}

/// Handling of commands issued from a state that does not permit them
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum StatePolicy {
    /// Reject with `Error::InvalidState` without touching the bus
    Strict,
    /// Log a warning and issue the command anyway
    Lenient,
}

impl Default for StatePolicy {
    fn default() -> Self {
        StatePolicy::Strict
    }
}

impl State {
    /// Device side idle, ready for configuration commands
    /// A completed single shot leaves the sensor idle
    pub fn is_idle(self) -> bool {
        matches!(self, State::Idle | State::SingleShotPending)
    }

    /// Whether `command` may be issued from this state
    pub fn permits(self, command: Command) -> bool {
        use Command::*;

        match command {
            WakeUp => true,
            PowerDown => self.is_idle() || self == State::PeriodicMeasuring,
            StopPeriodicMeasurement => self.is_idle() || self == State::PeriodicMeasuring,
            ReadMeasurement | GetDataReadyStatus => {
                matches!(self, State::PeriodicMeasuring | State::SingleShotPending)
            },
            SetAmbientPressure => self.is_idle() || self == State::PeriodicMeasuring,
            GetSerialNumber => self.is_idle() || self == State::Asleep,
            StartPeriodicMeasurement
            | StartLowPowerMeasurement
            | MeasureSingleShot
            | MeasureSingleShotRhtOnly
            | Reinit
            | PerformSelfTest
            | PerformFactoryReset
            | PerformForcedRecalibration
            | SetTemperatureOffset
            | GetTemperatureOffset
            | SetSensorAltitude
            | GetSensorAltitude
            | SetAutomaticCalibration
            | GetAutomaticCalibration
            | PersistSettings => self.is_idle(),
        }
    }

    /// State following successful completion of `command`
    pub fn after(self, command: Command) -> State {
        use Command::*;

        match command {
            WakeUp | StopPeriodicMeasurement | Reinit | PerformFactoryReset => State::Idle,
            PowerDown => State::Asleep,
            StartPeriodicMeasurement | StartLowPowerMeasurement => State::PeriodicMeasuring,
            MeasureSingleShot | MeasureSingleShotRhtOnly => State::SingleShotPending,
            _ => self,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wakeup_from_any() {
        for s in [State::Uninitialized, State::Asleep, State::Idle, State::PeriodicMeasuring, State::SingleShotPending] {
            assert!(s.permits(Command::WakeUp));
            assert_eq!(s.after(Command::WakeUp), State::Idle);
        }
    }

    #[test]
    fn test_periodic_cycle() {
        let s = State::Idle;
        assert!(s.permits(Command::StartPeriodicMeasurement));

        let s = s.after(Command::StartPeriodicMeasurement);
        assert_eq!(s, State::PeriodicMeasuring);
        assert!(s.permits(Command::ReadMeasurement));
        assert!(s.permits(Command::GetDataReadyStatus));
        assert!(s.permits(Command::SetAmbientPressure));
        assert!(!s.permits(Command::PerformSelfTest));
        assert!(!s.permits(Command::StartPeriodicMeasurement));
        assert_eq!(s.after(Command::ReadMeasurement), State::PeriodicMeasuring);

        assert_eq!(s.after(Command::StopPeriodicMeasurement), State::Idle);
    }

    #[test]
    fn test_read_requires_measurement() {
        assert!(!State::Idle.permits(Command::ReadMeasurement));
        assert!(!State::Asleep.permits(Command::GetDataReadyStatus));
        assert!(!State::Uninitialized.permits(Command::ReadMeasurement));
    }

    #[test]
    fn test_single_shot() {
        let s = State::Idle.after(Command::MeasureSingleShot);
        assert_eq!(s, State::SingleShotPending);
        assert!(s.permits(Command::ReadMeasurement));
        assert_eq!(s.after(Command::ReadMeasurement), State::SingleShotPending);

        // Completed single shot leaves the sensor idle
        assert!(s.permits(Command::MeasureSingleShot));
        assert!(s.permits(Command::PowerDown));
    }

    #[test]
    fn test_asleep() {
        let s = State::Idle.after(Command::PowerDown);
        assert_eq!(s, State::Asleep);
        assert!(s.permits(Command::GetSerialNumber));
        assert!(!s.permits(Command::PowerDown));
        assert!(!s.permits(Command::StartPeriodicMeasurement));
        assert!(!s.permits(Command::StopPeriodicMeasurement));
    }
}
