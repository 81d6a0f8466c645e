//! Scd41 command-line utility
//!
//! Copyright 2019 Ryan Kurte

extern crate embedded_hal;
extern crate linux_embedded_hal;
use linux_embedded_hal::{Delay, I2cdev};

extern crate structopt;
use structopt::StructOpt;

extern crate humantime;
use humantime::{Duration as HumanDuration};

#[macro_use] extern crate log;
extern crate simplelog;
use simplelog::{TermLogger, LevelFilter};

extern crate sensor_scd41;
use sensor_scd41::{Config, Scd41, StatePolicy};

#[derive(StructOpt)]
#[structopt(name = "scd41-util")]
/// A Command Line Interface (CLI) for interacting with a local Scd41 CO2 sensor over I2C
pub struct Options {

    /// Specify the i2c interface to use to connect to the scd41 device
    #[structopt(short="d", long = "i2c", default_value = "/dev/i2c-1", env = "SCD41_I2C")]
    i2c: String,

    /// Measurement mode (periodic, low-power, single-shot)
    #[structopt(short = "m", long = "mode", default_value="periodic")]
    pub mode: Mode,

    /// Delay between samples in single-shot mode
    #[structopt(short = "p", long = "sample-period", default_value="30s")]
    pub period: HumanDuration,

    /// Delay between sensor poll operations
    #[structopt(long = "poll-delay", default_value="500ms")]
    pub poll_delay: HumanDuration,

    /// Number of allowed I2C errors (per measurement attempt) prior to exiting
    #[structopt(long = "allowed-errors", default_value="3")]
    pub allowed_errors: usize,

    /// Run the sensor self test during initialisation
    #[structopt(long = "self-test")]
    pub self_test: bool,

    /// Issue commands even when the tracked sensor state does not permit them
    #[structopt(long = "lenient")]
    pub lenient: bool,

    /// Timeout for I2C reads
    #[structopt(long = "timeout", default_value="1s")]
    pub timeout: HumanDuration,

    /// Enable verbose logging
    #[structopt(long = "log-level", default_value = "info")]
    level: LevelFilter,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    Periodic,
    LowPower,
    SingleShot,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "periodic" => Ok(Mode::Periodic),
            "low-power" => Ok(Mode::LowPower),
            "single-shot" => Ok(Mode::SingleShot),
            _ => Err(format!("unrecognised mode '{}'", s)),
        }
    }
}

fn main() {
    // Load options
    let opts = Options::from_args();

    // Setup logging
    TermLogger::init(opts.level, simplelog::Config::default()).unwrap();

    debug!("Connecting to I2C device");
    let i2c = match I2cdev::new(&opts.i2c) {
        Ok(v) => v,
        Err(e) => {
            error!("Error opening I2C device '{}': {:?}", &opts.i2c, e);
            std::process::exit(-1);
        }
    };

    let config = Config {
        timeout_ms: opts.timeout.as_millis() as u32,
        policy: match opts.lenient {
            true => StatePolicy::Lenient,
            false => StatePolicy::Strict,
        },
        ..Config::default()
    };

    debug!("Connecting to SCD41");
    let mut sensor = Scd41::new(Delay, config);
    if let Err(e) = sensor.initialize(i2c, opts.self_test) {
        error!("Error connecting to SCD41: {:?}", e);
        std::process::exit(-2);
    }

    debug!("Starting sensor measurement ({:?})", opts.mode);
    let started = match opts.mode {
        Mode::Periodic => sensor.start_periodic_measure(),
        Mode::LowPower => sensor.start_low_power_periodic_measure(),
        Mode::SingleShot => Ok(()),
    };
    if let Err(e) = started {
        error!("Error starting measurement: {:?}", e);
        std::process::exit(-3);
    }

    loop {
        debug!("Starting sensor read cycle");

        let mut ready = false;
        let mut errors = 0;

        if opts.mode == Mode::SingleShot {
            // Blocks until the sample is available
            if let Err(e) = sensor.measure_single_shot() {
                warn!("Error triggering single shot measurement: {:?}", e);
                errors += 1;
            }
        }

        // Poll for sensor ready
        for _i in 0..100 {
            match sensor.is_measurement_data_ready() {
                Ok(true) => {
                    ready = true;
                    break;
                },
                Ok(false) => {
                    std::thread::sleep(*opts.poll_delay);
                },
                Err(e) => {
                    warn!("Error polling for sensor ready: {:?}", e);
                    errors += 1;
                }
            };

            if errors > opts.allowed_errors {
                error!("Exceeded maximum allowed I2C errors");
                std::process::exit(-4);
            }
        }

        debug!("Sensor data ready state: {:?}", ready);

        if !ready {
            warn!("Sensor data ready timed-out");
            continue;
        }

        // If we're ready, attempt to read the data
        for _i in 0..10 {
            match sensor.read_measurement() {
                Ok(m) => {
                    info!("CO2: {} ppm, Temperature: {:.2} C, Humidity: {:.2} %", m.co2, m.temp, m.rh);
                    break;
                },
                Err(e) => {
                    warn!("Error reading sensor data: {:?}", e);
                    errors += 1;
                },
            }

            if errors > opts.allowed_errors {
                error!("Exceeded maximum allowed I2C errors");
                std::process::exit(-5);
            }
        }

        if opts.mode == Mode::SingleShot {
            std::thread::sleep(*opts.period);
        }
    }
}
