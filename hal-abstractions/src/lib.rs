//! Hardware abstraction traits for the naturalist firmware
//!
//! This crate defines traits that abstract over hardware differences
//! between boards. BSPs implement these traits; `naturalist-core` consumes
//! them without knowing which chips sit behind them.
//!
//! Everything here is an interface boundary. Register protocols, pin
//! assignments and wire formats live in the board crates.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod sensors;
pub mod storage;
pub mod system;
pub mod time;
pub mod wireless;

pub use sensors::{
    Absent, AmplitudeAnalyzer, Barometer, BarometricReading, Calibration, Hygrometer,
    HygrometerReading, Inertial, LightSensor, Luminosity, NotFitted, Orientation,
};
pub use storage::{SensorReading, Storage};
pub use system::{BatteryReading, FuelGauge, Status, StatusLeds, Watchdog};
pub use time::{Clock, WallClock};
pub use wireless::{LinkStatus, NetworkInfo, Wireless};
