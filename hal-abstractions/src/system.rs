//! Status indicators, watchdog and power

/// What the status LEDs should be showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// Booting, nothing known yet
    Starting,
    /// Everything nominal
    Ready,
    /// Taking readings or servicing a client
    Busy,
    /// Degraded but running (low battery, missing sensor)
    Caution,
    /// Unrecoverable boot failure, device halted
    Fatal,
}

/// Status LEDs
///
/// There may be no console attached, so boot failures surface here.
pub trait StatusLeds {
    /// Display `status` until told otherwise
    fn show(&mut self, status: Status);
}

/// Supervisory watchdog
///
/// Hardware configuration is the board's business. The core only starts it
/// once and feeds it every main-loop pass.
pub trait Watchdog {
    /// Arm the watchdog
    fn started(&mut self);

    /// Reset the countdown
    fn feed(&mut self);
}

/// One battery fuel-gauge sample
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryReading {
    /// Cell voltage in millivolts
    pub voltage_mv: f32,
    /// State of charge, 0-100
    pub percentage: f32,
}

/// Battery fuel gauge
pub trait FuelGauge {
    /// Gauge error
    type Error: core::fmt::Debug;

    /// Sample the gauge
    fn read(&mut self) -> Result<BatteryReading, Self::Error>;
}
