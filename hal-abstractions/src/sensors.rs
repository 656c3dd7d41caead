//! Sensor families
//!
//! One trait per kind of measurement rather than per chip. A board may fit
//! any subset; [`Absent`] stands in for the rest and fails `begin()`, which
//! the acquisition pipeline treats like any other missing sensor.

/// Temperature and relative humidity pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HygrometerReading {
    /// Degrees Celsius, NaN when the sensor returned garbage
    pub temperature_c: f32,
    /// Percent relative humidity
    pub humidity: f32,
}

/// Temperature and relative humidity sensor (SHT31 class)
pub trait Hygrometer {
    /// Sensor error
    type Error: core::fmt::Debug;

    /// Probe and configure the sensor
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Take one measurement
    fn read(&mut self) -> Result<HygrometerReading, Self::Error>;
}

/// Barometric measurement
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BarometricReading {
    /// Pascals
    pub pressure_pa: f32,
    /// Metres above sea level
    pub altitude_m: f32,
    /// Degrees Celsius
    pub temperature_c: f32,
}

/// Pressure/altitude sensor (MPL3115A2 class)
pub trait Barometer {
    /// Sensor error
    type Error: core::fmt::Debug;

    /// Probe and configure the sensor
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Take one measurement
    fn read(&mut self) -> Result<BarometricReading, Self::Error>;
}

/// Raw two-channel luminosity counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Luminosity {
    /// Full-spectrum channel (visible + infrared)
    pub full: u16,
    /// Infrared channel
    pub ir: u16,
}

impl Luminosity {
    /// Split the packed 32-bit form: ir in the top half, full in the bottom
    pub const fn from_packed(packed: u32) -> Self {
        Self {
            full: (packed & 0xFFFF) as u16,
            ir: (packed >> 16) as u16,
        }
    }

    /// Visible light, clamped at zero when ir exceeds full
    pub const fn visible(&self) -> u16 {
        self.full.saturating_sub(self.ir)
    }
}

/// Light sensor (TSL2591 class)
pub trait LightSensor {
    /// Sensor error
    type Error: core::fmt::Debug;

    /// Probe and configure the sensor
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Read both channels
    fn read(&mut self) -> Result<Luminosity, Self::Error>;

    /// Convert raw counts to lux with the chip's gain and integration time
    fn lux(&self, luminosity: Luminosity) -> f32;
}

/// Fusion calibration quality, each 0 (uncalibrated) to 3 (fully calibrated)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// Overall fusion system
    pub system: u8,
    /// Gyroscope
    pub gyro: u8,
    /// Accelerometer
    pub accel: u8,
    /// Magnetometer
    pub mag: u8,
}

/// Absolute orientation in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Orientation {
    /// Heading
    pub x: f32,
    /// Roll
    pub y: f32,
    /// Pitch
    pub z: f32,
}

/// Inertial measurement unit with on-chip fusion (BNO055 class)
pub trait Inertial {
    /// Sensor error
    type Error: core::fmt::Debug;

    /// Probe and configure the sensor
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Current calibration quality
    fn calibration(&mut self) -> Result<Calibration, Self::Error>;

    /// Current orientation
    fn orientation(&mut self) -> Result<Orientation, Self::Error>;
}

/// Audio amplitude analyzer fed by a microphone (SPH0645 over I²S)
pub trait AmplitudeAnalyzer {
    /// Analyzer error
    type Error: core::fmt::Debug;

    /// Start the analyzer
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Next RMS amplitude if one is ready. Never waits.
    fn sample(&mut self) -> Option<f32>;
}

/// Error returned by [`Absent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NotFitted;

/// Placeholder for a sensor the board does not carry
#[derive(Debug, Clone, Copy, Default)]
pub struct Absent;

impl Hygrometer for Absent {
    type Error = NotFitted;

    fn begin(&mut self) -> Result<(), NotFitted> {
        Err(NotFitted)
    }

    fn read(&mut self) -> Result<HygrometerReading, NotFitted> {
        Err(NotFitted)
    }
}

impl Barometer for Absent {
    type Error = NotFitted;

    fn begin(&mut self) -> Result<(), NotFitted> {
        Err(NotFitted)
    }

    fn read(&mut self) -> Result<BarometricReading, NotFitted> {
        Err(NotFitted)
    }
}

impl LightSensor for Absent {
    type Error = NotFitted;

    fn begin(&mut self) -> Result<(), NotFitted> {
        Err(NotFitted)
    }

    fn read(&mut self) -> Result<Luminosity, NotFitted> {
        Err(NotFitted)
    }

    fn lux(&self, _luminosity: Luminosity) -> f32 {
        0.0
    }
}

impl Inertial for Absent {
    type Error = NotFitted;

    fn begin(&mut self) -> Result<(), NotFitted> {
        Err(NotFitted)
    }

    fn calibration(&mut self) -> Result<Calibration, NotFitted> {
        Err(NotFitted)
    }

    fn orientation(&mut self) -> Result<Orientation, NotFitted> {
        Err(NotFitted)
    }
}

impl AmplitudeAnalyzer for Absent {
    type Error = NotFitted;

    fn begin(&mut self) -> Result<(), NotFitted> {
        Err(NotFitted)
    }

    fn sample(&mut self) -> Option<f32> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminosity_unpacking() {
        let lum = Luminosity::from_packed(0x0010_0040);
        assert_eq!(lum.ir, 0x10);
        assert_eq!(lum.full, 0x40);
        assert_eq!(lum.visible(), 0x30);
    }

    #[test]
    fn test_visible_clamps_at_zero() {
        let lum = Luminosity { full: 5, ir: 9 };
        assert_eq!(lum.visible(), 0);
    }

    #[test]
    fn test_absent_never_begins() {
        let mut absent = Absent;
        assert!(Hygrometer::begin(&mut absent).is_err());
        assert!(AmplitudeAnalyzer::sample(&mut absent).is_none());
    }
}
