//! Hardware self-check
//!
//! Brings up every fitted part once, outside the runtime, and reports which
//! ones answered. Meant for bench builds: the board runs it instead of the
//! main loop and parks with the result on the status LED.

use hal_abstractions::{
    AmplitudeAnalyzer, Barometer, FuelGauge, Hygrometer, Inertial, LightSensor, Status,
    StatusLeds, Storage,
};

use crate::acquisition::Sensors;
use crate::services::{Platform, Services};

/// Gauge reads before giving up on a plausible voltage
const GAUGE_ATTEMPTS: u32 = 10;

/// Below this the gauge is not really measuring a cell
const MIN_BATTERY_MV: f32 = 2500.0;

/// Parts a board has fitted. Anything not fitted is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fitted {
    /// Temperature and humidity
    pub hygrometer: bool,
    /// Pressure and altitude
    pub barometer: bool,
    /// Light sensor
    pub light: bool,
    /// IMU
    pub inertial: bool,
    /// Microphone
    pub audio: bool,
    /// Battery fuel gauge
    pub gauge: bool,
}

impl Fitted {
    /// A fully populated board
    pub const ALL: Self = Self {
        hygrometer: true,
        barometer: true,
        light: true,
        inertial: true,
        audio: true,
        gauge: true,
    };
}

/// Result for one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Began, and read back if it has something to read
    Passed,
    /// Fitted but not answering
    Failed,
    /// Not fitted
    Skipped,
}

impl Outcome {
    fn of(fitted: bool, check: impl FnOnce() -> bool) -> Self {
        if !fitted {
            Self::Skipped
        } else if check() {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

/// Per-part results of one self-check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CheckReport {
    /// Began and read once
    pub hygrometer: Outcome,
    /// Began and read once
    pub barometer: Outcome,
    /// Began
    pub light: Outcome,
    /// Began
    pub inertial: Outcome,
    /// Began
    pub audio: Outcome,
    /// Reported a plausible cell voltage
    pub gauge: Outcome,
    /// Set up; always checked
    pub storage: Outcome,
}

impl CheckReport {
    fn outcomes(&self) -> [Outcome; 7] {
        [
            self.hygrometer,
            self.barometer,
            self.light,
            self.inertial,
            self.audio,
            self.gauge,
            self.storage,
        ]
    }

    /// Nothing fitted failed
    pub fn passed(&self) -> bool {
        !self.outcomes().contains(&Outcome::Failed)
    }
}

fn logged(part: &str, outcome: Outcome) -> Outcome {
    match outcome {
        Outcome::Passed => info!("{} PASSED", part),
        Outcome::Failed => warn!("{} FAILED", part),
        Outcome::Skipped => debug!("{} not fitted", part),
    }
    outcome
}

fn hygrometer(sensor: &mut impl Hygrometer) -> bool {
    if sensor.begin().is_err() {
        return false;
    }
    match sensor.read() {
        Ok(reading) => {
            info!("Hygrometer {}C {}%", reading.temperature_c, reading.humidity);
            true
        }
        Err(_) => false,
    }
}

fn barometer(sensor: &mut impl Barometer) -> bool {
    if sensor.begin().is_err() {
        return false;
    }
    match sensor.read() {
        Ok(reading) => {
            info!("Barometer {}pa", reading.pressure_pa);
            true
        }
        Err(_) => false,
    }
}

fn gauge(gauge: &mut impl FuelGauge) -> bool {
    for _ in 0..GAUGE_ATTEMPTS {
        match gauge.read() {
            Ok(reading) => {
                info!("Battery {}mv {}%", reading.voltage_mv, reading.percentage);
                if reading.voltage_mv > MIN_BATTERY_MV {
                    return true;
                }
            }
            Err(_) => return false,
        }
    }
    false
}

/// Begin every fitted part, read the ones that have something to read, and
/// show `Ready` or `Fatal` depending on the outcome.
pub fn check<P, H, B, L, I, A>(
    sensors: &mut Sensors<H, B, L, I, A>,
    fitted: Fitted,
    cx: &mut Services<P>,
) -> CheckReport
where
    P: Platform,
    H: Hygrometer,
    B: Barometer,
    L: LightSensor,
    I: Inertial,
    A: AmplitudeAnalyzer,
{
    info!("Self-check...");
    let report = CheckReport {
        hygrometer: logged(
            "Hygrometer",
            Outcome::of(fitted.hygrometer, || hygrometer(&mut sensors.hygrometer)),
        ),
        barometer: logged(
            "Barometer",
            Outcome::of(fitted.barometer, || barometer(&mut sensors.barometer)),
        ),
        light: logged(
            "Light",
            Outcome::of(fitted.light, || sensors.light.begin().is_ok()),
        ),
        inertial: logged(
            "Inertial",
            Outcome::of(fitted.inertial, || sensors.inertial.begin().is_ok()),
        ),
        audio: logged(
            "Audio",
            Outcome::of(fitted.audio, || sensors.audio.begin().is_ok()),
        ),
        gauge: logged("Gauge", Outcome::of(fitted.gauge, || gauge(&mut cx.gauge))),
        storage: logged("Storage", Outcome::of(true, || cx.storage.setup().is_ok())),
    };

    if report.passed() {
        info!("Self-check PASSED");
        cx.leds.show(Status::Ready);
    } else {
        error!("Self-check FAILED");
        cx.leds.show(Status::Fatal);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, ScriptedSensors};

    #[test]
    fn test_healthy_board_passes() {
        let mut cx = testing::services();
        let mut sensors = ScriptedSensors::all_fitted();

        let report = check(&mut sensors, Fitted::ALL, &mut cx);
        assert!(report.passed());
        assert_eq!(report.hygrometer, Outcome::Passed);
        assert_eq!(report.storage, Outcome::Passed);
        assert_eq!(sensors.hygrometer.reads, 1);
        assert_eq!(cx.leds.shown, [Status::Ready]);
    }

    #[test]
    fn test_one_failing_sensor_fails_the_check() {
        let mut cx = testing::services();
        let mut sensors = ScriptedSensors::all_fitted();
        sensors.barometer.fail_begin = true;

        let report = check(&mut sensors, Fitted::ALL, &mut cx);
        assert!(!report.passed());
        assert_eq!(report.barometer, Outcome::Failed);
        assert_eq!(report.hygrometer, Outcome::Passed);
        assert_eq!(report.light, Outcome::Passed);
        assert_eq!(cx.leds.shown, [Status::Fatal]);
    }

    #[test]
    fn test_unfitted_parts_are_skipped() {
        let mut cx = testing::services();
        cx.gauge.fail = true;
        let mut sensors = ScriptedSensors::all_fitted();
        sensors.inertial.fail_begin = true;

        let fitted = Fitted {
            inertial: false,
            gauge: false,
            ..Fitted::ALL
        };
        let report = check(&mut sensors, fitted, &mut cx);
        assert!(report.passed());
        assert_eq!(report.inertial, Outcome::Skipped);
        assert_eq!(report.gauge, Outcome::Skipped);
        assert_eq!(cx.gauge.reads, 0);
    }

    #[test]
    fn test_storage_failure_fails_the_check() {
        let mut cx = testing::services();
        cx.storage.fail_setup = true;
        let mut sensors = ScriptedSensors::all_fitted();

        let report = check(&mut sensors, Fitted::ALL, &mut cx);
        assert_eq!(report.storage, Outcome::Failed);
        assert!(!report.passed());
    }
}
