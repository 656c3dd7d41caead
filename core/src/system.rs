//! Housekeeping tasks stepped on every pass: status LEDs and battery
//! monitoring. Neither ever finishes.

use hal_abstractions::{FuelGauge, Status, StatusLeds};

use crate::services::{Platform, Services};
use crate::task::{Task, TaskEval};

/// Reflects device status on the LEDs
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusLights {
    shown: Option<Status>,
}

impl StatusLights {
    /// Nothing shown yet
    pub const fn new() -> Self {
        Self { shown: None }
    }

    /// Status currently on the LEDs
    pub fn shown(&self) -> Option<Status> {
        self.shown
    }

    /// Show `status` unless it is already showing
    pub fn show<P: Platform>(&mut self, status: Status, cx: &mut Services<P>) {
        if self.shown != Some(status) {
            cx.leds.show(status);
            self.shown = Some(status);
        }
    }
}

impl<P: Platform> Task<Services<P>> for StatusLights {
    fn name(&self) -> &'static str {
        "StatusLights"
    }

    fn step(&mut self, cx: &mut Services<P>) -> TaskEval {
        let low_battery = cx
            .state
            .battery()
            .is_some_and(|battery| battery.percentage < cx.config.low_battery_percent);

        let status = if low_battery {
            Status::Caution
        } else if cx.busy {
            Status::Busy
        } else {
            Status::Ready
        };
        self.show(status, cx);
        TaskEval::running()
    }
}

/// Samples the fuel gauge every `power_interval_ms`
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerMonitor;

impl<P: Platform> Task<Services<P>> for PowerMonitor {
    fn name(&self) -> &'static str {
        "Power"
    }

    fn step(&mut self, cx: &mut Services<P>) -> TaskEval {
        match cx.gauge.read() {
            Ok(battery) => {
                debug!("Battery: {}mV {}%", battery.voltage_mv, battery.percentage);
                if battery.percentage < cx.config.low_battery_percent {
                    warn!("Battery low: {}%", battery.percentage);
                }
                cx.state.set_battery(battery);
            }
            Err(_) => warn!("Fuel gauge read failed"),
        }
        TaskEval::retry_in(cx.config.power_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskCell;
    use crate::testing;
    use hal_abstractions::BatteryReading;

    #[test]
    fn test_status_follows_busy_and_battery() {
        let mut cx = testing::services();
        let mut lights = StatusLights::new();

        Task::step(&mut lights, &mut cx);
        cx.busy = true;
        Task::step(&mut lights, &mut cx);
        Task::step(&mut lights, &mut cx);
        cx.state.set_battery(BatteryReading {
            voltage_mv: 3300.0,
            percentage: 5.0,
        });
        Task::step(&mut lights, &mut cx);

        // Unchanged status is not re-sent
        assert_eq!(cx.leds.shown, [Status::Ready, Status::Busy, Status::Caution]);
        assert_eq!(lights.shown(), Some(Status::Caution));
    }

    #[test]
    fn test_power_samples_on_interval() {
        let mut cx = testing::services();
        cx.gauge.percentage = 80.0;
        let mut cell = TaskCell::new(PowerMonitor);
        cell.begin(&mut cx);

        assert!(cell.poll(0, &mut cx).is_some());
        assert_eq!(cx.state.battery().map(|b| b.percentage), Some(80.0));
        assert_eq!(cx.gauge.reads, 1);

        assert!(cell.poll(cx.config.power_interval_ms - 1, &mut cx).is_none());
        assert!(cell.poll(cx.config.power_interval_ms, &mut cx).is_some());
        assert_eq!(cx.gauge.reads, 2);
    }

    #[test]
    fn test_gauge_failure_keeps_last_sample() {
        let mut cx = testing::services();
        cx.gauge.percentage = 50.0;
        Task::step(&mut PowerMonitor, &mut cx);
        cx.gauge.fail = true;
        assert!(Task::step(&mut PowerMonitor, &mut cx).is_running());
        assert_eq!(cx.state.battery().map(|b| b.percentage), Some(50.0));
    }
}
