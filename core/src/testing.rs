//! Host test doubles: a mock platform and scripted sensors

use core::task::Poll;

use hal_abstractions::{
    AmplitudeAnalyzer, Barometer, BarometricReading, BatteryReading, Calibration, Clock,
    FuelGauge, Hygrometer, HygrometerReading, Inertial, LightSensor, LinkStatus, Luminosity,
    NetworkInfo, Orientation, SensorReading, Status, StatusLeds, Storage, WallClock, Watchdog,
    Wireless,
};

use crate::acquisition::{NaturalistReadings, Sensors};
use crate::config::DeviceConfig;
use crate::services::{Platform, Services};
use crate::task::{Task, TaskEval};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

#[derive(Debug, Default)]
pub struct MockClock {
    pub uptime: u32,
    pub unix: u32,
}

impl Clock for MockClock {
    fn uptime_ms(&self) -> u32 {
        self.uptime
    }
}

impl WallClock for MockClock {
    fn unix_time(&self) -> u32 {
        self.unix
    }

    fn set_unix_time(&mut self, unix_secs: u32) {
        self.unix = unix_secs;
    }
}

#[derive(Debug, Default)]
pub struct MockLeds {
    pub shown: Vec<Status>,
}

impl StatusLeds for MockLeds {
    fn show(&mut self, status: Status) {
        self.shown.push(status);
    }
}

#[derive(Debug, Default)]
pub struct MockWatchdog {
    pub started: bool,
    pub feeds: u32,
}

impl Watchdog for MockWatchdog {
    fn started(&mut self) {
        self.started = true;
    }

    fn feed(&mut self) {
        self.feeds += 1;
    }
}

#[derive(Debug, Default)]
pub struct MockGauge {
    pub percentage: f32,
    pub reads: u32,
    pub fail: bool,
}

impl FuelGauge for MockGauge {
    type Error = MockError;

    fn read(&mut self) -> Result<BatteryReading, MockError> {
        self.reads += 1;
        if self.fail {
            return Err(MockError);
        }
        Ok(BatteryReading {
            voltage_mv: 3700.0,
            percentage: self.percentage,
        })
    }
}

#[derive(Debug, Default)]
pub struct MockStorage {
    pub fail_setup: bool,
    pub fail_append: bool,
    pub appended: Vec<(u8, SensorReading)>,
}

impl Storage for MockStorage {
    type Error = MockError;

    fn setup(&mut self) -> Result<(), MockError> {
        if self.fail_setup {
            Err(MockError)
        } else {
            Ok(())
        }
    }

    fn append(&mut self, module: u8, reading: &SensorReading) -> Result<(), MockError> {
        if self.fail_append {
            return Err(MockError);
        }
        self.appended.push((module, *reading));
        Ok(())
    }
}

/// Associates only with `reachable`; anything else stays `Connecting`
#[derive(Debug)]
pub struct MockRadio {
    pub reachable: Option<&'static str>,
    pub attempts: Vec<&'static str>,
    pub link: LinkStatus,
    pub clients: u32,
    pub session_polls: u32,
    pub uploads: u32,
    pub upload_bytes: u32,
    pub upload_stuck: bool,
    pub time_requests: u32,
    pub time: Option<u32>,
}

impl Default for MockRadio {
    fn default() -> Self {
        Self {
            reachable: None,
            attempts: Vec::new(),
            link: LinkStatus::Down,
            clients: 0,
            session_polls: 0,
            uploads: 0,
            upload_bytes: 512,
            upload_stuck: false,
            time_requests: 0,
            time: None,
        }
    }
}

impl Wireless for MockRadio {
    type Error = MockError;

    fn connect(&mut self, network: &NetworkInfo) -> Result<(), MockError> {
        self.attempts.push(network.ssid);
        self.link = if self.reachable == Some(network.ssid) {
            LinkStatus::Up
        } else {
            LinkStatus::Connecting
        };
        Ok(())
    }

    fn link(&mut self) -> LinkStatus {
        self.link
    }

    fn disconnect(&mut self) {
        self.link = LinkStatus::Down;
    }

    fn accept(&mut self) -> bool {
        if self.clients > 0 {
            self.clients -= 1;
            true
        } else {
            false
        }
    }

    fn serve(&mut self) -> Poll<Result<(), MockError>> {
        if self.session_polls > 0 {
            self.session_polls -= 1;
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn begin_upload(&mut self) -> Result<(), MockError> {
        self.uploads += 1;
        Ok(())
    }

    fn poll_upload(&mut self) -> Poll<Result<u32, MockError>> {
        if self.upload_stuck {
            return Poll::Pending;
        }
        Poll::Ready(Ok(self.upload_bytes))
    }

    fn request_time(&mut self) -> Result<(), MockError> {
        self.time_requests += 1;
        Ok(())
    }

    fn poll_time(&mut self) -> Poll<Result<u32, MockError>> {
        match self.time {
            Some(unix_secs) => Poll::Ready(Ok(unix_secs)),
            None => Poll::Pending,
        }
    }
}

pub struct MockPlatform;

impl Platform for MockPlatform {
    type Clock = MockClock;
    type Leds = MockLeds;
    type Watchdog = MockWatchdog;
    type Gauge = MockGauge;
    type Storage = MockStorage;
    type Radio = MockRadio;
}

pub type MockServices = Services<MockPlatform>;

/// Services with no networks configured
pub fn services() -> MockServices {
    let config = DeviceConfig {
        networks: &[],
        ..DeviceConfig::default()
    };
    Services::new(
        config,
        MockClock::default(),
        MockLeds::default(),
        MockWatchdog::default(),
        MockGauge {
            percentage: 100.0,
            ..MockGauge::default()
        },
        MockStorage::default(),
        MockRadio::default(),
    )
}

/// Step `task` from `enqueued()` until it finishes, advancing the clock
/// `step_ms` per step
pub fn run<T: Task<MockServices>>(task: &mut T, cx: &mut MockServices, step_ms: u32) -> TaskEval {
    task.enqueued(cx);
    for _ in 0..100_000 {
        let eval = task.step(cx);
        if eval.is_finished() {
            return eval;
        }
        cx.clock.uptime = cx.clock.uptime.wrapping_add(step_ms);
    }
    panic!("{} never finished", task.name());
}

#[derive(Debug, Default)]
pub struct MockHygrometer {
    pub fail_begin: bool,
    pub begins: u32,
    pub nan_reads: u32,
    pub reads: usize,
}

impl Hygrometer for MockHygrometer {
    type Error = MockError;

    fn begin(&mut self) -> Result<(), MockError> {
        self.begins += 1;
        if self.fail_begin {
            Err(MockError)
        } else {
            Ok(())
        }
    }

    fn read(&mut self) -> Result<HygrometerReading, MockError> {
        self.reads += 1;
        if self.nan_reads > 0 {
            self.nan_reads -= 1;
            return Ok(HygrometerReading {
                temperature_c: f32::NAN,
                humidity: f32::NAN,
            });
        }
        Ok(HygrometerReading {
            temperature_c: 21.5,
            humidity: 45.0,
        })
    }
}

#[derive(Debug, Default)]
pub struct MockBarometer {
    pub fail_begin: bool,
}

impl Barometer for MockBarometer {
    type Error = MockError;

    fn begin(&mut self) -> Result<(), MockError> {
        if self.fail_begin {
            Err(MockError)
        } else {
            Ok(())
        }
    }

    fn read(&mut self) -> Result<BarometricReading, MockError> {
        Ok(BarometricReading {
            pressure_pa: 101_325.0,
            altitude_m: 120.0,
            temperature_c: 20.0,
        })
    }
}

#[derive(Debug, Default)]
pub struct MockLight {
    pub fail_begin: bool,
}

impl LightSensor for MockLight {
    type Error = MockError;

    fn begin(&mut self) -> Result<(), MockError> {
        if self.fail_begin {
            Err(MockError)
        } else {
            Ok(())
        }
    }

    fn read(&mut self) -> Result<Luminosity, MockError> {
        Ok(Luminosity { full: 300, ir: 100 })
    }

    fn lux(&self, luminosity: Luminosity) -> f32 {
        f32::from(luminosity.visible()) * 0.5
    }
}

#[derive(Debug, Default)]
pub struct MockInertial {
    pub fail_begin: bool,
}

impl Inertial for MockInertial {
    type Error = MockError;

    fn begin(&mut self) -> Result<(), MockError> {
        if self.fail_begin {
            Err(MockError)
        } else {
            Ok(())
        }
    }

    fn calibration(&mut self) -> Result<Calibration, MockError> {
        Ok(Calibration {
            system: 3,
            gyro: 3,
            accel: 2,
            mag: 1,
        })
    }

    fn orientation(&mut self) -> Result<Orientation, MockError> {
        Ok(Orientation {
            x: 1.0,
            y: 2.0,
            z: 3.0,
        })
    }
}

/// Has a sample ready on every other poll
#[derive(Debug)]
pub struct MockAudio {
    pub fail_begin: bool,
    pub amplitude: f32,
    ready: bool,
}

impl Default for MockAudio {
    fn default() -> Self {
        Self {
            fail_begin: false,
            amplitude: 0.25,
            ready: false,
        }
    }
}

impl AmplitudeAnalyzer for MockAudio {
    type Error = MockError;

    fn begin(&mut self) -> Result<(), MockError> {
        if self.fail_begin {
            Err(MockError)
        } else {
            Ok(())
        }
    }

    fn sample(&mut self) -> Option<f32> {
        self.ready = !self.ready;
        self.ready.then_some(self.amplitude)
    }
}

pub type ScriptedSensors =
    Sensors<MockHygrometer, MockBarometer, MockLight, MockInertial, MockAudio>;

pub type MockReadings =
    NaturalistReadings<MockHygrometer, MockBarometer, MockLight, MockInertial, MockAudio>;

impl ScriptedSensors {
    /// Every sensor fitted and answering
    pub fn all_fitted() -> Self {
        Sensors {
            hygrometer: MockHygrometer::default(),
            barometer: MockBarometer::default(),
            light: MockLight::default(),
            inertial: MockInertial::default(),
            audio: MockAudio::default(),
        }
    }
}
