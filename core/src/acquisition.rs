//! Naturalist readings
//!
//! The acquisition task for the naturalist sensor board: an optional audio
//! sampling window followed by a single read of every fitted sensor, merged
//! into the shared state as one coherent set of [`CHANNEL_COUNT`] readings.
//!
//! Sensors that fail to begin lose their capability flag for the rest of the
//! powered session; their channels read `0.0` rather than holding the cycle
//! up.

use hal_abstractions::{
    AmplitudeAnalyzer, Barometer, Calibration, Hygrometer, Inertial, LightSensor, SensorReading,
};

use crate::error::TaskError;
use crate::services::{Platform, Services};
use crate::state::{Channel, ModuleInfo, ModuleKind};
use crate::stats::{AudioSummary, WindowedStat};
use crate::task::{Task, TaskEval, Uptime};

/// Module type id of the naturalist board
pub const NATURALIST_MODULE_ID: u8 = 8;

/// Channels in reading order
pub const NATURALIST_CHANNELS: &[Channel] = &[
    Channel::new("temp_1", "°C"),
    Channel::new("humidity", "%"),
    Channel::new("temp_2", "°C"),
    Channel::new("pressure", "pa"),
    Channel::new("altitude", "m"),
    Channel::new("light_ir", ""),
    Channel::new("light_visible", ""),
    Channel::new("light_lux", ""),
    Channel::new("imu_cal", ""),
    Channel::new("imu_orien_x", ""),
    Channel::new("imu_orien_y", ""),
    Channel::new("imu_orien_z", ""),
    Channel::new("audio_rms_avg", ""),
    Channel::new("audio_rms_min", ""),
    Channel::new("audio_rms_max", ""),
    Channel::new("audio_dbfs_avg", ""),
    Channel::new("audio_dbfs_min", ""),
    Channel::new("audio_dbfs_max", ""),
];

/// Readings produced per cycle
pub const CHANNEL_COUNT: usize = 18;

const _: () = assert!(NATURALIST_CHANNELS.len() == CHANNEL_COUNT);

/// Schema published for the naturalist board
pub const NATURALIST_MODULE: ModuleInfo = ModuleInfo {
    kind: ModuleKind::Sensor,
    id: NATURALIST_MODULE_ID,
    name: "FkNat",
    channels: NATURALIST_CHANNELS,
};

/// Most audio samples folded per step
pub const MAX_SAMPLES_PER_STEP: usize = 64;

const BEGIN_ATTEMPTS: usize = 3;
const READ_ATTEMPTS: usize = 3;
const PASCALS_PER_INCH_HG: f32 = 3377.0;

/// The sensors on the board. Unfitted ones are [`hal_abstractions::Absent`].
#[derive(Debug)]
pub struct Sensors<H, B, L, I, A> {
    /// Temperature and humidity
    pub hygrometer: H,
    /// Pressure, altitude and temperature
    pub barometer: B,
    /// Visible and infrared light
    pub light: L,
    /// Orientation
    pub inertial: I,
    /// Audio amplitude
    pub audio: A,
}

/// Which sensors began successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities {
    /// Hygrometer usable
    pub hygrometer: bool,
    /// Barometer usable
    pub barometer: bool,
    /// Light sensor usable
    pub light: bool,
    /// Inertial sensor usable
    pub inertial: bool,
    /// Audio analyzer usable
    pub audio: bool,
}

impl Capabilities {
    const NONE: Self = Self {
        hygrometer: false,
        barometer: false,
        light: false,
        inertial: false,
        audio: false,
    };
}

/// One cycle's worth of values
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NaturalistValues {
    /// Hygrometer temperature, °C
    pub temperature_c: f32,
    /// Relative humidity, %
    pub humidity: f32,
    /// Barometer die temperature, °C
    pub barometer_temperature_c: f32,
    /// Pressure, Pa
    pub pressure_pa: f32,
    /// Barometric altitude, m
    pub altitude_m: f32,
    /// Infrared counts
    pub light_ir: f32,
    /// Visible counts (full spectrum minus IR)
    pub light_visible: f32,
    /// Illuminance, lux
    pub light_lux: f32,
    /// IMU system calibration, 0..=3
    pub imu_calibration: f32,
    /// Euler x, degrees
    pub orientation_x: f32,
    /// Euler y, degrees
    pub orientation_y: f32,
    /// Euler z, degrees
    pub orientation_z: f32,
    /// Audio window summary
    pub audio: AudioSummary,
    /// Full IMU calibration; only `system` is published as a channel
    pub calibration: Calibration,
}

impl NaturalistValues {
    /// Values in channel order
    pub fn channels(&self) -> [f32; CHANNEL_COUNT] {
        [
            self.temperature_c,
            self.humidity,
            self.barometer_temperature_c,
            self.pressure_pa,
            self.altitude_m,
            self.light_ir,
            self.light_visible,
            self.light_lux,
            self.imu_calibration,
            self.orientation_x,
            self.orientation_y,
            self.orientation_z,
            self.audio.rms_avg,
            self.audio.rms_min,
            self.audio.rms_max,
            self.audio.dbfs_avg,
            self.audio.dbfs_min,
            self.audio.dbfs_max,
        ]
    }

    /// One reading per channel, all stamped with `timestamp`
    pub fn readings(&self, timestamp: u32) -> [SensorReading; CHANNEL_COUNT] {
        let values = self.channels();
        core::array::from_fn(|i| SensorReading {
            channel: i as u8,
            timestamp,
            value: values[i],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Sampling { started_at: u32 },
}

/// Acquisition task for the naturalist board
#[derive(Debug)]
pub struct NaturalistReadings<H, B, L, I, A> {
    sensors: Sensors<H, B, L, I, A>,
    capabilities: Capabilities,
    initialized: bool,
    phase: Phase,
    window: WindowedStat,
    last: Option<NaturalistValues>,
}

impl<H, B, L, I, A> NaturalistReadings<H, B, L, I, A>
where
    H: Hygrometer,
    B: Barometer,
    L: LightSensor,
    I: Inertial,
    A: AmplitudeAnalyzer,
{
    /// Task over `sensors`; nothing is touched until `setup()`
    pub const fn new(sensors: Sensors<H, B, L, I, A>) -> Self {
        Self {
            sensors,
            capabilities: Capabilities::NONE,
            initialized: false,
            phase: Phase::Idle,
            window: WindowedStat::new(),
            last: None,
        }
    }

    /// Sensors that began successfully
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Values of the last completed cycle
    pub fn last_values(&self) -> Option<&NaturalistValues> {
        self.last.as_ref()
    }

    /// The audio window of the current (or last) cycle
    pub fn window(&self) -> &WindowedStat {
        &self.window
    }

    /// The sensors
    pub fn sensors_mut(&mut self) -> &mut Sensors<H, B, L, I, A> {
        &mut self.sensors
    }

    fn begin_sensors(&mut self) {
        let sensors = &mut self.sensors;
        let caps = &mut self.capabilities;

        caps.audio = match sensors.audio.begin() {
            Ok(()) => {
                info!("Amplitude analyzer ready");
                true
            }
            Err(_) => {
                warn!("Amplitude analyzer failed");
                false
            }
        };

        caps.hygrometer = sensors.hygrometer.begin().is_ok();
        if !caps.hygrometer {
            warn!("Hygrometer failed");
        }

        caps.barometer = (0..BEGIN_ATTEMPTS).any(|attempt| match sensors.barometer.begin() {
            Ok(()) => true,
            Err(_) => {
                warn!("Barometer failed (attempt {})", attempt + 1);
                false
            }
        });

        caps.light = sensors.light.begin().is_ok();
        if !caps.light {
            warn!("Light sensor failed");
        }

        caps.inertial = sensors.inertial.begin().is_ok();
        if !caps.inertial {
            warn!("Inertial sensor not available");
        }
    }

    /// Fold whatever the analyzer has buffered, bounded per step
    fn sample_audio(&mut self) {
        for _ in 0..MAX_SAMPLES_PER_STEP {
            match self.sensors.audio.sample() {
                Some(amplitude) => self.window.fold(amplitude),
                None => break,
            }
        }
    }

    fn read_sensors(&mut self) -> NaturalistValues {
        let caps = self.capabilities;
        let sensors = &mut self.sensors;
        let mut values = NaturalistValues {
            audio: self.window.summary(),
            ..NaturalistValues::default()
        };

        if caps.hygrometer {
            for _ in 0..READ_ATTEMPTS {
                match sensors.hygrometer.read() {
                    Ok(reading) => {
                        values.temperature_c = reading.temperature_c;
                        values.humidity = reading.humidity;
                        debug!("Hygrometer: {}", reading.temperature_c);
                        if !reading.temperature_c.is_nan() {
                            break;
                        }
                    }
                    Err(_) => {
                        warn!("Hygrometer read failed");
                        break;
                    }
                }
            }
        }

        if caps.barometer {
            match sensors.barometer.read() {
                Ok(reading) => {
                    values.pressure_pa = reading.pressure_pa;
                    values.altitude_m = reading.altitude_m;
                    values.barometer_temperature_c = reading.temperature_c;
                }
                Err(_) => warn!("Barometer read failed"),
            }
        }

        if caps.light {
            match sensors.light.read() {
                Ok(luminosity) => {
                    values.light_ir = f32::from(luminosity.ir);
                    values.light_visible = f32::from(luminosity.visible());
                    values.light_lux = sensors.light.lux(luminosity);
                }
                Err(_) => warn!("Light sensor read failed"),
            }
        }

        if caps.inertial {
            match sensors.inertial.calibration() {
                Ok(calibration) => {
                    values.imu_calibration = f32::from(calibration.system);
                    values.calibration = calibration;
                }
                Err(_) => warn!("Inertial calibration read failed"),
            }
            match sensors.inertial.orientation() {
                Ok(orientation) => {
                    values.orientation_x = orientation.x;
                    values.orientation_y = orientation.y;
                    values.orientation_z = orientation.z;
                }
                Err(_) => warn!("Inertial orientation read failed"),
            }
        }

        values
    }

    fn log_summary(&self, values: &NaturalistValues) {
        info!(
            "Sensors: {}C {}%, {}C {}pa {}inHg {}m",
            values.temperature_c,
            values.humidity,
            values.barometer_temperature_c,
            values.pressure_pa,
            values.pressure_pa / PASCALS_PER_INCH_HG,
            values.altitude_m
        );
        info!(
            "Sensors: ir({}) visible({}) lux({})",
            values.light_ir,
            values.light_visible,
            values.light_lux
        );
        info!(
            "Sensors: cal({}, {}, {}, {}) xyz({}, {}, {})",
            values.calibration.system,
            values.calibration.gyro,
            values.calibration.accel,
            values.calibration.mag,
            values.orientation_x,
            values.orientation_y,
            values.orientation_z
        );
        info!(
            "Sensors: RMS min={} max={} avg={} ({} samples, {} dropped)",
            values.audio.rms_min,
            values.audio.rms_max,
            values.audio.rms_avg,
            self.window.count(),
            self.window.dropped()
        );
        info!(
            "Sensors: dBFS min={} max={} avg={}",
            values.audio.dbfs_min,
            values.audio.dbfs_max,
            values.audio.dbfs_avg
        );
    }

    fn finish<P: Platform>(&mut self, cx: &mut Services<P>) -> TaskEval {
        info!("Taking readings...");
        let values = self.read_sensors();
        let timestamp = cx.unix_time();

        for reading in values.readings(timestamp).iter() {
            if let Err(e) = cx.state.merge(NATURALIST_MODULE_ID, reading) {
                error!("Merging reading failed: {}", e);
                return TaskEval::error(TaskError::Unavailable);
            }
        }

        self.log_summary(&values);
        self.last = Some(values);
        self.phase = Phase::Idle;
        TaskEval::done()
    }
}

impl<P, H, B, L, I, A> Task<Services<P>> for NaturalistReadings<H, B, L, I, A>
where
    P: Platform,
    H: Hygrometer,
    B: Barometer,
    L: LightSensor,
    I: Inertial,
    A: AmplitudeAnalyzer,
{
    fn name(&self) -> &'static str {
        "NaturalistReadings"
    }

    fn setup(&mut self, _cx: &mut Services<P>) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.begin_sensors();
        info!("Sensor capabilities: {:?}", self.capabilities);
    }

    fn enqueued(&mut self, _cx: &mut Services<P>) {
        self.window.reset();
        self.phase = Phase::Idle;
    }

    fn step(&mut self, cx: &mut Services<P>) -> TaskEval {
        let now = cx.uptime_ms();
        match self.phase {
            Phase::Idle if self.capabilities.audio => {
                info!("Listening for {}ms...", cx.config.audio_window_ms);
                self.phase = Phase::Sampling { started_at: now };
                self.sample_audio();
                TaskEval::running()
            }
            Phase::Idle => self.finish(cx),
            Phase::Sampling { started_at } => {
                self.sample_audio();
                if now.wrapping_sub(started_at) < cx.config.audio_window_ms {
                    TaskEval::running()
                } else {
                    self.finish(cx)
                }
            }
        }
    }
}
