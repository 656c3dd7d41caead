//! Device main loop
//!
//! [`Device`] owns the services context and every top-level steppable, and
//! advances each of them once per [`Device::tick`] in a fixed order:
//!
//! 1. status LEDs
//! 2. power monitor
//! 3. watchdog feed
//! 4. scheduler (may transit the main machine)
//! 5. main machine
//! 6. wireless machine
//! 7. spawn mailbox drain
//! 8. background supervisor
//! 9. servicing supervisor
//!
//! The board calls `tick()` in a loop forever and halts on the first error.

use hal_abstractions::{Status, Storage, Watchdog};

use crate::error::{BootError, CoreError};
use crate::fsm::Fsm;
use crate::jobs::{AppSession, BackgroundJob, Spawn, Upload};
use crate::periodic::PeriodicJob;
use crate::scheduler::Scheduler;
use crate::services::{Platform, Services};
use crate::states::{MainState, MainStates, WifiState, WifiStates};
use crate::supervisor::Supervisor;
use crate::system::{PowerMonitor, StatusLights};
use crate::task::{Task, TaskCell, Uptime};

/// Periodic jobs the scheduler can hold
pub const SCHEDULED_JOBS: usize = 4;

/// Background pool size
pub const BACKGROUND_CAPACITY: usize = 5;

/// Concurrent app sessions
pub const SERVICING_CAPACITY: usize = 2;

/// The whole device
pub struct Device<P: Platform, R> {
    services: Services<P>,
    scheduler: Scheduler<MainState, Upload, SCHEDULED_JOBS>,
    main: Fsm<MainStates<R>, MainState>,
    wifi: Fsm<WifiStates, WifiState>,
    background: Supervisor<BackgroundJob, BACKGROUND_CAPACITY>,
    servicing: Supervisor<AppSession, SERVICING_CAPACITY>,
    status: TaskCell<StatusLights>,
    power: TaskCell<PowerMonitor>,
}

impl<P, R> Device<P, R>
where
    P: Platform,
    R: Task<Services<P>>,
{
    /// Assemble the device around `services` and the acquisition task
    /// `readings`. Nothing runs until [`begin`](Self::begin).
    pub fn new(services: Services<P>, readings: R) -> Self {
        let config = services.config;
        let mut scheduler = Scheduler::new();
        for job in [
            PeriodicJob::transit(config.readings_interval_ms, MainState::TakeReadings),
            PeriodicJob::task(config.upload_interval_ms, Upload::new()),
        ] {
            if scheduler.register(job).is_err() {
                error!("Scheduler full");
            }
        }

        Self {
            services,
            scheduler,
            main: Fsm::new("Main", MainStates::new(readings, config.sensor_warmup_ms)),
            wifi: Fsm::new("WiFi", WifiStates::new()),
            background: Supervisor::new("Background"),
            servicing: Supervisor::new("Servicing"),
            status: TaskCell::new(StatusLights::new()),
            power: TaskCell::new(PowerMonitor),
        }
    }

    /// Bring the device up. A storage failure is fatal: the status LEDs show
    /// [`Status::Fatal`] and the board is expected to halt.
    pub fn begin(&mut self) -> Result<(), BootError> {
        let cx = &mut self.services;
        self.status.task_mut().show(Status::Starting, cx);
        info!("Starting");

        if cx.storage.setup().is_err() {
            error!("Storage setup failed");
            self.status.task_mut().show(Status::Fatal, cx);
            return Err(BootError::Storage);
        }

        cx.watchdog.started();
        self.scheduler.started(cx.uptime_ms());

        let wifi_initial = if cx.config.networks.is_empty() {
            info!("No networks configured");
            WifiState::Disabled
        } else {
            WifiState::Startup
        };

        let started = self
            .main
            .start(MainState::Configure, cx)
            .and_then(|()| self.wifi.start(wifi_initial, cx));
        if let Err(e) = started {
            self.status.task_mut().show(Status::Fatal, cx);
            return Err(e.into());
        }

        self.status.begin(cx);
        self.power.begin(cx);
        info!("Ready");
        Ok(())
    }

    /// One pass of the main loop
    pub fn tick(&mut self) -> Result<(), CoreError> {
        let result = self.pass();
        if let Err(e) = result {
            error!("Fatal: {}", e);
            self.status.task_mut().show(Status::Fatal, &mut self.services);
        }
        result
    }

    fn pass(&mut self) -> Result<(), CoreError> {
        let cx = &mut self.services;
        let now = cx.uptime_ms();

        self.status.poll(now, cx);
        self.power.poll(now, cx);
        cx.watchdog.feed();

        if let Some(state) = self.scheduler.tick(now, cx) {
            if self.main.current() == Some(state) {
                debug!("Already in {:?}", state);
            } else {
                self.main.transit(state, cx)?;
            }
        }

        self.main.tick(cx)?;
        self.wifi.tick(cx)?;

        while let Some(spawn) = cx.take_spawn() {
            match spawn {
                Spawn::Background(job) => {
                    let _ = self.background.append(job, cx);
                }
                Spawn::Servicing(session) => {
                    let _ = self.servicing.append(session, cx);
                }
            }
        }

        self.background.tick(now, cx);
        self.servicing.tick(now, cx);
        Ok(())
    }

    /// The services context
    pub fn services(&self) -> &Services<P> {
        &self.services
    }

    /// The services context, mutably
    pub fn services_mut(&mut self) -> &mut Services<P> {
        &mut self.services
    }

    /// Active main state
    pub fn main_state(&self) -> Option<MainState> {
        self.main.current()
    }

    /// Active wireless state
    pub fn wifi_state(&self) -> Option<WifiState> {
        self.wifi.current()
    }

    /// The acquisition task
    pub fn readings(&self) -> &R {
        self.main.states().readings()
    }

    /// Background jobs in flight
    pub fn background(&self) -> &Supervisor<BackgroundJob, BACKGROUND_CAPACITY> {
        &self.background
    }

    /// App sessions in flight
    pub fn servicing(&self) -> &Supervisor<AppSession, SERVICING_CAPACITY> {
        &self.servicing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{NaturalistReadings, CHANNEL_COUNT};
    use crate::testing::{self, MockPlatform, MockReadings, MockServices, ScriptedSensors};
    use hal_abstractions::{LinkStatus, NetworkInfo};

    static NETWORKS: [NetworkInfo; 1] = [NetworkInfo {
        ssid: "home",
        password: "",
    }];

    fn device(cx: MockServices) -> Device<MockPlatform, MockReadings> {
        let mut sensors = ScriptedSensors::all_fitted();
        sensors.audio.fail_begin = true;
        Device::new(cx, NaturalistReadings::new(sensors))
    }

    /// Tick every 10ms for `ms`
    fn run_for(device: &mut Device<MockPlatform, MockReadings>, ms: u32) {
        for _ in 0..ms / 10 {
            device.tick().unwrap();
            device.services_mut().clock.uptime += 10;
        }
    }

    #[test]
    fn test_storage_failure_is_fatal_at_boot() {
        let mut cx = testing::services();
        cx.storage.fail_setup = true;
        let mut device = device(cx);

        assert_eq!(device.begin(), Err(BootError::Storage));
        assert_eq!(device.services().leds.shown, [Status::Starting, Status::Fatal]);
        assert!(!device.services().watchdog.started);
        assert_eq!(device.main_state(), None);
    }

    #[test]
    fn test_boot_starts_machines() {
        let mut device = device(testing::services());
        device.begin().unwrap();

        assert!(device.services().watchdog.started);
        assert_eq!(device.main_state(), Some(MainState::Configure));
        assert_eq!(device.wifi_state(), Some(WifiState::Disabled));

        device.tick().unwrap();
        assert_eq!(device.main_state(), Some(MainState::Idle));
        assert_eq!(device.services().watchdog.feeds, 1);
        assert_eq!(device.services().leds.shown, [Status::Starting, Status::Ready]);
    }

    #[test]
    fn test_scheduler_drives_reading_cycles() {
        let mut device = device(testing::services());
        device.begin().unwrap();

        run_for(&mut device, 59_000);
        assert_eq!(device.services().state.cycles(), 0);
        assert_eq!(device.main_state(), Some(MainState::Idle));

        run_for(&mut device, 2_000);
        assert_eq!(device.main_state(), Some(MainState::Idle));
        assert_eq!(device.services().state.cycles(), 1);
        assert_eq!(device.services().storage.appended.len(), CHANNEL_COUNT);
        assert!(device.services().leds.shown.contains(&Status::Busy));

        run_for(&mut device, 60_000);
        assert_eq!(device.services().state.cycles(), 2);
    }

    #[test]
    fn test_cycle_longer_than_interval_is_not_restarted() {
        let mut cx = testing::services();
        cx.config.readings_interval_ms = 100;
        cx.config.sensor_warmup_ms = 250;
        let mut device = device(cx);
        device.begin().unwrap();

        // Due again while still warming up; the repeat transition is dropped
        run_for(&mut device, 400);
        assert_eq!(device.services().state.cycles(), 1);
    }

    #[test]
    fn test_upload_is_skipped_offline() {
        let mut device = device(testing::services());
        device.begin().unwrap();
        run_for(&mut device, 5 * 60 * 1000 + 100);
        assert_eq!(device.services().radio.uploads, 0);
    }

    #[test]
    fn test_online_device_syncs_time_and_uploads() {
        let mut cx = testing::services();
        cx.config.networks = &NETWORKS;
        cx.radio.reachable = Some("home");
        cx.radio.time = Some(1_700_000_000);
        let mut device = device(cx);
        device.begin().unwrap();
        assert_eq!(device.wifi_state(), Some(WifiState::Startup));

        run_for(&mut device, 1_000);
        assert_eq!(device.wifi_state(), Some(WifiState::Listening));
        assert!(device.services().is_online());
        assert_eq!(device.services().radio.time_requests, 1);
        assert_eq!(device.services().clock.unix, 1_700_000_000);
        // Backlog pushed on connect
        assert_eq!(device.services().radio.uploads, 1);
        assert!(device.background().is_empty());

        run_for(&mut device, 5 * 60 * 1000);
        assert_eq!(device.services().radio.uploads, 2);
    }

    #[test]
    fn test_stalled_upload_blocks_scheduled_uploads_until_timeout() {
        let mut cx = testing::services();
        cx.config.networks = &NETWORKS;
        cx.config.upload_interval_ms = 10_000;
        cx.radio.reachable = Some("home");
        cx.radio.time = Some(1_700_000_000);
        cx.radio.upload_stuck = true;
        let mut device = device(cx);
        device.begin().unwrap();

        run_for(&mut device, 1_000);
        assert_eq!(device.services().radio.uploads, 1);
        assert!(device.services().uploading);

        // Scheduled uploads come due but leave the stalled one alone
        run_for(&mut device, 30_000);
        assert_eq!(device.services().radio.uploads, 1);
        assert_eq!(device.background().len(), 1);

        // Connect-time upload gives up; the next scheduled one takes the radio
        run_for(&mut device, 55_000);
        assert!(device.background().is_empty());
        assert_eq!(device.services().radio.uploads, 2);
        assert!(device.services().uploading);
    }

    #[test]
    fn test_app_sessions_are_supervised() {
        let mut cx = testing::services();
        cx.config.networks = &NETWORKS;
        cx.radio.reachable = Some("home");
        let mut device = device(cx);
        device.begin().unwrap();
        run_for(&mut device, 100);

        let radio = &mut device.services_mut().radio;
        radio.clients = 1;
        radio.session_polls = 3;
        device.tick().unwrap();
        assert_eq!(device.servicing().len(), 1);

        run_for(&mut device, 100);
        assert!(device.servicing().is_empty());

        device.services_mut().radio.link = LinkStatus::Down;
        device.tick().unwrap();
        assert_eq!(device.wifi_state(), Some(WifiState::Startup));
    }
}
