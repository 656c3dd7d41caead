//! Concrete state machines
//!
//! The main machine drives provisioning and acquisition cycles; the wireless
//! machine owns the radio. They share nothing but the services context: the
//! wireless machine publishes [`Connectivity`] and spawns its jobs through
//! the mailbox, the main machine only reads.

use hal_abstractions::{LinkStatus, SensorReading, Storage, Wireless};

use crate::acquisition::{NATURALIST_MODULE, NATURALIST_MODULE_ID};
use crate::fsm::{Next, StateSet};
use crate::jobs::{AppSession, BackgroundJob, Spawn, TimeSync, Upload};
use crate::services::{Connectivity, Platform, Services};
use crate::task::{Delay, Delegation, Task, TaskCell, Uptime};

/// States of the main machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MainState {
    /// Register the module schema
    Configure,
    /// Waiting for the next cycle
    Idle,
    /// One acquisition cycle
    TakeReadings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadingStep {
    Warmup,
    Acquire,
}

/// Main machine states. `R` is the acquisition task.
#[derive(Debug)]
pub struct MainStates<R> {
    warmup: TaskCell<Delay>,
    readings: TaskCell<R>,
    delegation: Delegation<ReadingStep>,
    failed: bool,
}

impl<R> MainStates<R> {
    /// States around the acquisition task `readings`, sensors settling for
    /// `warmup_ms` before each cycle
    pub const fn new(readings: R, warmup_ms: u32) -> Self {
        Self {
            warmup: TaskCell::new(Delay::new(warmup_ms)),
            readings: TaskCell::new(readings),
            delegation: Delegation::new(),
            failed: false,
        }
    }

    /// The acquisition task
    pub fn readings(&self) -> &R {
        self.readings.task()
    }

    /// The acquisition task, mutably
    pub fn readings_mut(&mut self) -> &mut R {
        self.readings.task_mut()
    }
}

impl<R> MainStates<R> {
    fn configure<P: Platform>(cx: &mut Services<P>) {
        if let Err(e) = cx.state.attach(NATURALIST_MODULE) {
            error!("Registering module failed: {}", e);
        }
        for network in cx.config.networks {
            info!("Configured network: {}", network.ssid);
        }
        cx.state.done_scanning();
    }

    /// Append the latest readings of the naturalist module to storage
    fn persist<P: Platform>(cx: &mut Services<P>) {
        let Some(module) = cx.state.module(NATURALIST_MODULE_ID) else {
            warn!("Nothing to persist");
            return;
        };

        let mut failures = 0u32;
        for (channel, (_, latest)) in module.readings().enumerate() {
            let Some(latest) = latest else { continue };
            let reading = SensorReading {
                channel: channel as u8,
                timestamp: latest.timestamp,
                value: latest.value,
            };
            if cx.storage.append(NATURALIST_MODULE_ID, &reading).is_err() {
                failures += 1;
            }
        }
        if failures > 0 {
            warn!("Storing readings: {} appends failed", failures);
        }
    }
}

impl<P, R> StateSet<Services<P>> for MainStates<R>
where
    P: Platform,
    R: Task<Services<P>>,
{
    type Id = MainState;

    fn name(&self, id: MainState) -> &'static str {
        match id {
            MainState::Configure => "Configure",
            MainState::Idle => "Idle",
            MainState::TakeReadings => "TakeReadings",
        }
    }

    fn setup(&mut self, cx: &mut Services<P>) {
        self.readings.task_mut().setup(cx);
    }

    fn entry(&mut self, id: MainState, cx: &mut Services<P>) {
        match id {
            MainState::Configure => Self::configure(cx),
            MainState::Idle => cx.busy = false,
            MainState::TakeReadings => {
                cx.busy = true;
                self.failed = false;
                self.delegation.clear();
                // Top of the stack runs first
                let pushed = self
                    .delegation
                    .push(ReadingStep::Acquire)
                    .and_then(|()| self.delegation.push(ReadingStep::Warmup));
                if let Err(e) = pushed {
                    error!("TakeReadings: {}", e);
                    self.delegation.clear();
                    self.failed = true;
                    return;
                }
                self.warmup.begin(cx);
            }
        }
    }

    fn task(&mut self, id: MainState, cx: &mut Services<P>) -> Next<MainState> {
        match id {
            MainState::Configure => Next::Transit(MainState::Idle),
            MainState::Idle => Next::Stay,
            MainState::TakeReadings => {
                let now = cx.uptime_ms();
                let Some(step) = self.delegation.top() else {
                    if !self.failed {
                        Self::persist(cx);
                        cx.state.cycle_completed();
                        info!("Cycle {} complete", cx.state.cycles());
                    }
                    cx.busy = false;
                    return Next::Back;
                };

                let eval = match step {
                    ReadingStep::Warmup => self.warmup.poll(now, cx),
                    ReadingStep::Acquire => self.readings.poll(now, cx),
                };
                match eval {
                    Some(eval) if eval.is_finished() => {
                        if !eval.is_done() {
                            self.failed = true;
                            self.delegation.clear();
                            return Next::Stay;
                        }
                        self.delegation.pop();
                        match self.delegation.top() {
                            Some(ReadingStep::Acquire) => {
                                self.readings.begin(cx);
                            }
                            Some(ReadingStep::Warmup) => {
                                self.warmup.begin(cx);
                            }
                            None => {}
                        }
                        Next::Stay
                    }
                    _ => Next::Stay,
                }
            }
        }
    }
}

/// States of the wireless machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WifiState {
    /// Radio off
    Disabled,
    /// Trying the configured networks in order
    Startup,
    /// Associated and accepting app clients
    Listening,
}

/// Wireless machine states
#[derive(Debug, Default)]
pub struct WifiStates {
    network: usize,
    connecting: bool,
    attempt_started_at: u32,
    disabled_at: u32,
}

impl WifiStates {
    /// Fresh machine state
    pub const fn new() -> Self {
        Self {
            network: 0,
            connecting: false,
            attempt_started_at: 0,
            disabled_at: 0,
        }
    }

    fn next_network<P: Platform>(&mut self, cx: &mut Services<P>) {
        cx.radio.disconnect();
        self.network += 1;
        self.connecting = false;
    }

    fn startup<P: Platform>(&mut self, cx: &mut Services<P>) -> Next<WifiState> {
        let Some(network) = cx.config.networks.get(self.network).copied() else {
            warn!("WiFi: no network reachable");
            return Next::Transit(WifiState::Disabled);
        };
        let now = cx.uptime_ms();

        if !self.connecting {
            info!("WiFi: trying {}", network.ssid);
            match cx.radio.connect(&network) {
                Ok(()) => {
                    self.connecting = true;
                    self.attempt_started_at = now;
                }
                Err(_) => {
                    warn!("WiFi: connect to {} failed", network.ssid);
                    self.next_network(cx);
                }
            }
            return Next::Stay;
        }

        match cx.radio.link() {
            LinkStatus::Up => Next::Transit(WifiState::Listening),
            LinkStatus::Failed => {
                warn!("WiFi: {} refused", network.ssid);
                self.next_network(cx);
                Next::Stay
            }
            LinkStatus::Down | LinkStatus::Connecting => {
                if now.wrapping_sub(self.attempt_started_at) >= cx.config.wifi_connect_timeout_ms {
                    warn!("WiFi: {} timed out", network.ssid);
                    self.next_network(cx);
                }
                Next::Stay
            }
        }
    }
}

impl<P: Platform> StateSet<Services<P>> for WifiStates {
    type Id = WifiState;

    fn name(&self, id: WifiState) -> &'static str {
        match id {
            WifiState::Disabled => "Disabled",
            WifiState::Startup => "Startup",
            WifiState::Listening => "Listening",
        }
    }

    fn entry(&mut self, id: WifiState, cx: &mut Services<P>) {
        match id {
            WifiState::Disabled => {
                cx.radio.disconnect();
                cx.connectivity = Connectivity::Offline;
                self.disabled_at = cx.uptime_ms();
            }
            WifiState::Startup => {
                cx.connectivity = Connectivity::Connecting;
                self.network = 0;
                self.connecting = false;
            }
            WifiState::Listening => {
                cx.connectivity = Connectivity::Online;
                cx.spawn(Spawn::Background(BackgroundJob::TimeSync(TimeSync::new())));
                // Push whatever piled up while offline
                cx.spawn(Spawn::Background(BackgroundJob::Upload(Upload::new())));
            }
        }
    }

    fn task(&mut self, id: WifiState, cx: &mut Services<P>) -> Next<WifiState> {
        match id {
            WifiState::Disabled => {
                let waited = cx.uptime_ms().wrapping_sub(self.disabled_at);
                if !cx.config.networks.is_empty() && waited >= cx.config.wifi_retry_ms {
                    Next::Transit(WifiState::Startup)
                } else {
                    Next::Stay
                }
            }
            WifiState::Startup => self.startup(cx),
            WifiState::Listening => {
                if cx.radio.link() != LinkStatus::Up {
                    warn!("WiFi: link lost");
                    return Next::Transit(WifiState::Startup);
                }
                if cx.radio.accept() {
                    info!("WiFi: app connected");
                    cx.spawn(Spawn::Servicing(AppSession));
                }
                Next::Stay
            }
        }
    }
}
