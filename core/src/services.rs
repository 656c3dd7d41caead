//! Services context
//!
//! The bundle of shared collaborators every state and task works against.
//! Assembled once at startup and handed to the state machines and tasks by
//! `&mut` on every call; nothing in the core reaches for a global.
//!
//! The two state machines never talk to each other directly. The wireless
//! machine publishes [`Connectivity`] here and the main flow reads it.

use hal_abstractions::{Clock, FuelGauge, StatusLeds, Storage, WallClock, Watchdog, Wireless};
use heapless::Deque;

use crate::config::DeviceConfig;
use crate::jobs::Spawn;
use crate::state::CoreState;
use crate::task::Uptime;

/// Pending spawns a single pass may queue
pub const SPAWN_CAPACITY: usize = 4;

/// The collaborator types of one board
pub trait Platform {
    /// Monotonic and wall-clock time
    type Clock: Clock + WallClock;
    /// Status LEDs
    type Leds: StatusLeds;
    /// Supervisory watchdog
    type Watchdog: Watchdog;
    /// Battery fuel gauge
    type Gauge: FuelGauge;
    /// Persistent reading storage
    type Storage: Storage;
    /// Wireless radio
    type Radio: Wireless;
}

/// Link state published by the wireless machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Connectivity {
    /// Radio off
    Offline,
    /// Trying to associate
    Connecting,
    /// Associated; uploads and time sync may run
    Online,
}

/// Shared collaborators
pub struct Services<P: Platform> {
    /// Static configuration
    pub config: DeviceConfig,
    /// Module table and readings
    pub state: CoreState,
    /// Time
    pub clock: P::Clock,
    /// Status LEDs
    pub leds: P::Leds,
    /// Watchdog
    pub watchdog: P::Watchdog,
    /// Fuel gauge
    pub gauge: P::Gauge,
    /// Reading storage
    pub storage: P::Storage,
    /// Wireless radio
    pub radio: P::Radio,
    /// Written by the wireless machine
    pub connectivity: Connectivity,
    /// Set while the device is taking readings
    pub busy: bool,
    /// Set while an upload holds the radio
    pub uploading: bool,
    spawns: Deque<Spawn, SPAWN_CAPACITY>,
}

impl<P: Platform> Services<P> {
    /// Assemble the context
    pub fn new(
        config: DeviceConfig,
        clock: P::Clock,
        leds: P::Leds,
        watchdog: P::Watchdog,
        gauge: P::Gauge,
        storage: P::Storage,
        radio: P::Radio,
    ) -> Self {
        Self {
            config,
            state: CoreState::new(),
            clock,
            leds,
            watchdog,
            gauge,
            storage,
            radio,
            connectivity: Connectivity::Offline,
            busy: false,
            uploading: false,
            spawns: Deque::new(),
        }
    }

    /// Hand a fire-and-forget job to the supervisors. They pick it up at
    /// the end of the current pass. Returns `false` if the mailbox is full
    /// and the job was dropped.
    pub fn spawn(&mut self, job: Spawn) -> bool {
        match self.spawns.push_back(job) {
            Ok(()) => true,
            Err(job) => {
                warn!("Spawn mailbox full, dropping {}", job.name());
                false
            }
        }
    }

    /// Next queued spawn
    pub(crate) fn take_spawn(&mut self) -> Option<Spawn> {
        self.spawns.pop_front()
    }

    /// Queued spawns not yet picked up
    pub fn pending_spawns(&self) -> usize {
        self.spawns.len()
    }

    /// `true` when the wireless link is up
    pub fn is_online(&self) -> bool {
        self.connectivity == Connectivity::Online
    }

    /// Unix seconds from the wall clock
    pub fn unix_time(&self) -> u32 {
        self.clock.unix_time()
    }
}

impl<P: Platform> Uptime for Services<P> {
    fn uptime_ms(&self) -> u32 {
        self.clock.uptime_ms()
    }
}
