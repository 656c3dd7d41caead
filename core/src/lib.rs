//! Platform-agnostic core of the naturalist sensing firmware
//!
//! A cooperative task runtime (tasks, periodic jobs, scheduler, bounded
//! supervisors), finite-state machines, and the multi-sensor acquisition
//! pipeline they drive. Everything runs on one thread with fixed-capacity
//! storage; hardware is reached only through `hal-abstractions` traits, so
//! the whole crate is testable on the host.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

pub mod acquisition;
pub mod check;
pub mod config;
pub mod device;
pub mod error;
pub mod fsm;
pub mod jobs;
pub mod periodic;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod states;
pub mod stats;
pub mod supervisor;
pub mod system;
pub mod task;

#[cfg(test)]
mod testing;

pub use acquisition::{NaturalistReadings, Sensors, NATURALIST_MODULE, NATURALIST_MODULE_ID};
pub use check::{check, CheckReport, Fitted, Outcome};
pub use config::DeviceConfig;
pub use device::Device;
pub use error::{BootError, CoreError, DelegationError, FsmError, StateError, TaskError};
pub use fsm::{Fsm, Next, StateSet};
pub use jobs::{AppSession, BackgroundJob, Spawn, TimeSync, Upload};
pub use periodic::{JobTarget, PeriodicJob};
pub use scheduler::Scheduler;
pub use services::{Connectivity, Platform, Services};
pub use state::{Channel, CoreState, ModuleInfo, ModuleKind};
pub use states::{MainState, MainStates, WifiState, WifiStates};
pub use stats::{AudioSummary, WindowedStat};
pub use supervisor::Supervisor;
pub use task::{Delay, Delegation, Lifecycle, Task, TaskCell, TaskEval, Uptime};
