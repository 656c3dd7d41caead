//! Shared device state
//!
//! The module table: which modules are attached, their channel schema, and
//! the latest reading of every channel. Written by provisioning (schema) and
//! by acquisition (readings); read by storage, upload and diagnostics.

use hal_abstractions::{BatteryReading, SensorReading};
use heapless::Vec;

use crate::error::StateError;

/// Most modules the table can hold
pub const MAX_MODULES: usize = 4;

/// Most channels one module can declare
pub const MAX_CHANNELS: usize = 20;

/// One named, unit-tagged measurement slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel {
    /// Channel name, e.g. `humidity`
    pub name: &'static str,
    /// Unit, empty when dimensionless
    pub unit: &'static str,
}

impl Channel {
    /// Channel `name` measured in `unit`
    pub const fn new(name: &'static str, unit: &'static str) -> Self {
        Self { name, unit }
    }
}

/// What a module does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModuleKind {
    /// Produces readings
    Sensor,
    /// Moves data off the device
    Communications,
}

/// A module's published schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModuleInfo {
    /// Kind of module
    pub kind: ModuleKind,
    /// Type id, unique per device
    pub id: u8,
    /// Short display name
    pub name: &'static str,
    /// Channels in reading order
    pub channels: &'static [Channel],
}

/// Latest value of one channel
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelReading {
    /// Unix seconds of the cycle that produced it
    pub timestamp: u32,
    /// Value
    pub value: f32,
}

/// A module in the table together with its latest readings
#[derive(Debug, Clone)]
pub struct AttachedModule {
    info: ModuleInfo,
    readings: [Option<ChannelReading>; MAX_CHANNELS],
}

impl AttachedModule {
    /// Schema
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// Number of channels in the schema
    pub fn channel_count(&self) -> usize {
        self.info.channels.len()
    }

    /// Latest reading of `channel`, `None` if never merged
    pub fn reading(&self, channel: u8) -> Option<ChannelReading> {
        self.readings.get(channel as usize).copied().flatten()
    }

    /// Every channel of the schema with its latest reading
    pub fn readings(&self) -> impl Iterator<Item = (&Channel, Option<ChannelReading>)> {
        self.info
            .channels
            .iter()
            .zip(self.readings.iter().copied())
    }
}

/// Shared device state
#[derive(Debug, Default)]
pub struct CoreState {
    modules: Vec<AttachedModule, MAX_MODULES>,
    scanned: bool,
    battery: Option<BatteryReading>,
    cycles: u32,
}

impl CoreState {
    /// Empty table
    pub const fn new() -> Self {
        Self {
            modules: Vec::new(),
            scanned: false,
            battery: None,
            cycles: 0,
        }
    }

    /// Register a module's schema. Done once, during provisioning.
    pub fn attach(&mut self, info: ModuleInfo) -> Result<(), StateError> {
        if info.channels.len() > MAX_CHANNELS {
            return Err(StateError::SchemaTooLarge);
        }
        if self.module(info.id).is_some() {
            return Err(StateError::DuplicateModule(info.id));
        }
        self.modules
            .push(AttachedModule {
                info,
                readings: [None; MAX_CHANNELS],
            })
            .map_err(|_| StateError::ModuleTableFull)?;
        info!(
            "Attached module {} ({}) with {} channels",
            info.name,
            info.id,
            info.channels.len()
        );
        Ok(())
    }

    /// Look a module up by type id
    pub fn module(&self, id: u8) -> Option<&AttachedModule> {
        self.modules.iter().find(|module| module.info.id == id)
    }

    /// Attached modules, in attach order
    pub fn modules(&self) -> impl Iterator<Item = &AttachedModule> {
        self.modules.iter()
    }

    /// Record `reading` as the latest value of its channel.
    ///
    /// Merging the same reading twice leaves the state unchanged.
    pub fn merge(&mut self, module: u8, reading: &SensorReading) -> Result<(), StateError> {
        let attached = self
            .modules
            .iter_mut()
            .find(|attached| attached.info.id == module)
            .ok_or(StateError::UnknownModule(module))?;

        let index = reading.channel as usize;
        if index >= attached.info.channels.len() {
            return Err(StateError::ChannelOutOfRange {
                module,
                channel: reading.channel,
            });
        }

        attached.readings[index] = Some(ChannelReading {
            timestamp: reading.timestamp,
            value: reading.value,
        });
        Ok(())
    }

    /// Provisioning has finished registering modules
    pub fn done_scanning(&mut self) {
        self.scanned = true;
    }

    /// `true` after [`done_scanning`](Self::done_scanning)
    pub fn is_scanned(&self) -> bool {
        self.scanned
    }

    /// Latest battery sample
    pub fn battery(&self) -> Option<BatteryReading> {
        self.battery
    }

    /// Store a battery sample
    pub fn set_battery(&mut self, reading: BatteryReading) {
        self.battery = Some(reading);
    }

    /// Count a completed acquisition cycle
    pub fn cycle_completed(&mut self) {
        self.cycles = self.cycles.wrapping_add(1);
    }

    /// Completed acquisition cycles since boot
    pub fn cycles(&self) -> u32 {
        self.cycles
    }
}
