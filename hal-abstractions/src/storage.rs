//! Persistent storage boundary
//!
//! The on-flash layout is owned by the implementation.

/// One channel's value taken during an acquisition cycle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorReading {
    /// Channel index within the module's schema
    pub channel: u8,
    /// Unix seconds, shared by every channel of one cycle
    pub timestamp: u32,
    /// Measured value
    pub value: f32,
}

/// Persistent reading storage
pub trait Storage {
    /// Storage error
    type Error: core::fmt::Debug;

    /// Mount or format the backing medium. Failure here is fatal at boot.
    fn setup(&mut self) -> Result<(), Self::Error>;

    /// Append one reading of module `module`
    fn append(&mut self, module: u8, reading: &SensorReading) -> Result<(), Self::Error>;
}
