//! Wireless link boundary
//!
//! Association, the app query protocol, bulk upload and network time are
//! all driven by the implementation; the core only polls them. Every method
//! must return promptly.

use core::task::Poll;

/// Credentials for one wireless network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetworkInfo {
    /// Network name
    pub ssid: &'static str,
    /// Pre-shared key, empty for open networks
    pub password: &'static str,
}

/// Association state of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    /// Radio idle
    Down,
    /// Association in progress
    Connecting,
    /// Associated and addressed
    Up,
    /// Association attempt failed
    Failed,
}

/// Wireless radio
pub trait Wireless {
    /// Radio error
    type Error: core::fmt::Debug;

    /// Start associating with `network`
    fn connect(&mut self, network: &NetworkInfo) -> Result<(), Self::Error>;

    /// Current association state
    fn link(&mut self) -> LinkStatus;

    /// Drop the association and power the radio down
    fn disconnect(&mut self);

    /// Attach a pending app client, returning `true` if one was waiting
    fn accept(&mut self) -> bool;

    /// Service the attached client one increment
    fn serve(&mut self) -> Poll<Result<(), Self::Error>>;

    /// Start uploading stored data
    fn begin_upload(&mut self) -> Result<(), Self::Error>;

    /// Advance the upload; resolves to the number of bytes sent
    fn poll_upload(&mut self) -> Poll<Result<u32, Self::Error>>;

    /// Ask a time server for the current time
    fn request_time(&mut self) -> Result<(), Self::Error>;

    /// Advance the time request; resolves to Unix seconds
    fn poll_time(&mut self) -> Poll<Result<u32, Self::Error>>;
}
