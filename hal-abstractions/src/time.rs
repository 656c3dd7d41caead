//! Time sources

/// Monotonic millisecond uptime
///
/// The counter wraps after ~49.7 days; consumers must compare instants with
/// `wrapping_sub`.
pub trait Clock {
    /// Milliseconds since boot
    fn uptime_ms(&self) -> u32;
}

/// Wall-clock time in Unix seconds
///
/// Only used to stamp readings. Reads as 0 until the first time sync.
pub trait WallClock {
    /// Current Unix time in seconds
    fn unix_time(&self) -> u32;

    /// Set the clock, e.g. after a network time sync
    fn set_unix_time(&mut self, unix_secs: u32);
}
