//! Periodic jobs
//!
//! A job binds a target to a fixed interval. The interval is measured from
//! the previous firing time, not from when the target finished, so a slow
//! target does not make the schedule drift.

use crate::task::TaskCell;

/// What a job does when it fires
#[derive(Debug)]
pub enum JobTarget<T, K> {
    /// Ask the owning state machine to enter state `T`
    Transit(T),
    /// Run a singleton task to completion over the following ticks
    Task(TaskCell<K>),
}

/// A target bound to a firing interval
#[derive(Debug)]
pub struct PeriodicJob<T, K> {
    interval_ms: u32,
    last_fired_at: u32,
    target: JobTarget<T, K>,
}

impl<T, K> PeriodicJob<T, K> {
    /// Request a transition to `state` every `interval_ms`
    pub const fn transit(interval_ms: u32, state: T) -> Self {
        Self {
            interval_ms,
            last_fired_at: 0,
            target: JobTarget::Transit(state),
        }
    }

    /// Run `task` every `interval_ms`
    pub const fn task(interval_ms: u32, task: K) -> Self {
        Self {
            interval_ms,
            last_fired_at: 0,
            target: JobTarget::Task(TaskCell::new(task)),
        }
    }

    /// Firing interval
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// When the job last fired (or was anchored)
    pub fn last_fired_at(&self) -> u32 {
        self.last_fired_at
    }

    /// The job's target
    pub fn target(&self) -> &JobTarget<T, K> {
        &self.target
    }

    pub(crate) fn target_mut(&mut self) -> &mut JobTarget<T, K> {
        &mut self.target
    }

    /// Anchor the interval at `now` without firing
    pub fn anchor(&mut self, now: u32) {
        self.last_fired_at = now;
    }

    /// At least one full interval has passed since the last firing
    pub fn is_due(&self, now: u32) -> bool {
        now.wrapping_sub(self.last_fired_at) >= self.interval_ms
    }

    /// Record a firing at `now`
    pub(crate) fn fired(&mut self, now: u32) {
        self.last_fired_at = now;
    }

    /// `true` while a task target is between `begin()` and its final eval
    pub fn is_running(&self) -> bool {
        match &self.target {
            JobTarget::Task(cell) => cell.is_running(),
            JobTarget::Transit(_) => false,
        }
    }
}
