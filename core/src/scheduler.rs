//! Periodic job scheduler
//!
//! Owns a fixed set of [`PeriodicJob`]s and fires the due ones on every
//! `tick()`. Jobs are evaluated in registration order, so two jobs that
//! become due on the same tick always fire in the same order.
//!
//! Firing rules:
//! - a due job's `last_fired_at` becomes `now`, whatever its target does
//! - a task target that is still running is not restarted; the firing is a
//!   no-op until the task reports `Done`
//! - at most one transition target fires per tick. A second transition job
//!   that is due on the same tick stays due and fires on the next tick, so
//!   the owning state machine never sees two transitions in one pass
//! - every running task target is stepped once per tick

use heapless::Vec;

use crate::periodic::{JobTarget, PeriodicJob};
use crate::task::Task;

/// Fixed-capacity periodic scheduler
///
/// `T` is the transition target type, `K` the task type and `N` the job
/// capacity.
#[derive(Debug)]
pub struct Scheduler<T, K, const N: usize> {
    jobs: Vec<PeriodicJob<T, K>, N>,
}

impl<T: Copy, K, const N: usize> Scheduler<T, K, N> {
    /// Empty scheduler
    pub const fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Append `job` after the already-registered ones. Hands the job back
    /// if the scheduler is full.
    pub fn register(&mut self, job: PeriodicJob<T, K>) -> Result<(), PeriodicJob<T, K>> {
        self.jobs.push(job)
    }

    /// Anchor every job's interval at boot time
    pub fn started(&mut self, now: u32) {
        for job in self.jobs.iter_mut() {
            job.anchor(now);
        }
        info!("Scheduler started with {} jobs", self.jobs.len());
    }

    /// Registered jobs, in registration order
    pub fn jobs(&self) -> &[PeriodicJob<T, K>] {
        &self.jobs
    }

    /// Fire due jobs and step running task targets.
    ///
    /// Returns the transition requested by this tick, if any.
    pub fn tick<Cx: ?Sized>(&mut self, now: u32, cx: &mut Cx) -> Option<T>
    where
        K: Task<Cx>,
    {
        let mut transition = None;

        for (index, job) in self.jobs.iter_mut().enumerate() {
            if !job.is_due(now) {
                continue;
            }
            match job.target_mut() {
                JobTarget::Transit(state) => {
                    if transition.is_some() {
                        continue;
                    }
                    debug!("Job {}: firing transition", index);
                    transition = Some(*state);
                }
                JobTarget::Task(cell) => {
                    if cell.begin(cx) {
                        debug!("Job {}: started {}", index, cell.task().name());
                    } else {
                        debug!("Job {}: {} still running", index, cell.task().name());
                    }
                }
            }
            job.fired(now);
        }

        for job in self.jobs.iter_mut() {
            if let JobTarget::Task(cell) = job.target_mut() {
                let _ = cell.poll(now, cx);
            }
        }

        transition
    }
}

impl<T: Copy, K, const N: usize> Default for Scheduler<T, K, N> {
    fn default() -> Self {
        Self::new()
    }
}
