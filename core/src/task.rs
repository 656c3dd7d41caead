//! Cooperative tasks
//!
//! A task is advanced one bounded increment per `step()` call and reports a
//! [`TaskEval`]. Anything that needs real time (a sampling window, a network
//! round trip) keeps its progress in its own fields and returns `Running`
//! until it is finished. `step()` must never block for more than a few tens
//! of milliseconds: the watchdog is only fed between steps.
//!
//! ## Lifecycle
//!
//! ```text
//! NotStarted --begin()--> Running --step() == Done/Error--> Done
//!                            ^                               |
//!                            +-----------begin()-------------+
//! ```
//!
//! `begin()` calls [`Task::enqueued`], which resets anything that must not
//! carry over between runs. [`TaskCell`] owns a task together with its
//! lifecycle and hands the final [`TaskEval`] back exactly once.

use heapless::Vec;

use crate::error::{DelegationError, TaskError};

/// Maximum nesting of delegated tasks
pub const MAX_DELEGATION_DEPTH: usize = 2;

/// Outcome of one `step()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskEval {
    /// Finished
    Done,
    /// More work to do; optionally don't step again for this many ms
    Running(Option<u32>),
    /// Gave up
    Error(TaskError),
}

impl TaskEval {
    /// Finished
    pub const fn done() -> Self {
        Self::Done
    }

    /// Step again on the next pass
    pub const fn running() -> Self {
        Self::Running(None)
    }

    /// Step again in `ms` milliseconds
    pub const fn retry_in(ms: u32) -> Self {
        Self::Running(Some(ms))
    }

    /// Failed with `error`
    pub const fn error(error: TaskError) -> Self {
        Self::Error(error)
    }

    /// `true` for `Done`
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// `true` for `Running`
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running(_))
    }

    /// `true` once the task will not be stepped again
    pub const fn is_finished(&self) -> bool {
        !self.is_running()
    }
}

/// Monotonic millisecond time, as seen by a task's context
pub trait Uptime {
    /// Milliseconds since boot, wrapping
    fn uptime_ms(&self) -> u32;
}

/// A unit of cooperative work run against a context `Cx`
pub trait Task<Cx: ?Sized> {
    /// Name for diagnostics
    fn name(&self) -> &'static str;

    /// One-time hardware initialization per powered session
    fn setup(&mut self, _cx: &mut Cx) {}

    /// Called every time the task is scheduled, before the first `step()`
    fn enqueued(&mut self, _cx: &mut Cx) {}

    /// Advance by one bounded increment
    fn step(&mut self, cx: &mut Cx) -> TaskEval;
}

/// Where a task is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lifecycle {
    /// Never begun
    NotStarted,
    /// Begun and not yet finished
    Running,
    /// Finished; may be begun again
    Done,
}

/// A task plus its lifecycle
#[derive(Debug)]
pub struct TaskCell<T> {
    task: T,
    lifecycle: Lifecycle,
    not_before: Option<u32>,
}

impl<T> TaskCell<T> {
    /// Wrap `task`, not yet started
    pub const fn new(task: T) -> Self {
        Self {
            task,
            lifecycle: Lifecycle::NotStarted,
            not_before: None,
        }
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// `true` between `begin()` and the final eval
    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// The wrapped task
    pub fn task(&self) -> &T {
        &self.task
    }

    /// The wrapped task, mutably
    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }

    /// Unwrap the task
    pub fn into_inner(self) -> T {
        self.task
    }

    /// Schedule the task. Returns `false` without touching it if it is
    /// already running.
    pub fn begin<Cx: ?Sized>(&mut self, cx: &mut Cx) -> bool
    where
        T: Task<Cx>,
    {
        if self.is_running() {
            return false;
        }
        self.task.enqueued(cx);
        self.lifecycle = Lifecycle::Running;
        self.not_before = None;
        true
    }

    /// Step the task once if it is running and not waiting out a retry hint.
    ///
    /// Returns `None` when nothing was stepped. A `Done` or `Error` eval is
    /// returned once, after which the cell is `Done` and returns `None`.
    pub fn poll<Cx: ?Sized>(&mut self, now: u32, cx: &mut Cx) -> Option<TaskEval>
    where
        T: Task<Cx>,
    {
        if !self.is_running() {
            return None;
        }
        if let Some(at) = self.not_before {
            // Wrapping-safe "now < at"
            if (now.wrapping_sub(at) as i32) < 0 {
                return None;
            }
            self.not_before = None;
        }

        let eval = self.task.step(cx);
        match eval {
            TaskEval::Running(Some(ms)) => self.not_before = Some(now.wrapping_add(ms)),
            TaskEval::Running(None) => {}
            TaskEval::Done => self.lifecycle = Lifecycle::Done,
            TaskEval::Error(e) => {
                warn!("{}: error: {}", self.task.name(), e);
                self.lifecycle = Lifecycle::Done;
            }
        }
        Some(eval)
    }
}

/// Bounded stack of tasks a parent has handed control to
///
/// The parent keeps the tasks; the stack only holds handles and the parent
/// resolves them. The top handle runs until it finishes, then the parent
/// pops it and resumes whatever is underneath.
#[derive(Debug)]
pub struct Delegation<H> {
    stack: Vec<H, MAX_DELEGATION_DEPTH>,
}

impl<H: Copy> Delegation<H> {
    /// Empty stack
    pub const fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Delegate to `handle`
    pub fn push(&mut self, handle: H) -> Result<(), DelegationError> {
        self.stack.push(handle).map_err(|_| DelegationError::TooDeep)
    }

    /// Currently delegated-to handle
    pub fn top(&self) -> Option<H> {
        self.stack.last().copied()
    }

    /// Return control from the top handle
    pub fn pop(&mut self) -> Option<H> {
        self.stack.pop()
    }

    /// Abandon all delegation
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Nothing delegated
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Current depth
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl<H: Copy> Default for Delegation<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits out a fixed duration without blocking
#[derive(Debug, Clone, Copy)]
pub struct Delay {
    duration_ms: u32,
    started_at: u32,
}

impl Delay {
    /// A delay of `duration_ms`, measured from `enqueued()`
    pub const fn new(duration_ms: u32) -> Self {
        Self {
            duration_ms,
            started_at: 0,
        }
    }
}

impl<Cx: Uptime + ?Sized> Task<Cx> for Delay {
    fn name(&self) -> &'static str {
        "Delay"
    }

    fn enqueued(&mut self, cx: &mut Cx) {
        self.started_at = cx.uptime_ms();
    }

    fn step(&mut self, cx: &mut Cx) -> TaskEval {
        let elapsed = cx.uptime_ms().wrapping_sub(self.started_at);
        if elapsed >= self.duration_ms {
            TaskEval::done()
        } else {
            TaskEval::retry_in(self.duration_ms - elapsed)
        }
    }
}
