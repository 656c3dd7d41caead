//! Connectivity jobs
//!
//! Small tasks that drive the wireless collaborator: network time sync and
//! bulk upload run in the background pool or from the scheduler, app
//! sessions run in the servicing pool. Each one polls the radio and returns
//! promptly; the radio does the protocol work.

use core::task::Poll;

use hal_abstractions::{WallClock, Wireless};

use crate::error::TaskError;
use crate::services::{Platform, Services};
use crate::task::{Task, TaskEval, Uptime};

/// How often an in-flight radio operation is polled
const POLL_INTERVAL_MS: u32 = 100;

/// How long a time server gets to answer
const TIME_SYNC_TIMEOUT_MS: u32 = 10 * 1000;

/// How long an upload may sit without finishing
pub const UPLOAD_TIMEOUT_MS: u32 = 60 * 1000;

/// Set the wall clock from a network time server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSync {
    requested_at: Option<u32>,
}

impl TimeSync {
    /// Not yet requested
    pub const fn new() -> Self {
        Self { requested_at: None }
    }
}

impl<P: Platform> Task<Services<P>> for TimeSync {
    fn name(&self) -> &'static str {
        "TimeSync"
    }

    fn enqueued(&mut self, _cx: &mut Services<P>) {
        self.requested_at = None;
    }

    fn step(&mut self, cx: &mut Services<P>) -> TaskEval {
        if !cx.is_online() {
            return TaskEval::error(TaskError::Unavailable);
        }

        let now = cx.uptime_ms();
        let Some(requested_at) = self.requested_at else {
            if cx.radio.request_time().is_err() {
                warn!("TimeSync: request failed");
                return TaskEval::error(TaskError::Hardware);
            }
            self.requested_at = Some(now);
            return TaskEval::retry_in(POLL_INTERVAL_MS);
        };

        match cx.radio.poll_time() {
            Poll::Ready(Ok(unix_secs)) => {
                cx.clock.set_unix_time(unix_secs);
                info!("TimeSync: clock set to {}", unix_secs);
                TaskEval::done()
            }
            Poll::Ready(Err(_)) => {
                warn!("TimeSync: server error");
                TaskEval::error(TaskError::Hardware)
            }
            Poll::Pending if now.wrapping_sub(requested_at) >= TIME_SYNC_TIMEOUT_MS => {
                warn!("TimeSync: no answer after {}ms", TIME_SYNC_TIMEOUT_MS);
                TaskEval::error(TaskError::Timeout)
            }
            Poll::Pending => TaskEval::retry_in(POLL_INTERVAL_MS),
        }
    }
}

/// Push stored readings upstream. A no-op while offline, and while another
/// upload already holds the radio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Upload {
    started_at: Option<u32>,
}

impl Upload {
    /// Not yet started
    pub const fn new() -> Self {
        Self { started_at: None }
    }

    fn finish<P: Platform>(&mut self, cx: &mut Services<P>, eval: TaskEval) -> TaskEval {
        self.started_at = None;
        cx.uploading = false;
        eval
    }
}

impl<P: Platform> Task<Services<P>> for Upload {
    fn name(&self) -> &'static str {
        "Upload"
    }

    fn enqueued(&mut self, _cx: &mut Services<P>) {
        self.started_at = None;
    }

    fn step(&mut self, cx: &mut Services<P>) -> TaskEval {
        let Some(started_at) = self.started_at else {
            if !cx.is_online() {
                debug!("Upload: offline, skipping");
                return TaskEval::done();
            }
            if cx.uploading {
                debug!("Upload: already in flight, skipping");
                return TaskEval::done();
            }
            if cx.radio.begin_upload().is_err() {
                warn!("Upload: begin failed");
                return TaskEval::error(TaskError::Hardware);
            }
            cx.uploading = true;
            self.started_at = Some(cx.uptime_ms());
            return TaskEval::running();
        };

        if !cx.is_online() {
            warn!("Upload: link lost");
            return self.finish(cx, TaskEval::error(TaskError::Unavailable));
        }

        match cx.radio.poll_upload() {
            Poll::Ready(Ok(bytes)) => {
                info!("Upload: sent {} bytes", bytes);
                self.finish(cx, TaskEval::done())
            }
            Poll::Ready(Err(_)) => {
                warn!("Upload: failed");
                self.finish(cx, TaskEval::error(TaskError::Hardware))
            }
            Poll::Pending if cx.uptime_ms().wrapping_sub(started_at) >= UPLOAD_TIMEOUT_MS => {
                warn!("Upload: no progress after {}ms", UPLOAD_TIMEOUT_MS);
                self.finish(cx, TaskEval::error(TaskError::Timeout))
            }
            Poll::Pending => TaskEval::retry_in(POLL_INTERVAL_MS),
        }
    }
}

/// Serve one connected app client until it goes away
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppSession;

impl<P: Platform> Task<Services<P>> for AppSession {
    fn name(&self) -> &'static str {
        "AppSession"
    }

    fn step(&mut self, cx: &mut Services<P>) -> TaskEval {
        match cx.radio.serve() {
            Poll::Ready(Ok(())) => TaskEval::done(),
            Poll::Ready(Err(_)) => TaskEval::error(TaskError::Hardware),
            Poll::Pending => TaskEval::running(),
        }
    }
}

/// Jobs the background pool runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundJob {
    /// Network time sync
    TimeSync(TimeSync),
    /// Bulk upload
    Upload(Upload),
}

impl<P: Platform> Task<Services<P>> for BackgroundJob {
    fn name(&self) -> &'static str {
        match self {
            Self::TimeSync(_) => "TimeSync",
            Self::Upload(_) => "Upload",
        }
    }

    fn enqueued(&mut self, cx: &mut Services<P>) {
        match self {
            Self::TimeSync(job) => job.enqueued(cx),
            Self::Upload(job) => job.enqueued(cx),
        }
    }

    fn step(&mut self, cx: &mut Services<P>) -> TaskEval {
        match self {
            Self::TimeSync(job) => job.step(cx),
            Self::Upload(job) => job.step(cx),
        }
    }
}

/// A job handed from a state to one of the supervisors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spawn {
    /// For the background pool
    Background(BackgroundJob),
    /// For the servicing pool
    Servicing(AppSession),
}

impl Spawn {
    /// Name of the carried job
    pub fn name(&self) -> &'static str {
        match self {
            Self::Background(BackgroundJob::TimeSync(_)) => "TimeSync",
            Self::Background(BackgroundJob::Upload(_)) => "Upload",
            Self::Servicing(_) => "AppSession",
        }
    }
}
