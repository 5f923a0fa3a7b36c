//! Cancellable periodic job runner.
//!
//! A [`Scheduler`] spawns one tokio task per registered [`Job`]. Each task
//! waits one full period, runs the job, and repeats until the scheduler's
//! [`CancellationToken`] is cancelled. A failing run is logged and does not
//! stop the schedule.
//!
//! Timing goes through `tokio::time`, so tests can drive the schedule with a
//! paused clock instead of waiting on the wall clock.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Errors reported by a job run.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobError {
    /// Some recurring tasks could not be regenerated.
    #[error("{failed} of {attempted} recurring tasks could not be regenerated")]
    Regeneration {
        /// Number of regenerations attempted.
        attempted: usize,
        /// Number that failed.
        failed: usize,
    },
}

/// A unit of periodic background work.
pub trait Job: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Runs the job once as of `now`, returning the number of tasks it
    /// reported on or produced.
    fn run(&self, now: DateTime<Utc>) -> impl Future<Output = Result<usize, JobError>> + Send;
}

/// Owner of the spawned job loops.
pub struct Scheduler {
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates a scheduler with its own cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Creates a scheduler that stops when `cancel` is cancelled.
    #[must_use]
    pub const fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            handles: Vec::new(),
        }
    }

    /// Returns a clone of the token that stops every job loop.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of registered jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no job is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Starts running `job` every `period`, first one period from now.
    ///
    /// Ticks missed while a run is still in progress are skipped rather than
    /// replayed in a burst.
    pub fn spawn<J: Job>(&mut self, job: J, period: Duration) {
        let name = job.name();
        let cancel = self.cancel.clone();
        tracing::info!(job = name, period_secs = period.as_secs(), "scheduling job");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => run_once(&job).await,
                }
            }
            tracing::debug!(job = name, "job loop stopped");
        });
        self.handles.push((name, handle));
    }

    /// Cancels every job loop and waits for them to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(job = name, error = %e, "job task failed");
            }
        }
    }
}

async fn run_once<J: Job>(job: &J) {
    match job.run(Utc::now()).await {
        Ok(count) => tracing::debug!(job = job.name(), count, "job run finished"),
        Err(e) => tracing::error!(job = job.name(), error = %e, "job run failed"),
    }
}
