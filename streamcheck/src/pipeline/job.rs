//! Handle to a running job.

use crate::cancellation::CancellationToken;
use crate::errors::HarnessError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

/// Lifecycle status of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Sources are still producing or observers are still draining.
    Running,
    /// Every source was exhausted and every delivery drained.
    Completed {
        /// Records produced across all sources.
        produced: u64,
    },
    /// The job was stopped before its sources were exhausted.
    Stopped {
        /// Records produced before the stop.
        produced: u64,
    },
    /// A source aborted the job.
    Failed(HarnessError),
}

impl JobStatus {
    /// Returns true once the job will make no further progress.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns the number of records produced, if known.
    #[must_use]
    pub const fn produced(&self) -> Option<u64> {
        match self {
            Self::Completed { produced } | Self::Stopped { produced } => Some(*produced),
            _ => None,
        }
    }
}

/// A submitted job.
///
/// Dropping the handle cancels the job.
#[derive(Debug)]
pub struct Job {
    id: Uuid,
    name: String,
    token: Arc<CancellationToken>,
    halt: Arc<CancellationToken>,
    status: watch::Receiver<JobStatus>,
    supervisor: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    stop_failure: Mutex<Option<HarnessError>>,
    grace: Duration,
}

impl Job {
    pub(crate) fn new(
        id: Uuid,
        name: String,
        token: Arc<CancellationToken>,
        halt: Arc<CancellationToken>,
        status: watch::Receiver<JobStatus>,
        supervisor: JoinHandle<()>,
        grace: Duration,
    ) -> Self {
        Self {
            id,
            name,
            token,
            halt,
            status,
            supervisor: tokio::sync::Mutex::new(Some(supervisor)),
            stop_failure: Mutex::new(None),
            grace,
        }
    }

    /// Returns the job id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the job name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Returns true once the job has finished, for any reason.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.borrow().is_terminal()
    }

    /// Waits until the job finishes on its own or is stopped.
    pub async fn wait_finished(&self) -> JobStatus {
        let mut status = self.status.clone();
        let terminal = match status.wait_for(JobStatus::is_terminal).await {
            Ok(terminal) => terminal.clone(),
            Err(_) => JobStatus::Failed(HarnessError::Internal(format!(
                "job '{}' supervisor exited without a status",
                self.name
            ))),
        };
        terminal
    }

    /// Stops the job and waits for every delivery to drain.
    ///
    /// Safe to call repeatedly and after natural completion. Returns the
    /// final status, the job's own error if a source failed, or
    /// `StopFailure` if draining exceeded the grace period. In that case
    /// every task of the job is aborted and no callback starts after this
    /// returns; a callback already running finishes.
    pub async fn stop(&self) -> Result<JobStatus, HarnessError> {
        if self.token.cancel("stop requested") {
            debug!(job = %self.name, "Stop requested");
        }

        {
            let mut supervisor = self.supervisor.lock().await;
            if let Some(handle) = supervisor.as_mut() {
                if tokio::time::timeout(self.grace, &mut *handle).await.is_err() {
                    // Delivery tasks check `halt` before every callback; aborting
                    // the supervisor drops the task sets that own them.
                    self.halt.cancel("stop grace period exceeded");
                    handle.abort();
                    let grace_ms = u64::try_from(self.grace.as_millis()).unwrap_or(u64::MAX);
                    error!(job = %self.name, grace_ms, "Job did not stop within grace period");
                    *self.stop_failure.lock() = Some(HarnessError::StopFailure {
                        job: self.name.clone(),
                        grace_ms,
                    });
                }
                *supervisor = None;
            }
        }

        if let Some(err) = self.stop_failure.lock().clone() {
            return Err(err);
        }
        match self.status() {
            JobStatus::Failed(err) => Err(err),
            JobStatus::Running => Err(HarnessError::Internal(format!(
                "job '{}' supervisor exited without a status",
                self.name
            ))),
            status => Ok(status),
        }
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.token.cancel("job handle dropped");
    }
}
