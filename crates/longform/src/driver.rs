//! Background driver that polls [`Orchestrator::advance`] until a job settles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info};

use crate::error::Result;
use crate::model::JobSnapshot;
use crate::pipeline::Orchestrator;

pub struct JobDriver {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl JobDriver {
    pub fn new(orchestrator: Arc<Orchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Advances the job until it is `done` or `error`, or until [`stop`](Self::stop)
    /// is called. Returns the last snapshot seen.
    pub async fn drive(&self, job_id: &str) -> Result<JobSnapshot> {
        let mut ticks = 0u32;
        loop {
            let snapshot = self.orchestrator.advance(job_id).await?;
            ticks += 1;

            if snapshot.is_terminal() {
                info!(
                    job_id,
                    status = snapshot.status.as_str(),
                    progress = snapshot.progress,
                    ticks,
                    "Job settled"
                );
                return Ok(snapshot);
            }
            // registered before the flag check so a concurrent stop() is not missed
            let woken = self.wake.notified();
            if self.is_stopped() {
                info!(job_id, step = snapshot.step.as_str(), "Driver stopped");
                return Ok(snapshot);
            }

            debug!(
                job_id,
                step = snapshot.step.as_str(),
                cursor = snapshot.cursor,
                progress = snapshot.progress,
                "Tick"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = woken => {},
            }

            if self.is_stopped() {
                info!(job_id, "Driver stopped");
                return self.orchestrator.snapshot(job_id);
            }
        }
    }

    /// Signals the driver to stop after the current call returns.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
