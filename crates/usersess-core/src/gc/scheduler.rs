//! Periodic background sweeps.

use super::{GarbageCollector, SweepReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Handle for a running gc task. Dropping it stops the task.
pub struct GcScheduler {
    abort_handle: AbortHandle,
    reports: watch::Receiver<Option<SweepReport>>,
    interval: Duration,
}

impl GcScheduler {
    /// Spawn the sweep loop on the current tokio runtime.
    ///
    /// The first sweep runs immediately. Each sweep runs on the blocking
    /// pool and the next tick is only awaited after it finished, so sweeps
    /// never overlap; ticks missed during a slow sweep are not replayed.
    pub fn start(gc: Arc<GarbageCollector>, every: Duration, max_lifetime_secs: u64) -> Self {
        let (tx, reports) = watch::channel(None);

        info!(
            interval_secs = every.as_secs(),
            max_lifetime_secs, "Starting session gc"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let gc = Arc::clone(&gc);
                match tokio::task::spawn_blocking(move || gc.try_sweep(max_lifetime_secs)).await {
                    Ok(Ok(Some(report))) => {
                        // Receivers may all be gone; the loop keeps running regardless
                        let _ = tx.send(Some(report));
                    }
                    Ok(Ok(None)) => {
                        debug!("Session gc skipped, a sweep is already running");
                    }
                    Ok(Err(e)) => {
                        error!(error = %e, "Session gc sweep failed");
                    }
                    Err(e) => {
                        error!(error = %e, "Session gc task panicked");
                    }
                }
            }
        });

        Self {
            abort_handle: handle.abort_handle(),
            reports,
            interval: every,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Latest sweep results, updated after every completed sweep
    pub fn subscribe(&self) -> watch::Receiver<Option<SweepReport>> {
        self.reports.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.abort_handle.is_finished()
    }

    /// Stop the loop. A sweep already on the blocking pool runs to completion.
    pub fn stop(&self) {
        if !self.abort_handle.is_finished() {
            info!("Stopping session gc");
            self.abort_handle.abort();
        }
    }
}

impl Drop for GcScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
