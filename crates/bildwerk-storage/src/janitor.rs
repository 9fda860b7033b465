// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background janitor: periodically sweeps the temp areas for stale entries.

use std::sync::Arc;
use std::time::Duration;

use bildwerk_core::error::{BildwerkError, Result};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::temp::TempResourceManager;

/// Shortest accepted sweep interval.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Runs [`TempResourceManager::sweep`] on a fixed interval until stopped.
///
/// The first sweep happens one interval after [`Janitor::start`]. Sweeps run
/// on the blocking pool since they walk the filesystem.
pub struct Janitor {
    manager: Arc<TempResourceManager>,
    interval: Duration,
    /// Notification handle used to signal the loop to exit.
    shutdown_signal: Arc<Notify>,
    /// Handle to the Tokio task running the sweep loop.
    task_handle: Option<JoinHandle<()>>,
}

impl Janitor {
    pub fn new(manager: Arc<TempResourceManager>, interval: Duration) -> Self {
        Self {
            manager,
            interval: interval.max(MIN_INTERVAL),
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// Spawn the sweep loop. Calling this while running does nothing.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            debug!("janitor already running");
            return;
        }

        let manager = Arc::clone(&self.manager);
        let shutdown = Arc::clone(&self.shutdown_signal);
        let interval = self.interval;

        self.task_handle = Some(tokio::spawn(async move {
            Self::sweep_loop(manager, shutdown, interval).await;
        }));

        info!(
            interval_secs = self.interval.as_secs_f64(),
            root = %self.manager.root().display(),
            "janitor started"
        );
    }

    /// Signal the loop to exit and wait for it. A sweep already in progress
    /// finishes first.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.task_handle.take() else {
            return Ok(());
        };

        self.shutdown_signal.notify_one();
        handle
            .await
            .map_err(|e| BildwerkError::Task(format!("janitor join: {e}")))?;

        info!("janitor stopped");
        Ok(())
    }

    async fn sweep_loop(
        manager: Arc<TempResourceManager>,
        shutdown: Arc<Notify>,
        interval: Duration,
    ) {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("janitor received shutdown signal");
                    break;
                }

                _ = ticker.tick() => {
                    let manager = Arc::clone(&manager);
                    match tokio::task::spawn_blocking(move || manager.sweep()).await {
                        Ok(report) => debug!(
                            removed = report.removed,
                            failed = report.failed,
                            "janitor sweep done"
                        ),
                        Err(e) => error!(error = %e, "janitor sweep panicked"),
                    }
                }
            }
        }
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        if self.task_handle.is_some() {
            self.shutdown_signal.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp::TempArea;

    #[tokio::test]
    async fn start_is_idempotent_and_stop_joins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = Arc::new(TempResourceManager::new(dir.path(), Duration::from_secs(3600)));
        let mut janitor = Janitor::new(manager, Duration::from_secs(3600));

        assert!(!janitor.is_running());
        janitor.start();
        janitor.start();
        assert!(janitor.is_running());

        janitor.stop().await.expect("stop");
        assert!(!janitor.is_running());
        // Stopping again is harmless.
        janitor.stop().await.expect("second stop");
    }

    #[tokio::test]
    async fn running_janitor_sweeps_stale_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = Arc::new(TempResourceManager::new(dir.path(), Duration::ZERO));
        manager.ensure_layout().expect("layout");
        let stale = manager.area(TempArea::Uploads).join("leftover");
        std::fs::write(&stale, b"x").expect("write");

        let mut janitor = Janitor::new(Arc::clone(&manager), Duration::from_millis(20));
        janitor.start();

        let deadline = Instant::now() + Duration::from_secs(5);
        while stale.exists() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        janitor.stop().await.expect("stop");

        assert!(!stale.exists(), "janitor never swept the stale upload");
    }

    #[test]
    fn zero_interval_is_clamped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = Arc::new(TempResourceManager::new(dir.path(), Duration::ZERO));
        let janitor = Janitor::new(manager, Duration::ZERO);
        assert_eq!(janitor.interval(), MIN_INTERVAL);
    }
}
