// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Temp-area management.
//
// Every file Bildwerk writes lives in one of three areas under a common root:
//
//   <root>/uploads   staged request uploads
//   <root>/output    generated PDFs awaiting delivery
//   <root>/extract   per-archive scratch directories
//
// Entries are normally released by their owner. The age-based sweep catches
// whatever is left behind by crashes or aborted requests.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bildwerk_core::config::AppConfig;
use bildwerk_core::error::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// One of the directories under the temp root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TempArea {
    Uploads,
    Output,
    Extraction,
}

impl TempArea {
    pub const ALL: [TempArea; 3] = [TempArea::Uploads, TempArea::Output, TempArea::Extraction];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Uploads => "uploads",
            Self::Output => "output",
            Self::Extraction => "extract",
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

/// Owns the temp root and everything under it.
#[derive(Debug, Clone)]
pub struct TempResourceManager {
    root: PathBuf,
    max_age: Duration,
}

impl TempResourceManager {
    pub fn new(root: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            root: root.into(),
            max_age,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.temp_root.clone(), config.max_age())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn area(&self, area: TempArea) -> PathBuf {
        self.root.join(area.dir_name())
    }

    /// Create the three areas. Safe to call repeatedly.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn ensure_layout(&self) -> Result<()> {
        for area in TempArea::ALL {
            std::fs::create_dir_all(self.area(area))?;
        }
        debug!("temp layout ready");
        Ok(())
    }

    /// A fresh path `<prefix>_<epoch-ms>_<uuid>.<extension>` inside `area`.
    /// Nothing is created on disk.
    pub fn unique_path(&self, area: TempArea, prefix: &str, extension: &str) -> PathBuf {
        let name = format!(
            "{}_{}_{}.{}",
            prefix,
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            extension
        );
        self.area(area).join(name)
    }

    /// Sweep against the current wall clock.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now())
    }

    /// Remove every entry directly under each area whose last modification
    /// is more than `max_age` before `now`. Directories are removed with
    /// their contents. Failures are logged and counted; the sweep goes on.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        for area in TempArea::ALL {
            let dir = self.area(area);
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(area = area.dir_name(), error = %e, "cannot list temp area");
                    report.failed += 1;
                    continue;
                }
            };

            for entry in entries {
                let path = match entry {
                    Ok(entry) => entry.path(),
                    Err(e) => {
                        warn!(area = area.dir_name(), error = %e, "unreadable temp entry");
                        report.failed += 1;
                        continue;
                    }
                };

                match self.is_stale(&path, now) {
                    Ok(false) => {}
                    Ok(true) => match remove_path(&path) {
                        Ok(()) => {
                            debug!(path = %path.display(), "stale temp entry removed");
                            report.removed += 1;
                        }
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "failed to remove stale entry");
                            report.failed += 1;
                        }
                    },
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "cannot stat temp entry");
                        report.failed += 1;
                    }
                }
            }
        }

        if report.removed > 0 || report.failed > 0 {
            info!(
                removed = report.removed,
                failed = report.failed,
                "Temp sweep finished"
            );
        }
        report
    }

    fn is_stale(&self, path: &Path, now: SystemTime) -> std::io::Result<bool> {
        let modified = std::fs::symlink_metadata(path)?.modified()?;
        // Entries stamped in the future count as fresh.
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        Ok(age > self.max_age)
    }

    /// Delete one artifact (file or directory) now. A path that is already
    /// gone is not an error.
    pub fn release(&self, path: &Path) -> Result<()> {
        match remove_path(path) {
            Ok(()) => {
                debug!(path = %path.display(), "temp artifact released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Release `path` once `delay` has elapsed. Must be called from within a
    /// tokio runtime.
    pub fn release_after(self: &Arc<Self>, path: PathBuf, delay: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = manager.release(&path) {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "deferred release failed, leaving it to the janitor"
                );
            }
        })
    }
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    if std::fs::symlink_metadata(path)?.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}
