// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{ImageQuality, PageSize};

/// Environment variable overriding [`AppConfig::temp_root`].
pub const TEMP_DIR_ENV: &str = "BILDWERK_TEMP_DIR";

/// Process-wide settings. Every field has a default so partial JSON files
/// are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root holding the uploads, output and extraction areas.
    pub temp_root: PathBuf,
    /// How often the janitor sweeps the temp areas.
    pub sweep_interval_secs: u64,
    /// Entries last modified longer ago than this are swept.
    pub max_age_secs: u64,
    /// Delay between the end of delivery and deletion of the document.
    pub release_delay_ms: u64,
    /// Maximum number of uploads in one request.
    pub max_uploads: usize,
    /// Maximum size of one upload in bytes.
    pub max_upload_bytes: u64,
    /// Maximum uncompressed size of one archive entry in bytes.
    pub max_archive_entry_bytes: u64,
    /// Page size used when a request does not name one.
    pub default_page_size: PageSize,
    /// Quality used when a request does not name one.
    pub default_quality: ImageQuality,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir().join("bildwerk"),
            sweep_interval_secs: 60 * 60,
            max_age_secs: 60 * 60,
            release_delay_ms: 1_000,
            max_uploads: 10,
            max_upload_bytes: 50 * 1024 * 1024,
            max_archive_entry_bytes: 50 * 1024 * 1024,
            default_page_size: PageSize::A4,
            default_quality: ImageQuality::Medium,
        }
    }
}

impl AppConfig {
    /// Load a JSON config file, falling back to defaults when it is absent.
    /// The temp root can always be overridden via [`TEMP_DIR_ENV`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let data = std::fs::read_to_string(path)?;
                let parsed: Self = serde_json::from_str(&data)?;
                debug!(path = %path.display(), "config loaded");
                parsed
            }
            Some(path) => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        if let Ok(dir) = std::env::var(TEMP_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.temp_root = PathBuf::from(dir);
            }
        }

        Ok(config)
    }

    /// Persist the config as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn release_delay(&self) -> Duration {
        Duration::from_millis(self.release_delay_ms)
    }
}
