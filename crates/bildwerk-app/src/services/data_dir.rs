// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware config location.

use std::path::PathBuf;

const CONFIG_FILE: &str = "config.json";

/// Directory holding Bildwerk's config file. Not created.
pub fn config_dir() -> PathBuf {
    config_base().join("bildwerk")
}

/// The default config file, if one has been written there.
pub fn existing_config_file() -> Option<PathBuf> {
    let path = config_dir().join(CONFIG_FILE);
    path.is_file().then_some(path)
}

fn config_base() -> PathBuf {
    // Try XDG config dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg);
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config");
    }
    // Last resort
    std::env::temp_dir()
}
