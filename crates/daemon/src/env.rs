// SPDX-License-Identifier: MIT

//! Centralized environment-variable and path resolution for the daemon
//! binary, grounded on the teacher daemon's `env.rs`.

use std::path::PathBuf;

/// Resolve the directory holding persisted state: `PCGUARD_DATA_DIR` >
/// `XDG_STATE_HOME/pcguard` > `/var/lib/pcguard`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PCGUARD_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("pcguard");
    }
    PathBuf::from("/var/lib/pcguard")
}

/// Resolve the optional TOML config file path: `PCGUARD_CONFIG` env var,
/// else `/etc/pcguard/pcguard.toml` if it exists, else `None` (defaults
/// plus environment overrides only).
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PCGUARD_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let etc = PathBuf::from("/etc/pcguard/pcguard.toml");
    etc.exists().then_some(etc)
}

pub fn lock_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("pcguardd.lock")
}

pub fn signatures_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("signatures.json")
}
