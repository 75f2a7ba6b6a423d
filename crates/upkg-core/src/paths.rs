//! Per-user directories.

use dirs::home_dir;
use std::path::PathBuf;

/// Returns the upkg home directory (`UPKG_HOME`, else `~/.upkg`), or None
/// if the user's home cannot be resolved.
pub fn try_upkg_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("UPKG_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".upkg"))
}

/// User settings path: ~/.upkg/settings.toml
pub fn settings_path() -> Option<PathBuf> {
    try_upkg_home().map(|home| home.join("settings.toml"))
}
