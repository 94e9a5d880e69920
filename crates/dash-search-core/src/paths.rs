//! XDG Base Directory Spec compliant path resolution.
//!
//! Preferences are client-side state, so they live under the state
//! directory:
//! - `$XDG_STATE_HOME/dash-search/` when set
//! - `~/.local/state/dash-search/` otherwise
//! - `%LOCALAPPDATA%/dash-search/` on Windows

use std::path::PathBuf;

const APP_DIR: &str = "dash-search";

/// Returns the state directory for dash-search.
#[must_use]
pub fn state_dir() -> PathBuf {
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME")
        && !xdg_state.is_empty()
    {
        return PathBuf::from(xdg_state).join(APP_DIR);
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            return local_app_data.join(APP_DIR);
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Some(home) = dirs::home_dir() {
            return home.join(".local").join("state").join(APP_DIR);
        }
    }

    PathBuf::from(".local/state").join(APP_DIR)
}

/// Default location of the preference file.
#[must_use]
pub fn default_prefs_path() -> PathBuf {
    state_dir().join("preferences.json")
}
