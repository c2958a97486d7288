//! Path resolution for hearth
//!
//! # Environment Variables
//!
//! - `HEARTH_CONFIG` - Explicit path to the desired-state file
//! - `HEARTH_CONFIG_DIR` - Override config directory
//! - `HEARTH_STATE_DIR` - Override state directory (persisted settings)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `HEARTH_CONFIG_DIR` environment variable
//! 2. `/etc/hearth` when it exists (system-wide install)
//! 3. `XDG_CONFIG_HOME/hearth` (if set)
//! 4. `~/.config/hearth`
//!
//! For state_dir():
//! 1. `HEARTH_STATE_DIR` environment variable
//! 2. `/var/lib/hearth` when running as root
//! 3. `XDG_STATE_HOME/hearth` (if set)
//! 4. `~/.local/state/hearth`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for the desired-state file
pub const ENV_CONFIG_FILE: &str = "HEARTH_CONFIG";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "HEARTH_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "HEARTH_STATE_DIR";

const SYSTEM_CONFIG_DIR: &str = "/etc/hearth";
const SYSTEM_STATE_DIR: &str = "/var/lib/hearth";

/// File name of the desired-state document inside the config dir
pub const CONFIG_FILE_NAME: &str = "hearth.toml";

/// File name of the persisted settings inside the state dir
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Get the hearth config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {ENV_CONFIG_DIR}: {}", path.display());
        return Ok(path);
    }

    let system = Path::new(SYSTEM_CONFIG_DIR);
    if system.is_dir() {
        log::debug!("Using system config dir: {}", system.display());
        return Ok(system.to_path_buf());
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("hearth");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("hearth");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the hearth state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {ENV_STATE_DIR}: {}", path.display());
        return Ok(path);
    }

    if is_root() {
        return Ok(PathBuf::from(SYSTEM_STATE_DIR));
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("hearth");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join("hearth");
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Desired-state file: `--config`, then `HEARTH_CONFIG`, then the config dir
pub fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(file) = std::env::var(ENV_CONFIG_FILE) {
        return Ok(expand(&file));
    }
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Persisted settings file
pub fn settings_file() -> Result<PathBuf> {
    Ok(state_dir()?.join(SETTINGS_FILE_NAME))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(unix)]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}
