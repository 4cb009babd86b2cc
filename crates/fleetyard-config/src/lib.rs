pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{Settings, WaitSettings};

use std::path::PathBuf;

/// Environment variable pointing directly at a settings file
pub const CONFIG_PATH_ENV: &str = "FLEETYARD_CONFIG_PATH";

const CANDIDATES: [&str; 4] = [
    "fleetyard.local.yaml",
    ".fleetyard.local.yaml",
    "fleetyard.yaml",
    ".fleetyard.yaml",
];

/// Fleetyard's configuration directory, created on first use
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("fleetyard");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the settings file
///
/// Search order:
/// 1. `FLEETYARD_CONFIG_PATH`
/// 2. current directory: fleetyard.local.yaml, .fleetyard.local.yaml, fleetyard.yaml, .fleetyard.yaml
/// 3. the same names inside `./.fleetyard/`
/// 4. `~/.config/fleetyard/fleetyard.yaml`
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            "{} points at {}, which does not exist",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let local_dir = current_dir.join(".fleetyard");
    if local_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("fleetyard").join("fleetyard.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}
