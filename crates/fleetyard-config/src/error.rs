use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine the user configuration directory")]
    ConfigDirNotFound,

    #[error(
        "No settings file found. Looked for:\n\
        - current directory: fleetyard.local.yaml, .fleetyard.local.yaml, fleetyard.yaml, .fleetyard.yaml\n\
        - the ./.fleetyard/ directory\n\
        - ~/.config/fleetyard/fleetyard.yaml\n\
        Set FLEETYARD_CONFIG_PATH to point at a file directly"
    )]
    SettingsFileNotFound,

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid settings: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
