//! Settings file model
//!
//! ```yaml
//! ledger_root: /var/lib/fleetyard
//! default_environment: prod
//! environment_tag_key: Environment
//! wait:
//!   max_attempts: 40
//!   initial_delay_secs: 1
//!   max_delay_secs: 30
//!   backoff_multiplier: 2.0
//! instance_types:
//!   default:
//!     - { name: t3.medium, vcpus: 2, memory_mib: 4096 }
//!     - { name: t3.xlarge, vcpus: 4, memory_mib: 16384 }
//! ```

use crate::error::{ConfigError, Result};
use crate::{find_settings_file, get_config_dir};
use fleetyard_cloud::RetryConfig;
use fleetyard_core::{InstanceTypeResolver, InstanceTypeTable, OsSku};
use fleetyard_provision::ProvisionSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Power-state polling schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    pub max_attempts: u32,
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
    pub backoff_multiplier: f64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            max_attempts: 40,
            initial_delay_secs: 1,
            max_delay_secs: 30,
            backoff_multiplier: 2.0,
        }
    }
}

impl WaitSettings {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the file-tree ledger; defaults to `<config dir>/ledger`
    pub ledger_root: Option<PathBuf>,

    pub default_environment: Option<String>,

    pub environment_tag_key: String,

    pub wait: WaitSettings,

    /// Per-family table overrides, scanned in the order given
    pub instance_types: HashMap<OsSku, InstanceTypeTable>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ledger_root: None,
            default_environment: None,
            environment_tag_key: "Environment".to_string(),
            wait: WaitSettings::default(),
            instance_types: HashMap::new(),
        }
    }
}

impl Settings {
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        let settings: Settings =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml(&content, path)?;
        tracing::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load the file `find_settings_file` locates
    pub fn load() -> Result<Self> {
        Self::load_from(&find_settings_file()?)
    }

    /// Like [`Settings::load`], falling back to defaults when no file exists
    pub fn load_or_default() -> Result<Self> {
        match find_settings_file() {
            Ok(path) => Self::load_from(&path),
            Err(ConfigError::SettingsFileNotFound) => {
                tracing::debug!("no settings file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.environment_tag_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "environment_tag_key must not be empty".to_string(),
            ));
        }
        if self.wait.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "wait.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.wait.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "wait.backoff_multiplier must be >= 1.0, got {}",
                self.wait.backoff_multiplier
            )));
        }
        if let Some((sku, _)) = self
            .instance_types
            .iter()
            .find(|(_, table)| table.entries().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "instance_types.{} has no entries",
                sku
            )));
        }
        Ok(())
    }

    /// Ledger root, resolving the default location when unset
    pub fn ledger_root(&self) -> Result<PathBuf> {
        match &self.ledger_root {
            Some(root) => Ok(root.clone()),
            None => Ok(get_config_dir()?.join("ledger")),
        }
    }

    /// Tag key and wait schedule handed to a `Provisioner`
    pub fn provision_settings(&self) -> ProvisionSettings {
        ProvisionSettings {
            environment_tag_key: self.environment_tag_key.clone(),
            wait: self.wait.retry_config(),
        }
    }

    /// Built-in tables with this file's overrides applied
    pub fn resolver(&self) -> InstanceTypeResolver {
        self.instance_types
            .iter()
            .fold(InstanceTypeResolver::default(), |resolver, (sku, table)| {
                resolver.with_table(*sku, table.clone())
            })
    }
}
