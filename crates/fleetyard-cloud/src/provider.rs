//! Cloud provider trait definition

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetyard_core::PublicAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Cloud provider abstraction trait
///
/// The provisioning workflows only ever talk to the provider through this
/// trait: compute lifecycle, public addresses, image lookup and DNS.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "aws")
    fn name(&self) -> &str;

    /// Launch an instance; the summary must carry the private address the
    /// instance actually received
    async fn create_compute(&self, spec: &ComputeSpec) -> Result<ComputeSummary>;

    async fn terminate_compute(&self, id: &str) -> Result<()>;

    async fn start_compute(&self, id: &str) -> Result<()>;

    async fn stop_compute(&self, id: &str) -> Result<()>;

    /// Change the instance type of an existing instance
    async fn resize_compute(&self, id: &str, instance_type: &str) -> Result<()>;

    async fn tag_compute(&self, id: &str, key: &str, value: &str) -> Result<()>;

    async fn list_compute(&self, filter: &ComputeFilter) -> Result<Vec<ComputeSummary>>;

    /// Images owned by `owner` whose name matches `name_pattern`
    async fn find_images(&self, owner: &str, name_pattern: &str) -> Result<Vec<ImageSummary>>;

    async fn allocate_public_address(&self) -> Result<PublicAddress>;

    async fn associate_public_address(&self, id: &str, address: &PublicAddress) -> Result<()>;

    async fn disassociate_public_address(&self, id: &str, address: &PublicAddress)
    -> Result<()>;

    /// Return a public address to the provider's pool
    async fn release_public_address(&self, address: &PublicAddress) -> Result<()>;

    async fn describe_status(&self, id: &str) -> Result<InstanceStatus>;

    async fn upsert_dns_record(&self, location: &str, zone_id: &str, record: &DnsRecord)
    -> Result<()>;

    /// Poll until the instance reports `target` (and, when asked, passing
    /// health checks)
    async fn wait_for_power_state(
        &self,
        id: &str,
        target: PowerState,
        require_checks: bool,
        retry: &RetryConfig,
    ) -> Result<InstanceStatus> {
        let mut last = None;
        for attempt in 0..retry.max_attempts {
            let status = self.describe_status(id).await?;
            if status.power_state == target && (!require_checks || status.is_healthy()) {
                tracing::debug!("{} reached {} after {} polls", id, target, attempt + 1);
                return Ok(status);
            }
            tracing::debug!(
                "{} is {} (system: {}, instance: {}), waiting for {}",
                id,
                status.power_state,
                status.system_checks,
                status.instance_checks,
                target
            );
            last = Some(status);

            if attempt + 1 < retry.max_attempts {
                tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
            }
        }

        Err(CloudError::Timeout(format!(
            "{} did not reach {} within {} polls (last state: {})",
            id,
            target,
            retry.max_attempts,
            last.map(|s| s.power_state.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        )))
    }
}

/// Power state reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
    Unknown,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Pending => write!(f, "pending"),
            PowerState::Running => write!(f, "running"),
            PowerState::Stopping => write!(f, "stopping"),
            PowerState::Stopped => write!(f, "stopped"),
            PowerState::ShuttingDown => write!(f, "shutting-down"),
            PowerState::Terminated => write!(f, "terminated"),
            PowerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of a provider health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Impaired,
    Initializing,
    InsufficientData,
    NotApplicable,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Ok => write!(f, "ok"),
            CheckStatus::Impaired => write!(f, "impaired"),
            CheckStatus::Initializing => write!(f, "initializing"),
            CheckStatus::InsufficientData => write!(f, "insufficient-data"),
            CheckStatus::NotApplicable => write!(f, "not-applicable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub power_state: PowerState,
    pub system_checks: CheckStatus,
    pub instance_checks: CheckStatus,
}

impl InstanceStatus {
    pub fn new(power_state: PowerState) -> Self {
        Self {
            power_state,
            system_checks: CheckStatus::NotApplicable,
            instance_checks: CheckStatus::NotApplicable,
        }
    }

    pub fn healthy_running() -> Self {
        Self {
            power_state: PowerState::Running,
            system_checks: CheckStatus::Ok,
            instance_checks: CheckStatus::Ok,
        }
    }

    /// Both health checks pass
    pub fn is_healthy(&self) -> bool {
        self.system_checks == CheckStatus::Ok && self.instance_checks == CheckStatus::Ok
    }
}

/// Storage volume attached at launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    pub device: String,
    pub size_gib: u32,
}

/// Everything the provider needs to launch one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeSpec {
    pub name: String,
    pub image_id: String,
    pub instance_type: String,
    pub subnet_id: String,
    pub private_address: Ipv4Addr,
    pub key_pair: String,
    pub security_group: String,
    pub volumes: Vec<VolumeSpec>,
}

/// One instance as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeSummary {
    pub id: String,
    pub name: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub private_address: Option<Ipv4Addr>,
    pub public_address: Option<Ipv4Addr>,
    pub state: PowerState,
}

/// Tag filter for `list_compute`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputeFilter {
    pub tags: BTreeMap<String, String>,
}

impl ComputeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, summary: &ComputeSummary) -> bool {
        self.tags
            .iter()
            .all(|(k, v)| summary.tags.get(k) == Some(v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DnsRecordType {
    A,
}

impl fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DnsRecordType::A => write!(f, "A"),
        }
    }
}

/// A DNS record set to upsert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub record_type: DnsRecordType,
    pub name: String,
    pub values: Vec<String>,
    pub ttl: u32,
}

impl DnsRecord {
    pub fn a(name: impl Into<String>, addresses: &[Ipv4Addr], ttl: u32) -> Self {
        Self {
            record_type: DnsRecordType::A,
            name: name.into(),
            values: addresses.iter().map(|a| a.to_string()).collect(),
            ttl,
        }
    }
}

/// Retry configuration for provider operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 40,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given (zero-based) attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.min(32) as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}
