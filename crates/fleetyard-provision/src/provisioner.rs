//! Provisioning workflows
//!
//! Each workflow is a straight sequence of ledger and provider calls. There
//! is no rollback: when a provider step fails the error names the step and
//! the ledger is left in whatever intermediate state it reached, so an
//! operator can reconcile by hand.

use crate::dns::DnsUpserter;
use crate::error::{ProvisionError, Result, WorkflowStep};
use crate::image::resolve_image;
use crate::lifecycle::Lifecycle;
use fleetyard_cloud::{
    CloudError, CloudProvider, ComputeFilter, ComputeSpec, ComputeSummary, InstanceStatus,
    PowerState, RetryConfig, VolumeSpec,
};
use fleetyard_core::{
    BoundInstance, CapacityRequest, DeploymentConfig, InstanceRecord, InstanceTypeResolver,
    Package, PublicAddress, namer,
};
use fleetyard_ledger::{FleetLedger, LedgerError, Reservation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Tag carrying the canonical instance name
pub const NAME_TAG_KEY: &str = "Name";

#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    /// Tag key identifying the environment an instance belongs to
    pub environment_tag_key: String,

    /// Polling schedule for power-state waits
    pub wait: RetryConfig,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            environment_tag_key: "Environment".to_string(),
            wait: RetryConfig::default(),
        }
    }
}

/// A create request: what to launch and which packages it will carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub config: DeploymentConfig,

    #[serde(default)]
    pub packages: Vec<Package>,
}

impl DeploymentRequest {
    pub fn new(config: DeploymentConfig) -> Self {
        Self {
            config,
            packages: Vec::new(),
        }
    }

    pub fn with_package(mut self, package: Package) -> Self {
        self.packages.push(package);
        self
    }
}

pub struct Provisioner {
    ledger: Arc<FleetLedger>,
    provider: Arc<dyn CloudProvider>,
    resolver: InstanceTypeResolver,
    settings: ProvisionSettings,
}

impl Provisioner {
    pub fn new(ledger: Arc<FleetLedger>, provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            ledger,
            provider,
            resolver: InstanceTypeResolver::default(),
            settings: ProvisionSettings::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: InstanceTypeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_settings(mut self, settings: ProvisionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn ledger(&self) -> &Arc<FleetLedger> {
        &self.ledger
    }

    pub fn settings(&self) -> &ProvisionSettings {
        &self.settings
    }

    /// DNS upserter sharing this provisioner's ledger and provider
    pub fn dns(&self) -> DnsUpserter {
        DnsUpserter::new(self.ledger.clone(), self.provider.clone())
    }

    /// Reserve, materialize and bind a new instance
    pub async fn create(
        &self,
        environment: &str,
        request: &DeploymentRequest,
    ) -> Result<InstanceRecord> {
        let config = &request.config;

        let name = self.ledger.canonical_name(environment, config).await?;
        if let Some(existing) = self.ledger.find_by_name(environment, &name).await? {
            debug!("[{}] {} already bound to {}", environment, name, existing);
            return Err(LedgerError::DuplicateName {
                environment: environment.to_string(),
                name,
            }
            .into());
        }

        // Configuration errors must surface before anything is reserved
        let instance_type = self.resolver.resolve(&config.capacity)?;
        for volume in &config.volumes {
            namer::check_drive_letter(volume.drive_letter)?;
        }

        let reservation = self
            .ledger
            .reserve_instance(environment, config, &request.packages)
            .await?;
        entering(environment, &name, Lifecycle::Reserved);

        let result = self
            .materialize(environment, config, &reservation, &instance_type)
            .await;
        let bound = match result {
            Ok(bound) => bound,
            Err(e) => {
                warn!(
                    "[{}] creating {} failed, reservation for {} left in the ledger: {}",
                    environment, reservation.name, reservation.private_address, e
                );
                return Err(e);
            }
        };

        let id = bound.id.clone();
        let record = self.ledger.bind_instance(environment, bound).await?;
        entering(environment, &id, Lifecycle::Bound);

        info!(
            "[{}] created {} ({}) at {} as {}",
            environment,
            record.name.as_deref().unwrap_or_default(),
            id,
            record.private_address,
            instance_type
        );
        Ok(record)
    }

    async fn materialize(
        &self,
        environment: &str,
        config: &DeploymentConfig,
        reservation: &Reservation,
        instance_type: &str,
    ) -> Result<BoundInstance> {
        let name = &reservation.name;
        let image_id = resolve_image(self.provider.as_ref(), environment, &reservation.image).await?;

        let volumes = config
            .volumes
            .iter()
            .map(|volume| {
                let volume_name = namer::volume_name(
                    &config.base_name,
                    environment,
                    volume.drive_letter,
                    reservation.location(),
                )?;
                Ok(VolumeSpec {
                    name: volume_name,
                    device: format!("/dev/xvd{}", volume.drive_letter.to_ascii_lowercase()),
                    size_gib: volume.size_gib,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let spec = ComputeSpec {
            name: name.clone(),
            image_id: image_id.clone(),
            instance_type: instance_type.to_string(),
            subnet_id: reservation.subnet_id().to_string(),
            private_address: reservation.private_address,
            key_pair: reservation.key_pair().to_string(),
            security_group: reservation.security_group().to_string(),
            volumes,
        };

        entering(environment, name, Lifecycle::Materializing);
        let summary = self.provider.create_compute(&spec).await.map_err(|source| {
            ProvisionError::provider(WorkflowStep::CreateCompute, environment, name, source)
        })?;
        let id = summary.id.clone();
        debug!("[{}] {} materialized as {}", environment, name, id);

        let public_address = if config.wants_public_address() {
            Some(self.attach_public_address(environment, &id).await?)
        } else {
            None
        };

        self.tag(environment, &id, &self.settings.environment_tag_key, environment)
            .await?;
        self.tag(environment, &id, NAME_TAG_KEY, name).await?;
        for (key, value) in &config.tags {
            self.tag(environment, &id, key, value).await?;
        }

        Ok(BoundInstance {
            id,
            name: name.clone(),
            private_address: summary
                .private_address
                .unwrap_or(reservation.private_address),
            public_address,
            instance_type: instance_type.to_string(),
            image_id,
            volumes: spec.volumes.into_iter().map(|v| v.name).collect(),
        })
    }

    async fn attach_public_address(&self, environment: &str, id: &str) -> Result<PublicAddress> {
        let address = self.provider.allocate_public_address().await.map_err(|source| {
            ProvisionError::provider(WorkflowStep::AllocatePublicAddress, environment, id, source)
        })?;

        if let Err(source) = self.provider.associate_public_address(id, &address).await {
            warn!(
                "[{}] public address {} ({}) allocated but not associated with {}",
                environment, address.address, address.allocation_id, id
            );
            return Err(ProvisionError::provider(
                WorkflowStep::AssociatePublicAddress,
                environment,
                id,
                source,
            ));
        }

        debug!("[{}] {} reachable at {}", environment, id, address.address);
        Ok(address)
    }

    async fn tag(&self, environment: &str, id: &str, key: &str, value: &str) -> Result<()> {
        self.provider
            .tag_compute(id, key, value)
            .await
            .map_err(|source| {
                ProvisionError::provider(
                    WorkflowStep::TagCompute,
                    environment,
                    format!("{} ({}={})", id, key, value),
                    source,
                )
            })
    }

    /// Tear down a tracked instance and forget it
    pub async fn terminate(
        &self,
        environment: &str,
        id: &str,
        release_public_address: bool,
    ) -> Result<InstanceRecord> {
        let record = self.tracked(environment, id).await?;
        entering(environment, id, Lifecycle::Terminating);

        let mut disassociated = false;
        if let Some(public) = &record.public_address {
            self.provider
                .disassociate_public_address(id, public)
                .await
                .map_err(|source| {
                    ProvisionError::provider(
                        WorkflowStep::DisassociatePublicAddress,
                        environment,
                        id,
                        source,
                    )
                })?;
            disassociated = true;
            debug!("[{}] {} detached from {}", environment, public.address, id);

            if release_public_address {
                if let Err(source) = self.provider.release_public_address(public).await {
                    error!(
                        alert = true,
                        "[{}] {} is detached from {} but was not released; ledger still tracks it",
                        environment,
                        public.address,
                        id
                    );
                    return Err(ProvisionError::provider(
                        WorkflowStep::ReleasePublicAddress,
                        environment,
                        public.address,
                        source,
                    ));
                }
                debug!("[{}] released {}", environment, public.address);
            }
        }

        if let Err(source) = self.provider.terminate_compute(id).await {
            if disassociated {
                error!(
                    alert = true,
                    "[{}] {} lost its public address but was not terminated; ledger and provider disagree",
                    environment,
                    id
                );
            }
            return Err(ProvisionError::provider(
                WorkflowStep::TerminateCompute,
                environment,
                id,
                source,
            ));
        }

        let removed = self.ledger.remove_instance(environment, id).await?;
        entering(environment, id, Lifecycle::Gone);
        info!("[{}] terminated {}", environment, id);
        Ok(removed.unwrap_or(record))
    }

    /// Stop an instance, optionally waiting until the provider reports it stopped
    pub async fn power_off(
        &self,
        environment: &str,
        id: &str,
        wait: bool,
    ) -> Result<Option<InstanceStatus>> {
        self.tracked(environment, id).await?;

        self.provider.stop_compute(id).await.map_err(|source| {
            ProvisionError::provider(WorkflowStep::StopCompute, environment, id, source)
        })?;
        entering(environment, id, Lifecycle::Stopped);
        info!("[{}] stop requested for {}", environment, id);

        if !wait {
            return Ok(None);
        }
        self.wait_for(environment, id, PowerState::Stopped, false)
            .await
            .map(Some)
    }

    /// Start an instance, optionally waiting until it runs with passing checks
    pub async fn power_on(
        &self,
        environment: &str,
        id: &str,
        wait: bool,
    ) -> Result<Option<InstanceStatus>> {
        self.tracked(environment, id).await?;

        self.provider.start_compute(id).await.map_err(|source| {
            ProvisionError::provider(WorkflowStep::StartCompute, environment, id, source)
        })?;
        entering(environment, id, Lifecycle::Running);
        info!("[{}] start requested for {}", environment, id);

        if !wait {
            return Ok(None);
        }
        self.wait_for(environment, id, PowerState::Running, true)
            .await
            .map(Some)
    }

    async fn wait_for(
        &self,
        environment: &str,
        id: &str,
        target: PowerState,
        require_checks: bool,
    ) -> Result<InstanceStatus> {
        self.provider
            .wait_for_power_state(id, target, require_checks, &self.settings.wait)
            .await
            .map_err(|source| match source {
                CloudError::Timeout(reason) => ProvisionError::WaitTimeout {
                    environment: environment.to_string(),
                    id: id.to_string(),
                    target,
                    reason,
                },
                other => ProvisionError::provider(
                    WorkflowStep::WaitForPowerState,
                    environment,
                    id,
                    other,
                ),
            })
    }

    /// Resize an instance to fit a new capacity request.
    ///
    /// The ledger keeps the previous instance type; re-describe from the
    /// provider when the new one matters.
    pub async fn change_type(
        &self,
        environment: &str,
        id: &str,
        capacity: &CapacityRequest,
    ) -> Result<String> {
        self.tracked(environment, id).await?;
        let instance_type = self.resolver.resolve(capacity)?;

        self.provider
            .resize_compute(id, &instance_type)
            .await
            .map_err(|source| {
                ProvisionError::provider(WorkflowStep::ResizeCompute, environment, id, source)
            })?;

        info!("[{}] {} resized to {}", environment, id, instance_type);
        Ok(instance_type)
    }

    /// Tracked record for an instance
    pub async fn describe(&self, environment: &str, id: &str) -> Result<Option<InstanceRecord>> {
        Ok(self.ledger.find_by_id(environment, id).await?)
    }

    /// Live provider inventory for an environment, terminated instances excluded
    pub async fn describe_live(&self, environment: &str) -> Result<Vec<ComputeSummary>> {
        let filter =
            ComputeFilter::new().with_tag(self.settings.environment_tag_key.clone(), environment);
        let instances = self.provider.list_compute(&filter).await.map_err(|source| {
            ProvisionError::provider(WorkflowStep::ListCompute, environment, "inventory", source)
        })?;

        Ok(instances
            .into_iter()
            .filter(|instance| instance.state != PowerState::Terminated)
            .map(|mut instance| {
                if instance.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
                    instance.name = Some(format!("unnamed-{}", instance.id));
                }
                instance
            })
            .collect())
    }

    /// Lifecycle state of a tracked instance, as reported by the provider
    pub async fn lifecycle(&self, environment: &str, id: &str) -> Result<Lifecycle> {
        self.tracked(environment, id).await?;
        let status = self.provider.describe_status(id).await.map_err(|source| {
            ProvisionError::provider(WorkflowStep::DescribeStatus, environment, id, source)
        })?;
        Ok(Lifecycle::from_power_state(status.power_state))
    }

    async fn tracked(&self, environment: &str, id: &str) -> Result<InstanceRecord> {
        self.ledger
            .find_by_id(environment, id)
            .await?
            .ok_or_else(|| {
                LedgerError::UnknownInstance {
                    environment: environment.to_string(),
                    id: id.to_string(),
                }
                .into()
            })
    }
}

fn entering(environment: &str, target: &str, state: Lifecycle) {
    debug!("[{}] {} -> {}", environment, target, state);
}
