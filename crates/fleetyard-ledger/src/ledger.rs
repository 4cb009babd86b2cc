//! The fleet ledger
//!
//! Authoritative, environment-scoped inventory of tracked instances. Each
//! environment has its own async mutex, held for the whole
//! read-modify-write of an operation including the backend round-trip, so
//! ledger operations are atomic with respect to each other. They are not
//! atomic with respect to provider calls made between them.

use crate::backend::{EnvironmentSnapshot, PersistenceBackend};
use crate::error::{LedgerError, Result};
use fleetyard_core::{
    BoundInstance, ContainerDescriptor, DeploymentConfig, EnvironmentDescriptor, ImageSelector,
    InstanceRecord, Package, RecordKey, RecordPhase, namer,
};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMappedMutexGuard, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// Candidates scanned per container when allocating an address. Blocks
/// larger than a /24 are only partially used.
pub const MAX_ADDRESS_CANDIDATES: u32 = 255;

/// Placement data handed back by a reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub environment: String,
    /// Canonical name claimed for the instance
    pub name: String,
    pub private_address: Ipv4Addr,
    pub container: ContainerDescriptor,
    pub image: ImageSelector,
}

impl Reservation {
    pub fn subnet_id(&self) -> &str {
        &self.container.id
    }

    pub fn key_pair(&self) -> &str {
        &self.container.key_pair
    }

    pub fn security_group(&self) -> &str {
        &self.container.security_group
    }

    pub fn location(&self) -> &str {
        &self.container.location
    }
}

struct EnvironmentState {
    descriptor: EnvironmentDescriptor,
    records: Vec<InstanceRecord>,
}

impl EnvironmentState {
    fn from_snapshot(environment: &str, snapshot: EnvironmentSnapshot) -> Self {
        let bound_addresses: HashSet<Ipv4Addr> = snapshot
            .records
            .iter()
            .filter(|r| r.phase() == RecordPhase::Bound)
            .map(|r| r.private_address)
            .collect();

        // A crash between writing a bound record and deleting its reservation
        // leaves both on disk; the bound one wins.
        let records = snapshot
            .records
            .into_iter()
            .filter(|r| {
                let stale = r.phase() == RecordPhase::Reserved
                    && bound_addresses.contains(&r.private_address);
                if stale {
                    warn!(
                        "[{}] dropping stale reservation for {} superseded by a bound record",
                        environment, r.private_address
                    );
                }
                !stale
            })
            .collect();

        Self {
            descriptor: snapshot.descriptor,
            records,
        }
    }

    fn used_addresses(&self) -> HashSet<Ipv4Addr> {
        self.records.iter().map(|r| r.private_address).collect()
    }

    fn name_taken(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.claimed_name() == Some(name))
    }

    fn position_by_id(&self, id: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.id.as_deref() == Some(id))
    }

    fn record_by_id(&self, id: &str) -> Option<&InstanceRecord> {
        self.records.iter().find(|r| r.id.as_deref() == Some(id))
    }
}

type EnvironmentSlot = Arc<AsyncMutex<Option<EnvironmentState>>>;
type EnvironmentGuard = OwnedMappedMutexGuard<Option<EnvironmentState>, EnvironmentState>;

/// Lowest free address in the container, scanning from just after its offset
pub fn allocate_address(
    container: &ContainerDescriptor,
    used: &HashSet<Ipv4Addr>,
) -> Option<Ipv4Addr> {
    let first = u32::from(container.cidr.network()).checked_add(container.address_offset)?;
    let broadcast = container.cidr.broadcast();

    (1..=MAX_ADDRESS_CANDIDATES)
        .map_while(|step| first.checked_add(step).map(Ipv4Addr::from))
        .take_while(|addr| container.cidr.contains(*addr) && *addr != broadcast)
        .find(|addr| !used.contains(addr))
}

pub struct FleetLedger {
    backend: Arc<dyn PersistenceBackend>,
    environments: Mutex<HashMap<String, EnvironmentSlot>>,
}

impl FleetLedger {
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            environments: Mutex::new(HashMap::new()),
        }
    }

    /// Lock an environment, loading it from the backend on first use
    async fn lock(&self, environment: &str) -> Result<EnvironmentGuard> {
        let slot = {
            let mut environments = self
                .environments
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            environments
                .entry(environment.to_string())
                .or_default()
                .clone()
        };

        let mut guard = slot.lock_owned().await;
        if guard.is_none() {
            let snapshot = self.backend.load_environment(environment).await?;
            debug!(
                "[{}] loaded {} records into the ledger",
                environment,
                snapshot.records.len()
            );
            *guard = Some(EnvironmentState::from_snapshot(environment, snapshot));
        }

        OwnedMutexGuard::try_map(guard, |state| state.as_mut()).map_err(|_| {
            LedgerError::StateError(format!("environment {} failed to load", environment))
        })
    }

    /// Store a descriptor and drop any cached state for that environment
    pub async fn register_environment(&self, descriptor: &EnvironmentDescriptor) -> Result<()> {
        let slot = {
            let mut environments = self
                .environments
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            environments
                .entry(descriptor.name.clone())
                .or_default()
                .clone()
        };

        let mut guard = slot.lock_owned().await;
        self.backend.save_descriptor(descriptor).await?;
        *guard = None;
        info!("[{}] environment registered", descriptor.name);
        Ok(())
    }

    pub async fn descriptor(&self, environment: &str) -> Result<EnvironmentDescriptor> {
        let state = self.lock(environment).await?;
        Ok(state.descriptor.clone())
    }

    /// Canonical name a deployment would receive in this environment
    pub async fn canonical_name(
        &self,
        environment: &str,
        config: &DeploymentConfig,
    ) -> Result<String> {
        let state = self.lock(environment).await?;
        let container = container_for(environment, &state.descriptor, config)?;
        Ok(namer::instance_name(
            &config.base_name,
            environment,
            &container.location,
        )?)
    }

    /// Allocate placement and an address for a new instance and persist a
    /// pre-creation record for it
    pub async fn reserve_instance(
        &self,
        environment: &str,
        config: &DeploymentConfig,
        packages: &[Package],
    ) -> Result<Reservation> {
        let mut state = self.lock(environment).await?;

        let container = container_for(environment, &state.descriptor, config)?.clone();
        let name = namer::instance_name(&config.base_name, environment, &container.location)?;
        if state.name_taken(&name) {
            return Err(LedgerError::DuplicateName {
                environment: environment.to_string(),
                name,
            });
        }

        let image = config.image.to_selector()?;

        let address = allocate_address(&container, &state.used_addresses()).ok_or_else(|| {
            error!(
                alert = true,
                "[{}] address space exhausted in container {} ({})",
                environment,
                container.id,
                container.cidr
            );
            LedgerError::AddressExhaustion {
                environment: environment.to_string(),
                container: container.id.clone(),
                cidr: container.cidr.to_string(),
                scanned: MAX_ADDRESS_CANDIDATES,
            }
        })?;

        let record = InstanceRecord::reserved(environment, &container.id, address, image.clone())
            .with_requested_name(&name)
            .with_packages(packages);
        self.backend.upsert_record(environment, &record).await?;
        state.records.push(record);

        info!(
            "[{}] reserved {} for {} in {}",
            environment, address, name, container.id
        );

        Ok(Reservation {
            environment: environment.to_string(),
            name,
            private_address: address,
            container,
            image,
        })
    }

    /// Promote the reservation holding `bound.private_address` to a bound record
    pub async fn bind_instance(
        &self,
        environment: &str,
        bound: BoundInstance,
    ) -> Result<InstanceRecord> {
        let mut state = self.lock(environment).await?;

        let index = state
            .records
            .iter()
            .position(|r| {
                r.phase() == RecordPhase::Reserved && r.private_address == bound.private_address
            })
            .ok_or_else(|| {
                error!(
                    alert = true,
                    "[{}] bind for {} ({}) found no reservation",
                    environment,
                    bound.id,
                    bound.private_address
                );
                LedgerError::UnknownReservation {
                    environment: environment.to_string(),
                    address: bound.private_address,
                }
            })?;

        let mut record = state.records[index].clone();
        let reservation_key = record.storage_key();
        record.bind(bound);

        self.backend.upsert_record(environment, &record).await?;
        self.backend
            .delete_record(environment, &reservation_key)
            .await?;
        state.records[index] = record.clone();

        info!(
            "[{}] bound {} to {}",
            environment,
            record.private_address,
            record.id.as_deref().unwrap_or_default()
        );
        Ok(record)
    }

    /// Mark a package deployed on an instance; repeated calls are no-ops
    pub async fn record_package_deployed(
        &self,
        environment: &str,
        id: &str,
        package: &Package,
    ) -> Result<()> {
        let mut state = self.lock(environment).await?;

        let index = state
            .position_by_id(id)
            .ok_or_else(|| LedgerError::UnknownInstance {
                environment: environment.to_string(),
                id: id.to_string(),
            })?;

        let mut record = state.records[index].clone();
        if !record.mark_deployed(package) {
            debug!("[{}] {} already deployed on {}", environment, package, id);
            return Ok(());
        }

        self.backend.upsert_record(environment, &record).await?;
        state.records[index] = record;
        info!("[{}] {} deployed on {}", environment, package, id);
        Ok(())
    }

    /// Forget an instance. Removing an untracked id is not an error.
    pub async fn remove_instance(
        &self,
        environment: &str,
        id: &str,
    ) -> Result<Option<InstanceRecord>> {
        let mut state = self.lock(environment).await?;

        let Some(index) = state.position_by_id(id) else {
            debug!("[{}] {} not tracked, nothing to remove", environment, id);
            return Ok(None);
        };

        self.backend
            .delete_record(environment, &RecordKey::Id(id.to_string()))
            .await?;
        let record = state.records.remove(index);
        info!("[{}] removed {}", environment, id);
        Ok(Some(record))
    }

    /// Drop a reservation that never got bound, freeing its name and address.
    /// Releasing an address nothing holds is not an error.
    pub async fn release_reservation(
        &self,
        environment: &str,
        address: Ipv4Addr,
    ) -> Result<Option<InstanceRecord>> {
        let mut state = self.lock(environment).await?;

        let Some(index) = state
            .records
            .iter()
            .position(|r| r.private_address == address)
        else {
            debug!("[{}] no reservation holds {}", environment, address);
            return Ok(None);
        };

        if let Some(id) = state.records[index].id.clone() {
            return Err(LedgerError::AddressBound {
                environment: environment.to_string(),
                address,
                id,
            });
        }

        let key = state.records[index].storage_key();
        self.backend.delete_record(environment, &key).await?;
        let record = state.records.remove(index);
        info!(
            "[{}] released reservation {} ({})",
            environment,
            address,
            record.requested_name.as_deref().unwrap_or_default()
        );
        Ok(Some(record))
    }

    /// Provider id of the bound instance with this name
    pub async fn find_by_name(&self, environment: &str, name: &str) -> Result<Option<String>> {
        let state = self.lock(environment).await?;
        Ok(state
            .records
            .iter()
            .find(|r| r.name.as_deref() == Some(name))
            .and_then(|r| r.id.clone()))
    }

    pub async fn find_by_id(&self, environment: &str, id: &str) -> Result<Option<InstanceRecord>> {
        let state = self.lock(environment).await?;
        Ok(state.record_by_id(id).cloned())
    }

    /// Records tracking at least one of the given package ids (versions ignored)
    pub async fn find_by_packages(
        &self,
        environment: &str,
        packages: &[Package],
    ) -> Result<Vec<InstanceRecord>> {
        let ids: Vec<&str> = packages.iter().map(|p| p.id.as_str()).collect();
        let state = self.lock(environment).await?;
        Ok(state
            .records
            .iter()
            .filter(|r| r.has_any_package(&ids))
            .cloned()
            .collect())
    }

    /// All records, reservations included
    pub async fn records(&self, environment: &str) -> Result<Vec<InstanceRecord>> {
        let state = self.lock(environment).await?;
        Ok(state.records.clone())
    }

    /// Private key material of the credential pair an instance was launched with
    pub async fn private_key_for(&self, environment: &str, id: &str) -> Result<String> {
        let state = self.lock(environment).await?;

        let record = state
            .record_by_id(id)
            .ok_or_else(|| LedgerError::UnknownInstance {
                environment: environment.to_string(),
                id: id.to_string(),
            })?;

        let container = state
            .descriptor
            .container(&record.container_id)
            .ok_or_else(|| {
                error!(
                    alert = true,
                    "[{}] {} references missing container {}",
                    environment,
                    id,
                    record.container_id
                );
                LedgerError::UnknownContainer {
                    environment: environment.to_string(),
                    instance: id.to_string(),
                    container: record.container_id.clone(),
                }
            })?;

        let key_pair = state
            .descriptor
            .key_pair(&container.key_pair)
            .ok_or_else(|| {
                error!(
                    alert = true,
                    "[{}] container {} references missing key pair {}",
                    environment,
                    container.id,
                    container.key_pair
                );
                LedgerError::UnknownKeyPair {
                    environment: environment.to_string(),
                    container: container.id.clone(),
                    key_pair: container.key_pair.clone(),
                }
            })?;

        Ok(key_pair.private_key.clone())
    }

    /// DNS zone configured for a root domain
    pub async fn domain_zone_id(
        &self,
        environment: &str,
        root_domain: &str,
    ) -> Result<Option<String>> {
        let state = self.lock(environment).await?;
        Ok(state.descriptor.zone_id(root_domain).map(str::to_string))
    }
}

fn container_for<'a>(
    environment: &str,
    descriptor: &'a EnvironmentDescriptor,
    config: &DeploymentConfig,
) -> Result<&'a ContainerDescriptor> {
    descriptor
        .container_for(config.accessibility)
        .ok_or_else(|| LedgerError::NoMatchingContainer {
            environment: environment.to_string(),
            accessibility: config.accessibility,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetyard_core::Accessibility;

    fn container(cidr: &str, offset: u32) -> ContainerDescriptor {
        ContainerDescriptor {
            id: "subnet-1".to_string(),
            location: "us-east-1a".to_string(),
            cidr: cidr.parse().unwrap(),
            accessibility: Accessibility::Private,
            key_pair: "deploy".to_string(),
            security_group: "sg-1".to_string(),
            address_offset: offset,
        }
    }

    #[test]
    fn test_allocate_starts_after_offset() {
        let container = container("10.0.1.0/24", 10);
        assert_eq!(
            allocate_address(&container, &HashSet::new()),
            Some(Ipv4Addr::new(10, 0, 1, 11))
        );
    }

    #[test]
    fn test_allocate_skips_used() {
        let container = container("10.0.1.0/24", 10);
        let used: HashSet<Ipv4Addr> = [Ipv4Addr::new(10, 0, 1, 11), Ipv4Addr::new(10, 0, 1, 12)]
            .into_iter()
            .collect();
        assert_eq!(
            allocate_address(&container, &used),
            Some(Ipv4Addr::new(10, 0, 1, 13))
        );
    }

    #[test]
    fn test_allocate_fills_gaps_first() {
        let container = container("10.0.1.0/24", 0);
        let used: HashSet<Ipv4Addr> = [Ipv4Addr::new(10, 0, 1, 1), Ipv4Addr::new(10, 0, 1, 3)]
            .into_iter()
            .collect();
        assert_eq!(
            allocate_address(&container, &used),
            Some(Ipv4Addr::new(10, 0, 1, 2))
        );
    }

    #[test]
    fn test_allocate_never_hands_out_broadcast() {
        let container = container("10.0.1.0/30", 0);
        let used: HashSet<Ipv4Addr> = [Ipv4Addr::new(10, 0, 1, 1), Ipv4Addr::new(10, 0, 1, 2)]
            .into_iter()
            .collect();
        assert_eq!(allocate_address(&container, &used), None);
    }

    #[test]
    fn test_allocate_is_bounded_for_large_blocks() {
        let container = container("10.0.0.0/16", 0);
        let used: HashSet<Ipv4Addr> = (1..=MAX_ADDRESS_CANDIDATES)
            .map(|i| Ipv4Addr::from(u32::from(Ipv4Addr::new(10, 0, 0, 0)) + i))
            .collect();
        assert_eq!(allocate_address(&container, &used), None);
    }
}
