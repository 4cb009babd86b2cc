//! Tracked instance records

use super::image::ImageSelector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

/// A software package an instance is expected to run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub version: String,
}

impl Package {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// Deployment status of one package on one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    NotYetDeployed,
    DeployedSuccessfully,
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageStatus::NotYetDeployed => write!(f, "not-yet-deployed"),
            PackageStatus::DeployedSuccessfully => write!(f, "deployed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub version: String,
    pub status: PackageStatus,
}

/// A publicly reachable address together with the handle needed to release it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAddress {
    pub address: Ipv4Addr,
    pub allocation_id: String,
}

/// Where a record sits in the reserve/bind protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPhase {
    /// Address and placement allocated, provider has not returned an id yet
    Reserved,
    /// Matched to a provider instance
    Bound,
}

/// Storage key of a record: provider id once bound, private address before
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKey {
    Id(String),
    Address(Ipv4Addr),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Id(id) => write!(f, "{}", id),
            RecordKey::Address(addr) => write!(f, "{}", addr),
        }
    }
}

/// The ledger's view of one compute instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Provider-assigned id, absent while reserved
    #[serde(default)]
    pub id: Option<String>,

    /// Canonical name, set on bind
    #[serde(default)]
    pub name: Option<String>,

    /// Name claimed by the reservation that created this record
    #[serde(default)]
    pub requested_name: Option<String>,

    pub environment: String,

    /// Container (subnet) the instance was placed in
    pub container_id: String,

    pub private_address: Ipv4Addr,

    #[serde(default)]
    pub public_address: Option<PublicAddress>,

    /// Concrete instance type (SKU)
    #[serde(default)]
    pub instance_type: Option<String>,

    pub image: ImageSelector,

    /// Image the provider actually booted
    #[serde(default)]
    pub image_id: Option<String>,

    #[serde(default)]
    pub volumes: Vec<String>,

    /// Package id -> deployment state
    #[serde(default)]
    pub packages: BTreeMap<String, PackageEntry>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstanceRecord {
    /// Pre-creation record for a freshly allocated address
    pub fn reserved(
        environment: impl Into<String>,
        container_id: impl Into<String>,
        private_address: Ipv4Addr,
        image: ImageSelector,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: None,
            requested_name: None,
            environment: environment.into(),
            container_id: container_id.into(),
            private_address,
            public_address: None,
            instance_type: None,
            image,
            image_id: None,
            volumes: Vec::new(),
            packages: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_requested_name(mut self, name: impl Into<String>) -> Self {
        self.requested_name = Some(name.into());
        self
    }

    /// Track the given packages as not yet deployed
    pub fn with_packages<'a>(mut self, packages: impl IntoIterator<Item = &'a Package>) -> Self {
        for package in packages {
            self.packages.insert(
                package.id.clone(),
                PackageEntry {
                    version: package.version.clone(),
                    status: PackageStatus::NotYetDeployed,
                },
            );
        }
        self
    }

    pub fn phase(&self) -> RecordPhase {
        if self.id.is_some() {
            RecordPhase::Bound
        } else {
            RecordPhase::Reserved
        }
    }

    pub fn storage_key(&self) -> RecordKey {
        match &self.id {
            Some(id) => RecordKey::Id(id.clone()),
            None => RecordKey::Address(self.private_address),
        }
    }

    /// Name this record answers to: the bound name, else the reservation claim
    pub fn claimed_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.requested_name.as_deref())
    }

    /// Mark a package deployed. Returns true if anything changed.
    pub fn mark_deployed(&mut self, package: &Package) -> bool {
        let changed = match self.packages.get_mut(&package.id) {
            Some(entry) if entry.status == PackageStatus::DeployedSuccessfully => false,
            Some(entry) => {
                entry.status = PackageStatus::DeployedSuccessfully;
                true
            }
            None => {
                self.packages.insert(
                    package.id.clone(),
                    PackageEntry {
                        version: package.version.clone(),
                        status: PackageStatus::DeployedSuccessfully,
                    },
                );
                true
            }
        };
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }

    pub fn has_any_package(&self, package_ids: &[&str]) -> bool {
        package_ids.iter().any(|id| self.packages.contains_key(*id))
    }

    /// Fold a provider description into this reservation
    pub fn bind(&mut self, bound: BoundInstance) {
        self.id = Some(bound.id);
        self.name = Some(bound.name);
        self.requested_name = None;
        self.public_address = bound.public_address;
        self.instance_type = Some(bound.instance_type);
        self.image_id = Some(bound.image_id);
        self.volumes = bound.volumes;
        self.updated_at = Utc::now();
    }
}

/// Provider-side description of a materialized instance, used to bind a
/// reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundInstance {
    pub id: String,
    pub name: String,
    pub private_address: Ipv4Addr,
    pub public_address: Option<PublicAddress>,
    pub instance_type: String,
    pub image_id: String,
    pub volumes: Vec<String>,
}
