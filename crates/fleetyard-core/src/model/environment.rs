//! Environment configuration: placement containers, credential pairs and
//! DNS zone mappings.

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Current environment descriptor format version
pub const DESCRIPTOR_VERSION: u32 = 1;

/// Whether an instance must be reachable from outside the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessibility {
    Public,
    Private,
}

impl fmt::Display for Accessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessibility::Public => write!(f, "public"),
            Accessibility::Private => write!(f, "private"),
        }
    }
}

/// A placement scope inside an environment (a subnet, in provider terms)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    /// Provider subnet id
    pub id: String,

    /// Availability zone or location, used when naming instances
    pub location: String,

    /// Address block handed out by this container
    pub cidr: Ipv4Network,

    /// Reachability class served by this container
    pub accessibility: Accessibility,

    /// Name of the credential pair instances in this container use
    pub key_pair: String,

    /// Security boundary reference
    pub security_group: String,

    /// Host offset after which addresses may be allocated
    #[serde(default)]
    pub address_offset: u32,
}

/// A named credential pair
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub name: String,
    pub private_key: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("name", &self.name)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Static configuration of one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    /// Descriptor format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Environment name (e.g. "prod", "staging")
    pub name: String,

    #[serde(default)]
    pub containers: Vec<ContainerDescriptor>,

    #[serde(default)]
    pub key_pairs: Vec<KeyPair>,

    /// Root domain -> DNS zone id
    #[serde(default)]
    pub domain_zones: BTreeMap<String, String>,
}

fn default_version() -> u32 {
    DESCRIPTOR_VERSION
}

impl EnvironmentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: DESCRIPTOR_VERSION,
            name: name.into(),
            containers: Vec::new(),
            key_pairs: Vec::new(),
            domain_zones: BTreeMap::new(),
        }
    }

    pub fn with_container(mut self, container: ContainerDescriptor) -> Self {
        self.containers.push(container);
        self
    }

    pub fn with_key_pair(mut self, name: impl Into<String>, private_key: impl Into<String>) -> Self {
        self.key_pairs.push(KeyPair {
            name: name.into(),
            private_key: private_key.into(),
        });
        self
    }

    pub fn with_domain_zone(
        mut self,
        root_domain: impl Into<String>,
        zone_id: impl Into<String>,
    ) -> Self {
        self.domain_zones.insert(root_domain.into(), zone_id.into());
        self
    }

    /// First container serving the given accessibility class
    pub fn container_for(&self, accessibility: Accessibility) -> Option<&ContainerDescriptor> {
        self.containers
            .iter()
            .find(|c| c.accessibility == accessibility)
    }

    pub fn container(&self, id: &str) -> Option<&ContainerDescriptor> {
        self.containers.iter().find(|c| c.id == id)
    }

    pub fn key_pair(&self, name: &str) -> Option<&KeyPair> {
        self.key_pairs.iter().find(|k| k.name == name)
    }

    pub fn zone_id(&self, root_domain: &str) -> Option<&str> {
        self.domain_zones.get(root_domain).map(String::as_str)
    }
}
