//! Instance-type resolution
//!
//! Maps an abstract capacity request onto a concrete provider SKU. Each OS
//! family has its own table which is scanned in its configured order; the
//! first entry meeting both the core and the memory requirement wins. The
//! order of the tables is therefore significant.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// OS / licensing family an instance type table applies to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsSku {
    SqlServerWeb,
    SqlServerStandard,
    #[default]
    Default,
}

impl fmt::Display for OsSku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsSku::SqlServerWeb => write!(f, "sql-server-web"),
            OsSku::SqlServerStandard => write!(f, "sql-server-standard"),
            OsSku::Default => write!(f, "default"),
        }
    }
}

impl std::str::FromStr for OsSku {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "sql-server-web" | "sql-web" => Ok(OsSku::SqlServerWeb),
            "sql-server-standard" | "sql-standard" => Ok(OsSku::SqlServerStandard),
            "default" | "general" => Ok(OsSku::Default),
            other => Err(format!("unknown OS SKU family: {}", other)),
        }
    }
}

/// Abstract capacity an instance needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityRequest {
    pub vcpus: u32,
    pub memory_mib: u64,

    #[serde(default)]
    pub os_sku: Option<OsSku>,

    /// Concrete SKU that bypasses the tables
    #[serde(default)]
    pub instance_type: Option<String>,
}

impl CapacityRequest {
    pub fn new(vcpus: u32, memory_gib: u64) -> Self {
        Self {
            vcpus,
            memory_mib: memory_gib.saturating_mul(1024),
            os_sku: None,
            instance_type: None,
        }
    }

    pub fn explicit(instance_type: impl Into<String>) -> Self {
        Self {
            vcpus: 0,
            memory_mib: 0,
            os_sku: None,
            instance_type: Some(instance_type.into()),
        }
    }

    pub fn with_os_sku(mut self, sku: OsSku) -> Self {
        self.os_sku = Some(sku);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTypeEntry {
    pub name: String,
    pub vcpus: u32,
    pub memory_mib: u64,
}

impl InstanceTypeEntry {
    pub fn new(name: impl Into<String>, vcpus: u32, memory_gib: u64) -> Self {
        Self {
            name: name.into(),
            vcpus,
            memory_mib: memory_gib.saturating_mul(1024),
        }
    }

    fn satisfies(&self, request: &CapacityRequest) -> bool {
        self.vcpus >= request.vcpus && self.memory_mib >= request.memory_mib
    }
}

/// Ordered instance-type table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceTypeTable {
    entries: Vec<InstanceTypeEntry>,
}

impl InstanceTypeTable {
    pub fn new(entries: Vec<InstanceTypeEntry>) -> Self {
        Self { entries }
    }

    /// First entry, in table order, meeting both dimensions
    pub fn first_fit(&self, request: &CapacityRequest) -> Option<&InstanceTypeEntry> {
        self.entries.iter().find(|e| e.satisfies(request))
    }

    pub fn entries(&self) -> &[InstanceTypeEntry] {
        &self.entries
    }
}

fn mib_entry(name: &str, vcpus: u32, memory_mib: u64) -> InstanceTypeEntry {
    InstanceTypeEntry {
        name: name.to_string(),
        vcpus,
        memory_mib,
    }
}

/// General purpose table
pub fn default_table() -> InstanceTypeTable {
    InstanceTypeTable::new(vec![
        mib_entry("t3.nano", 2, 512),
        mib_entry("t3.micro", 2, 1024),
        mib_entry("t3.small", 2, 2048),
        mib_entry("t3.medium", 2, 4096),
        mib_entry("t3.large", 2, 8192),
        mib_entry("t3.xlarge", 4, 16384),
        mib_entry("t3.2xlarge", 8, 32768),
        mib_entry("m5.4xlarge", 16, 65536),
        mib_entry("m5.8xlarge", 32, 131072),
        mib_entry("m5.12xlarge", 48, 196608),
        mib_entry("m5.16xlarge", 64, 262144),
        mib_entry("m5.24xlarge", 96, 393216),
    ])
}

/// SQL Server Web edition table
pub fn sql_server_web_table() -> InstanceTypeTable {
    InstanceTypeTable::new(vec![
        mib_entry("m5.large", 2, 8192),
        mib_entry("m5.xlarge", 4, 16384),
        mib_entry("m5.2xlarge", 8, 32768),
        mib_entry("m5.4xlarge", 16, 65536),
        mib_entry("r5.8xlarge", 32, 262144),
    ])
}

/// SQL Server Standard edition table
pub fn sql_server_standard_table() -> InstanceTypeTable {
    InstanceTypeTable::new(vec![
        mib_entry("r5.large", 2, 16384),
        mib_entry("r5.xlarge", 4, 32768),
        mib_entry("r5.2xlarge", 8, 65536),
        mib_entry("r5.4xlarge", 16, 131072),
        mib_entry("r5.8xlarge", 32, 262144),
        mib_entry("r5.12xlarge", 48, 393216),
    ])
}

/// Resolves capacity requests against per-family tables
#[derive(Debug, Clone)]
pub struct InstanceTypeResolver {
    tables: HashMap<OsSku, InstanceTypeTable>,
}

impl Default for InstanceTypeResolver {
    fn default() -> Self {
        let mut tables = HashMap::new();
        tables.insert(OsSku::Default, default_table());
        tables.insert(OsSku::SqlServerWeb, sql_server_web_table());
        tables.insert(OsSku::SqlServerStandard, sql_server_standard_table());
        Self { tables }
    }
}

impl InstanceTypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the table used for one family
    pub fn with_table(mut self, sku: OsSku, table: InstanceTypeTable) -> Self {
        self.tables.insert(sku, table);
        self
    }

    pub fn table(&self, sku: OsSku) -> Option<&InstanceTypeTable> {
        self.tables.get(&sku)
    }

    pub fn resolve(&self, request: &CapacityRequest) -> Result<String> {
        if let Some(explicit) = request
            .instance_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        {
            return Ok(explicit.to_string());
        }

        let sku = request.os_sku.unwrap_or_default();
        self.tables
            .get(&sku)
            .and_then(|table| table.first_fit(request))
            .map(|entry| entry.name.clone())
            .ok_or_else(|| CoreError::UnsupportedCapacity {
                family: sku.to_string(),
                vcpus: request.vcpus,
                memory_mib: request.memory_mib,
            })
    }
}
