//! DNS A-record upserts
//!
//! Zones are looked up by registrable root domain in the environment
//! descriptor, then the record is pushed through the provider.

use crate::error::{ProvisionError, Result, WorkflowStep};
use fleetyard_cloud::{CloudProvider, DnsRecord};
use fleetyard_ledger::FleetLedger;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::info;

/// Default record TTL in seconds
pub const DEFAULT_TTL: u32 = 300;

/// Public suffixes made of more than one label
const MULTI_PART_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "me.uk", "ltd.uk", "plc.uk", "net.uk", "ac.uk", "gov.uk", "com.au",
    "net.au", "org.au", "edu.au", "gov.au", "co.nz", "net.nz", "org.nz", "co.jp", "ne.jp",
    "or.jp", "ac.jp", "go.jp", "co.za", "org.za", "co.in", "net.in", "org.in", "com.br",
    "net.br", "org.br", "com.cn", "net.cn", "org.cn", "com.mx", "com.sg", "com.tw", "com.hk",
    "co.kr", "or.kr", "com.tr", "com.ar", "co.il", "com.my",
];

/// Registrable root domain of `domain`
///
/// Takes the last two labels and keeps extending one label to the left
/// while the run is a known multi-part suffix, so `www.example.co.uk`
/// yields `example.co.uk`.
pub fn root_domain(domain: &str) -> Result<String> {
    let normalized = domain.trim().trim_end_matches('.').to_lowercase();
    let labels: Vec<&str> = normalized.split('.').collect();

    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(ProvisionError::InvalidDomain(domain.to_string()));
    }

    let suffix = |take: usize| labels[labels.len() - take..].join(".");
    let mut take = 2;
    while take < labels.len() && MULTI_PART_SUFFIXES.contains(&suffix(take).as_str()) {
        take += 1;
    }

    Ok(suffix(take))
}

pub struct DnsUpserter {
    ledger: Arc<FleetLedger>,
    provider: Arc<dyn CloudProvider>,
    ttl: u32,
}

impl DnsUpserter {
    pub fn new(ledger: Arc<FleetLedger>, provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            ledger,
            provider,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Point `domain` at `addresses`, returning the zone that was updated
    pub async fn upsert(
        &self,
        environment: &str,
        location: &str,
        domain: &str,
        addresses: &[Ipv4Addr],
    ) -> Result<String> {
        if addresses.is_empty() {
            return Err(ProvisionError::EmptyRecord(domain.to_string()));
        }

        let root = root_domain(domain)?;
        let zone_id = self
            .ledger
            .domain_zone_id(environment, &root)
            .await?
            .ok_or_else(|| ProvisionError::UnknownZone {
                environment: environment.to_string(),
                root_domain: root.clone(),
            })?;

        let name = domain.trim().trim_end_matches('.').to_lowercase();
        let record = DnsRecord::a(name.as_str(), addresses, self.ttl);
        self.provider
            .upsert_dns_record(location, &zone_id, &record)
            .await
            .map_err(|source| {
                ProvisionError::provider(WorkflowStep::UpsertDnsRecord, environment, &name, source)
            })?;

        info!(
            "[{}] {} -> {} upserted in zone {}",
            environment,
            name,
            record.values.join(", "),
            zone_id
        );
        Ok(zone_id)
    }
}
