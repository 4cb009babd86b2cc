use colored::Colorize;
use fleetyard_config::Settings;
use fleetyard_core::{CapacityRequest, OsSku, namer};
use fleetyard_ledger::FleetLedger;
use fleetyard_provision::root_domain;

pub async fn key(ledger: &FleetLedger, environment: &str, id: &str) -> anyhow::Result<()> {
    let private_key = ledger.private_key_for(environment, id).await?;
    println!("{}", private_key);
    Ok(())
}

pub async fn zone(ledger: &FleetLedger, environment: &str, domain: &str) -> anyhow::Result<()> {
    let root = root_domain(domain)?;
    match ledger.domain_zone_id(environment, &root).await? {
        Some(zone_id) => println!("{} {}", root.cyan(), zone_id),
        None => anyhow::bail!(
            "[{}] no DNS zone configured for root domain {}",
            environment,
            root
        ),
    }
    Ok(())
}

pub fn instance_type(
    settings: &Settings,
    vcpus: u32,
    memory_gib: u64,
    sku: Option<OsSku>,
) -> anyhow::Result<()> {
    let mut request = CapacityRequest::new(vcpus, memory_gib);
    if let Some(sku) = sku {
        request = request.with_os_sku(sku);
    }
    let instance_type = settings.resolver().resolve(&request)?;
    println!("{}", instance_type);
    Ok(())
}

pub fn name(environment: &str, base: &str, location: &str) -> anyhow::Result<()> {
    println!("{}", namer::instance_name(base, environment, location)?);
    Ok(())
}

pub fn settings(settings: &Settings) -> anyhow::Result<()> {
    let provision = settings.provision_settings();
    println!("{:<22} {}", "ledger root", settings.ledger_root()?.display());
    println!(
        "{:<22} {}",
        "default environment",
        settings.default_environment.as_deref().unwrap_or("-")
    );
    println!("{:<22} {}", "environment tag key", provision.environment_tag_key);
    println!(
        "{:<22} {} attempts, {}s..{}s, x{}",
        "power-state wait",
        provision.wait.max_attempts,
        provision.wait.initial_delay.as_secs(),
        provision.wait.max_delay.as_secs(),
        provision.wait.backoff_multiplier
    );
    Ok(())
}
