use colored::Colorize;
use fleetyard_core::{EnvironmentDescriptor, Package};
use fleetyard_ledger::FleetLedger;
use std::net::Ipv4Addr;
use std::path::Path;

pub async fn register(ledger: &FleetLedger, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;

    // YAML is a superset of JSON, so one parser covers both
    let descriptor: EnvironmentDescriptor = serde_yaml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", file.display(), e))?;

    ledger.register_environment(&descriptor).await?;
    println!(
        "{} environment {} ({} containers, {} zones)",
        "✓".green(),
        descriptor.name.cyan(),
        descriptor.containers.len(),
        descriptor.domain_zones.len()
    );
    Ok(())
}

pub async fn deployed(
    ledger: &FleetLedger,
    environment: &str,
    id: &str,
    package: &str,
    version: &str,
) -> anyhow::Result<()> {
    let package = Package::new(package, version);
    ledger
        .record_package_deployed(environment, id, &package)
        .await?;
    println!("{} {} deployed on {}", "✓".green(), package, id.cyan());
    Ok(())
}

pub async fn forget(ledger: &FleetLedger, environment: &str, id: &str) -> anyhow::Result<()> {
    match ledger.remove_instance(environment, id).await? {
        Some(record) => println!(
            "{} forgot {} ({})",
            "✓".green(),
            id.cyan(),
            record.private_address
        ),
        None => println!("{}", format!("{} was not tracked", id).dimmed()),
    }
    Ok(())
}

pub async fn release(
    ledger: &FleetLedger,
    environment: &str,
    address: Ipv4Addr,
) -> anyhow::Result<()> {
    match ledger.release_reservation(environment, address).await? {
        Some(record) => println!(
            "{} released {} ({})",
            "✓".green(),
            address.to_string().cyan(),
            record.requested_name.as_deref().unwrap_or("-")
        ),
        None => println!("{}", format!("{} was not reserved", address).dimmed()),
    }
    Ok(())
}
