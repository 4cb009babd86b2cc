use colored::Colorize;
use fleetyard_core::{InstanceRecord, Package, PackageStatus, RecordPhase};
use fleetyard_ledger::FleetLedger;

pub async fn list(ledger: &FleetLedger, environment: &str) -> anyhow::Result<()> {
    println!("Environment: {}", environment.cyan());
    let records = ledger.records(environment).await?;
    print_table(&records);
    Ok(())
}

pub async fn show(ledger: &FleetLedger, environment: &str, id: &str) -> anyhow::Result<()> {
    let record = ledger
        .find_by_id(environment, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("[{}] instance {} is not tracked", environment, id))?;

    println!("{}", display_name(&record).bold());
    println!("  {:<16} {}", "id", record.id.as_deref().unwrap_or("-"));
    println!("  {:<16} {}", "phase", phase_label(record.phase()));
    println!("  {:<16} {}", "environment", record.environment);
    println!("  {:<16} {}", "container", record.container_id);
    println!("  {:<16} {}", "private address", record.private_address);
    if let Some(public) = &record.public_address {
        println!(
            "  {:<16} {} ({})",
            "public address", public.address, public.allocation_id
        );
    }
    println!(
        "  {:<16} {}",
        "instance type",
        record.instance_type.as_deref().unwrap_or("-")
    );
    println!(
        "  {:<16} {}",
        "image",
        record
            .image_id
            .clone()
            .unwrap_or_else(|| record.image.to_string())
    );
    if !record.volumes.is_empty() {
        println!("  {:<16} {}", "volumes", record.volumes.join(", "));
    }
    println!("  {:<16} {}", "updated", record.updated_at.to_rfc3339());

    if !record.packages.is_empty() {
        println!();
        println!("{}", "Packages".bold());
        for (id, entry) in &record.packages {
            let status = match entry.status {
                PackageStatus::DeployedSuccessfully => entry.status.to_string().green(),
                PackageStatus::NotYetDeployed => entry.status.to_string().yellow(),
            };
            println!("  {:<24} {:<12} {}", id, entry.version, status);
        }
    }
    Ok(())
}

pub async fn find(ledger: &FleetLedger, environment: &str, name: &str) -> anyhow::Result<()> {
    match ledger.find_by_name(environment, name).await? {
        Some(id) => println!("{}", id),
        None => anyhow::bail!("[{}] no bound instance named {}", environment, name),
    }
    Ok(())
}

pub async fn packages(
    ledger: &FleetLedger,
    environment: &str,
    package_ids: &[String],
) -> anyhow::Result<()> {
    // Versions are ignored by the lookup
    let packages: Vec<Package> = package_ids.iter().map(|id| Package::new(id, "")).collect();
    let records = ledger.find_by_packages(environment, &packages).await?;
    print_table(&records);
    Ok(())
}

fn print_table(records: &[InstanceRecord]) {
    println!();
    if records.is_empty() {
        println!("{}", "No instances tracked".dimmed());
        return;
    }

    println!(
        "{}",
        format!(
            "{:<22} {:<32} {:<16} {:<16} {:<12} {:<9}",
            "ID", "NAME", "PRIVATE", "PUBLIC", "TYPE", "PHASE"
        )
        .bold()
    );
    println!("{}", "─".repeat(112).dimmed());

    for record in records {
        let phase = match record.phase() {
            RecordPhase::Bound => phase_label(RecordPhase::Bound).green(),
            RecordPhase::Reserved => phase_label(RecordPhase::Reserved).yellow(),
        };
        println!(
            "{:<22} {:<32} {:<16} {:<16} {:<12} {}",
            record.id.as_deref().unwrap_or("-"),
            display_name(record),
            record.private_address.to_string(),
            record
                .public_address
                .as_ref()
                .map(|p| p.address.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.instance_type.as_deref().unwrap_or("-"),
            phase
        );
    }
}

fn display_name(record: &InstanceRecord) -> String {
    record
        .claimed_name()
        .map(str::to_string)
        .unwrap_or_else(|| record.private_address.to_string())
}

fn phase_label(phase: RecordPhase) -> &'static str {
    match phase {
        RecordPhase::Reserved => "reserved",
        RecordPhase::Bound => "bound",
    }
}
