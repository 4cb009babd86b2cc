use fleetyard_config::Settings;
use fleetyard_ledger::{FileTreeBackend, FleetLedger};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; `RUST_LOG` applies, defaulting to `info`
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Environment from `--env` / `FLEETYARD_ENV`, else the settings default
pub fn determine_environment(env: Option<String>, settings: &Settings) -> anyhow::Result<String> {
    env.or_else(|| settings.default_environment.clone())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No environment given: pass --env <name>, set FLEETYARD_ENV, or set default_environment in the settings file"
            )
        })
}

pub fn open_ledger(settings: &Settings) -> anyhow::Result<FleetLedger> {
    let root = settings.ledger_root()?;
    tracing::debug!("ledger root: {}", root.display());
    Ok(FleetLedger::new(Arc::new(FileTreeBackend::new(root))))
}
