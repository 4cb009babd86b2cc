mod commands;
mod utils;

use clap::{Parser, Subcommand};
use fleetyard_core::OsSku;
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "yard")]
#[command(about = "Track and inspect a fleet of cloud instances", long_about = None)]
struct Cli {
    /// Environment to operate on (falls back to default_environment in the settings file)
    #[arg(short, long, global = true, env = "FLEETYARD_ENV")]
    env: Option<String>,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an environment descriptor (YAML or JSON) in the ledger
    Register {
        /// Descriptor file
        file: PathBuf,
    },
    /// List tracked instances, reservations included
    List,
    /// Show one tracked instance
    Show {
        /// Provider instance id
        id: String,
    },
    /// Look up an instance id by canonical name
    Find {
        #[arg(short, long)]
        name: String,
    },
    /// Instances carrying any of the given package ids
    Packages {
        #[arg(required = true)]
        package_ids: Vec<String>,
    },
    /// Mark a package as deployed on an instance
    Deployed {
        id: String,
        package: String,
        version: String,
    },
    /// Stop tracking an instance
    Forget {
        id: String,
    },
    /// Drop a reservation left behind by a failed create
    Release {
        /// Private address the reservation holds
        address: Ipv4Addr,
    },
    /// Print the private key an instance was launched with
    Key {
        id: String,
    },
    /// Resolve the DNS zone for a domain
    Zone {
        domain: String,
    },
    /// Resolve a capacity request to an instance type
    InstanceType {
        #[arg(long)]
        vcpus: u32,
        #[arg(long)]
        memory_gib: u64,
        /// OS family (default, sql-server-web, sql-server-standard)
        #[arg(long)]
        sku: Option<OsSku>,
    },
    /// Canonical instance name for a base name
    Name {
        base: String,
        #[arg(short, long)]
        location: String,
    },
    /// Show the effective settings
    Settings,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose);

    if matches!(cli.command, Commands::Version) {
        println!("yard {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = fleetyard_config::Settings::load_or_default()?;

    // Commands that don't need an environment or the ledger
    match &cli.command {
        Commands::InstanceType {
            vcpus,
            memory_gib,
            sku,
        } => {
            return commands::lookup::instance_type(&settings, *vcpus, *memory_gib, *sku);
        }
        Commands::Settings => {
            return commands::lookup::settings(&settings);
        }
        Commands::Register { file } => {
            let ledger = utils::open_ledger(&settings)?;
            return commands::update::register(&ledger, file).await;
        }
        _ => {}
    }

    let environment = utils::determine_environment(cli.env, &settings)?;
    let ledger = utils::open_ledger(&settings)?;

    match cli.command {
        Commands::List => commands::records::list(&ledger, &environment).await?,
        Commands::Show { id } => commands::records::show(&ledger, &environment, &id).await?,
        Commands::Find { name } => commands::records::find(&ledger, &environment, &name).await?,
        Commands::Packages { package_ids } => {
            commands::records::packages(&ledger, &environment, &package_ids).await?
        }
        Commands::Deployed {
            id,
            package,
            version,
        } => commands::update::deployed(&ledger, &environment, &id, &package, &version).await?,
        Commands::Forget { id } => commands::update::forget(&ledger, &environment, &id).await?,
        Commands::Release { address } => {
            commands::update::release(&ledger, &environment, address).await?
        }
        Commands::Key { id } => commands::lookup::key(&ledger, &environment, &id).await?,
        Commands::Zone { domain } => {
            commands::lookup::zone(&ledger, &environment, &domain).await?
        }
        Commands::Name { base, location } => {
            commands::lookup::name(&environment, &base, &location)?
        }
        Commands::InstanceType { .. }
        | Commands::Register { .. }
        | Commands::Settings
        | Commands::Version => {}
    }

    Ok(())
}
