//! Fleetyard Cloud Infrastructure
//!
//! This crate defines the cloud provider abstraction the fleet ledger and
//! the provisioning workflows are written against.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              fleetyard-provision                 │
//! │     (create / terminate / power / resize)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               fleetyard-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          Provider Abstraction             │   │
//! │  │  trait CloudProvider { ... }              │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │   provider    │  compute, public addresses, images, DNS
//! │ implementation│
//! └───────────────┘
//! ```

pub mod error;
pub mod provider;

// Re-exports
pub use error::{CloudError, Result};
pub use provider::{
    CheckStatus, CloudProvider, ComputeFilter, ComputeSpec, ComputeSummary, DnsRecord,
    DnsRecordType, ImageSummary, InstanceStatus, PowerState, RetryConfig, VolumeSpec,
};
