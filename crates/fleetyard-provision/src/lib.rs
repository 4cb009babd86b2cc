//! Fleetyard provisioning
//!
//! Workflows that pair ledger operations with cloud provider calls:
//!
//! ```text
//! create:    canonical name → reserve → image → create-compute
//!            → [public address] → tags → bind
//! terminate: [disassociate → release] → terminate-compute → remove
//! ```
//!
//! Nothing here rolls back. A failed provider step comes back as
//! [`ProvisionError::Provider`] naming the step, with the ledger left as it
//! was at that point.

pub mod dns;
pub mod error;
pub mod image;
pub mod lifecycle;
pub mod provisioner;

pub use dns::{DEFAULT_TTL, DnsUpserter, root_domain};
pub use error::{ProvisionError, Result, WorkflowStep};
pub use image::{ImageChoice, choose_image, resolve_image};
pub use lifecycle::Lifecycle;
pub use provisioner::{DeploymentRequest, NAME_TAG_KEY, ProvisionSettings, Provisioner};
