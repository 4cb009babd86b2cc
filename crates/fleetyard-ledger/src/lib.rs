//! Fleetyard fleet ledger
//!
//! Tracks every instance of an environment: its placement container, private
//! address, image, optional public address and the packages it should run.
//! The ledger owns the address-allocation and name-collision rules and
//! stores its state through a [`PersistenceBackend`].
//!
//! # Reserve, then bind
//!
//! ```text
//! reserve_instance ──► record keyed by private address (no id, no name)
//!        │
//!   provider launch
//!        │
//! bind_instance ─────► record keyed by provider id, matched on address
//! ```
//!
//! # Backends
//!
//! - [`FileTreeBackend`]: one JSON file per record under `<root>/<env>/`
//! - [`MemoryBackend`]: in-process document store keyed by env + record key

pub mod backend;
pub mod error;
pub mod file_tree;
pub mod ledger;
pub mod memory;

pub use backend::{EnvironmentSnapshot, PersistenceBackend};
pub use error::{ErrorClass, LedgerError, Result};
pub use file_tree::FileTreeBackend;
pub use ledger::{FleetLedger, MAX_ADDRESS_CANDIDATES, Reservation, allocate_address};
pub use memory::MemoryBackend;
