//! Fleetyard core
//!
//! Shared vocabulary for the fleet ledger and the provisioning workflows:
//!
//! - [`model`]: environments, placement containers, instance records
//! - [`namer`]: canonical instance and volume names
//! - [`sizing`]: capacity request -> concrete instance type

pub mod error;
pub mod model;
pub mod namer;
pub mod sizing;

pub use error::{CoreError, Result};
pub use model::*;
pub use namer::{instance_name, volume_name};
pub use sizing::{
    CapacityRequest, InstanceTypeEntry, InstanceTypeResolver, InstanceTypeTable, OsSku,
};
