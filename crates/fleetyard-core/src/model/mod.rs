//! Fleet data model
//!
//! Environments, placement containers, tracked instance records and the
//! deployment requests that create them.

mod deployment;
mod environment;
mod image;
mod instance;

pub use deployment::*;
pub use environment::*;
pub use image::*;
pub use instance::*;
