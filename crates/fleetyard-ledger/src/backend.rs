//! Persistence backend contract
//!
//! The ledger calls every backend method while holding the environment's
//! lock, so implementations need no locking of their own beyond what their
//! storage requires. Writes are last-writer-wins.

use crate::error::Result;
use async_trait::async_trait;
use fleetyard_core::{EnvironmentDescriptor, InstanceRecord, RecordKey};

/// Everything stored for one environment
#[derive(Debug, Clone)]
pub struct EnvironmentSnapshot {
    pub descriptor: EnvironmentDescriptor,
    pub records: Vec<InstanceRecord>,
}

#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Load the descriptor and all records of an environment
    async fn load_environment(&self, environment: &str) -> Result<EnvironmentSnapshot>;

    /// Create or replace an environment descriptor
    async fn save_descriptor(&self, descriptor: &EnvironmentDescriptor) -> Result<()>;

    /// Insert or replace the record stored under `record.storage_key()`
    async fn upsert_record(&self, environment: &str, record: &InstanceRecord) -> Result<()>;

    /// Delete a record; deleting a missing record is not an error
    async fn delete_record(&self, environment: &str, key: &RecordKey) -> Result<()>;
}
