//! In-memory document-store backend
//!
//! Documents are keyed by environment and record key. Useful for tests and
//! for embedding the ledger in a process that persists elsewhere.

use crate::backend::{EnvironmentSnapshot, PersistenceBackend};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use fleetyard_core::{EnvironmentDescriptor, InstanceRecord, RecordKey};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone)]
struct EnvironmentDocument {
    descriptor: EnvironmentDescriptor,
    records: HashMap<RecordKey, InstanceRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    environments: RwLock<HashMap<String, EnvironmentDocument>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(self, descriptor: EnvironmentDescriptor) -> Self {
        self.environments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                descriptor.name.clone(),
                EnvironmentDocument {
                    descriptor,
                    records: HashMap::new(),
                },
            );
        self
    }

    /// Number of stored records for an environment
    pub fn record_count(&self, environment: &str) -> usize {
        self.environments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(environment)
            .map(|doc| doc.records.len())
            .unwrap_or(0)
    }

    /// Raw stored record, bypassing any ledger cache
    pub fn stored_record(&self, environment: &str, key: &RecordKey) -> Option<InstanceRecord> {
        self.environments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(environment)
            .and_then(|doc| doc.records.get(key).cloned())
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn load_environment(&self, environment: &str) -> Result<EnvironmentSnapshot> {
        let environments = self
            .environments
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let doc = environments
            .get(environment)
            .ok_or_else(|| LedgerError::UnknownEnvironment(environment.to_string()))?;

        let mut records: Vec<InstanceRecord> = doc.records.values().cloned().collect();
        records.sort_by_key(|r| r.private_address);

        Ok(EnvironmentSnapshot {
            descriptor: doc.descriptor.clone(),
            records,
        })
    }

    async fn save_descriptor(&self, descriptor: &EnvironmentDescriptor) -> Result<()> {
        let mut environments = self
            .environments
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        environments
            .entry(descriptor.name.clone())
            .and_modify(|doc| doc.descriptor = descriptor.clone())
            .or_insert_with(|| EnvironmentDocument {
                descriptor: descriptor.clone(),
                records: HashMap::new(),
            });
        Ok(())
    }

    async fn upsert_record(&self, environment: &str, record: &InstanceRecord) -> Result<()> {
        let mut environments = self
            .environments
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let doc = environments
            .get_mut(environment)
            .ok_or_else(|| LedgerError::UnknownEnvironment(environment.to_string()))?;
        doc.records.insert(record.storage_key(), record.clone());
        Ok(())
    }

    async fn delete_record(&self, environment: &str, key: &RecordKey) -> Result<()> {
        let mut environments = self
            .environments
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(doc) = environments.get_mut(environment) {
            doc.records.remove(key);
        }
        Ok(())
    }
}
