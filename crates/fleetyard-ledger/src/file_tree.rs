//! File-tree persistence backend
//!
//! Layout under the ledger root:
//!
//! ```text
//! <root>/<environment>/environment.json
//! <root>/<environment>/instances/<provider id>.json
//! <root>/<environment>/instances/<private address>.json   (reservations)
//! ```

use crate::backend::{EnvironmentSnapshot, PersistenceBackend};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use fleetyard_core::{DESCRIPTOR_VERSION, EnvironmentDescriptor, InstanceRecord, RecordKey};
use std::path::{Path, PathBuf};
use tokio::fs;

const DESCRIPTOR_FILE: &str = "environment.json";
const INSTANCES_DIR: &str = "instances";
const RECORD_EXT: &str = "json";
const TMP_SUFFIX: &str = ".tmp";

/// Ledger backend storing one JSON file per record
pub struct FileTreeBackend {
    root: PathBuf,
}

impl FileTreeBackend {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn environment_dir(&self, environment: &str) -> Result<PathBuf> {
        check_path_segment(environment)
            .map_err(|_| LedgerError::InvalidEnvironment(environment.to_string()))?;
        Ok(self.root.join(environment))
    }

    fn descriptor_path(&self, environment: &str) -> Result<PathBuf> {
        Ok(self.environment_dir(environment)?.join(DESCRIPTOR_FILE))
    }

    fn instances_dir(&self, environment: &str) -> Result<PathBuf> {
        Ok(self.environment_dir(environment)?.join(INSTANCES_DIR))
    }

    fn record_path(&self, environment: &str, key: &RecordKey) -> Result<PathBuf> {
        let stem = key.to_string();
        check_path_segment(&stem).map_err(|reason| {
            LedgerError::StateError(format!("record key '{}' {}", stem, reason))
        })?;
        Ok(self
            .instances_dir(environment)?
            .join(format!("{}.{}", stem, RECORD_EXT)))
    }

    /// Ensure a directory exists
    async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        if !dir.exists() {
            fs::create_dir_all(dir).await?;
            tracing::debug!("Created ledger directory: {}", dir.display());
        }
        Ok(())
    }

    async fn load_records(&self, environment: &str) -> Result<Vec<InstanceRecord>> {
        let dir = self.instances_dir(environment)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            let record: InstanceRecord = serde_json::from_str(&content).map_err(|e| {
                LedgerError::StateError(format!("{}: {}", path.display(), e))
            })?;
            records.push(record);
        }

        records.sort_by_key(|r| r.private_address);
        Ok(records)
    }
}

/// Write via a sibling temp file so readers never see a half-written file
async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

fn check_path_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("is empty");
    }
    if segment == "." || segment == ".." {
        return Err("is a relative path component");
    }
    if segment.contains(['/', '\\', '\0']) {
        return Err("contains a path separator");
    }
    Ok(())
}

#[async_trait]
impl PersistenceBackend for FileTreeBackend {
    async fn load_environment(&self, environment: &str) -> Result<EnvironmentSnapshot> {
        let path = self.descriptor_path(environment)?;
        if !path.exists() {
            return Err(LedgerError::UnknownEnvironment(environment.to_string()));
        }

        let content = fs::read_to_string(&path).await?;
        let descriptor: EnvironmentDescriptor = serde_json::from_str(&content)?;

        // Version check
        if descriptor.version > DESCRIPTOR_VERSION {
            return Err(LedgerError::StateError(format!(
                "Environment descriptor version {} is newer than supported version {}",
                descriptor.version, DESCRIPTOR_VERSION
            )));
        }

        let records = self.load_records(environment).await?;
        tracing::debug!(
            "Loaded environment {} with {} records",
            environment,
            records.len()
        );

        Ok(EnvironmentSnapshot {
            descriptor,
            records,
        })
    }

    async fn save_descriptor(&self, descriptor: &EnvironmentDescriptor) -> Result<()> {
        let dir = self.environment_dir(&descriptor.name)?;
        self.ensure_dir(&dir).await?;

        let content = serde_json::to_string_pretty(descriptor)?;
        write_atomic(&dir.join(DESCRIPTOR_FILE), &content).await?;

        tracing::debug!("Saved environment descriptor {}", descriptor.name);
        Ok(())
    }

    async fn upsert_record(&self, environment: &str, record: &InstanceRecord) -> Result<()> {
        let path = self.record_path(environment, &record.storage_key())?;
        self.ensure_dir(&self.instances_dir(environment)?).await?;

        let content = serde_json::to_string_pretty(record)?;
        write_atomic(&path, &content).await?;

        tracing::debug!("Saved record {}", path.display());
        Ok(())
    }

    async fn delete_record(&self, environment: &str, key: &RecordKey) -> Result<()> {
        let path = self.record_path(environment, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Deleted record {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetyard_core::ImageSelector;
    use std::net::Ipv4Addr;
    use tempfile::tempdir;

    fn reserved(last_octet: u8) -> InstanceRecord {
        InstanceRecord::reserved(
            "prod",
            "subnet-1",
            Ipv4Addr::new(10, 0, 1, last_octet),
            ImageSelector::Concrete {
                image_id: "ami-1".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_unknown_environment() {
        let temp_dir = tempdir().unwrap();
        let backend = FileTreeBackend::new(temp_dir.path());

        let result = backend.load_environment("prod").await;
        assert!(matches!(result, Err(LedgerError::UnknownEnvironment(_))));
    }

    #[tokio::test]
    async fn test_save_load() {
        let temp_dir = tempdir().unwrap();
        let backend = FileTreeBackend::new(temp_dir.path());

        backend
            .save_descriptor(&EnvironmentDescriptor::new("prod"))
            .await
            .unwrap();
        backend.upsert_record("prod", &reserved(12)).await.unwrap();
        backend.upsert_record("prod", &reserved(11)).await.unwrap();

        assert!(temp_dir.path().join("prod/instances/10.0.1.11.json").exists());

        let snapshot = backend.load_environment("prod").await.unwrap();
        assert_eq!(snapshot.descriptor.name, "prod");
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(
            snapshot.records[0].private_address,
            Ipv4Addr::new(10, 0, 1, 11)
        );
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let temp_dir = tempdir().unwrap();
        let backend = FileTreeBackend::new(temp_dir.path());
        backend
            .save_descriptor(&EnvironmentDescriptor::new("prod"))
            .await
            .unwrap();

        backend
            .delete_record("prod", &RecordKey::Id("i-missing".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejects_newer_descriptor() {
        let temp_dir = tempdir().unwrap();
        let backend = FileTreeBackend::new(temp_dir.path());

        let mut descriptor = EnvironmentDescriptor::new("prod");
        descriptor.version = DESCRIPTOR_VERSION + 1;
        backend.save_descriptor(&descriptor).await.unwrap();

        let result = backend.load_environment("prod").await;
        assert!(matches!(result, Err(LedgerError::StateError(_))));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let temp_dir = tempdir().unwrap();
        let backend = FileTreeBackend::new(temp_dir.path());

        let result = backend.load_environment("../etc").await;
        assert!(matches!(result, Err(LedgerError::InvalidEnvironment(_))));

        let result = backend
            .delete_record("prod", &RecordKey::Id("a/b".to_string()))
            .await;
        assert!(matches!(result, Err(LedgerError::StateError(_))));
    }
}
