use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::app::ports::RegistryPort;
use crate::domain::{CompanyRecord, IdentityEntry, ImportBatch};
use crate::error::Result;

/// JSON-file-backed registry so CLI invocations share state: an import in
/// one run can be rolled back in a later one. Not meant for concurrent
/// writers; the CLI is a single logical run per invocation.
pub struct JsonFileRegistry {
    path: PathBuf,
    store: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    batches: HashMap<Uuid, ImportBatch>,
    records: HashMap<Uuid, CompanyRecord>,
}

/// On-disk shape of the registry file.
#[derive(Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    batches: Vec<ImportBatch>,
    #[serde(default)]
    records: Vec<CompanyRecord>,
}

impl JsonFileRegistry {
    pub fn open(path: &Path) -> Result<Self> {
        let store = if path.exists() {
            let content = fs::read_to_string(path)?;
            let file: RegistryFile = serde_json::from_str(&content)?;
            Store {
                batches: file.batches.into_iter().map(|b| (b.id, b)).collect(),
                records: file
                    .records
                    .into_iter()
                    .filter_map(|r| r.id.map(|id| (id, r)))
                    .collect(),
            }
        } else {
            Store::default()
        };
        debug!(
            "Opened registry file {} with {} records in {} batches",
            path.display(),
            store.records.len(),
            store.batches.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            store: Mutex::new(store),
        })
    }

    fn persist(&self, store: &Store) -> Result<()> {
        let mut batches: Vec<&ImportBatch> = store.batches.values().collect();
        let mut records: Vec<&CompanyRecord> = store.records.values().collect();
        // Stable file contents regardless of map iteration order
        batches.sort_by_key(|b| b.id);
        records.sort_by_key(|r| r.id);
        let file = serde_json::json!({ "batches": batches, "records": records });
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

#[async_trait]
impl RegistryPort for JsonFileRegistry {
    async fn insert(&self, record: &CompanyRecord) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut stored = record.clone();
        stored.id = Some(id);

        let mut store = self.store.lock().unwrap();
        store.records.insert(id, stored);
        self.persist(&store)?;
        Ok(id)
    }

    async fn create_batch(&self, batch: &ImportBatch) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store.batches.insert(batch.id, batch.clone());
        self.persist(&store)
    }

    async fn update_batch(&self, batch: &ImportBatch) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store.batches.insert(batch.id, batch.clone());
        self.persist(&store)
    }

    async fn get_batch(&self, batch_id: Uuid) -> Result<Option<ImportBatch>> {
        let store = self.store.lock().unwrap();
        Ok(store.batches.get(&batch_id).cloned())
    }

    async fn list_by_batch(&self, batch_id: Uuid) -> Result<Vec<Uuid>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .records
            .values()
            .filter(|r| r.batch_id == batch_id)
            .filter_map(|r| r.id)
            .collect())
    }

    async fn delete_by_batch(&self, batch_id: Uuid) -> Result<usize> {
        let mut store = self.store.lock().unwrap();
        let before = store.records.len();
        store.records.retain(|_, r| r.batch_id != batch_id);
        let deleted = before - store.records.len();
        let batch_removed = store.batches.remove(&batch_id).is_some();
        if deleted > 0 || batch_removed {
            self.persist(&store)?;
        }
        Ok(deleted)
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut store = self.store.lock().unwrap();
        let count = store.records.len();
        store.records.clear();
        store.batches.clear();
        self.persist(&store)?;
        Ok(count)
    }

    async fn query_identity(&self) -> Result<Vec<IdentityEntry>> {
        let store = self.store.lock().unwrap();
        let mut entries: Vec<IdentityEntry> = store
            .records
            .values()
            .map(|r| IdentityEntry {
                id: r.id.unwrap_or_default(),
                name: r.name.clone(),
                tax_id: r.tax_id.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(name: &str, batch_id: Uuid) -> CompanyRecord {
        CompanyRecord {
            id: None,
            batch_id,
            name: name.to_string(),
            address: "Street 1".to_string(),
            region: "Centro".to_string(),
            latitude: None,
            longitude: None,
            tax_id: None,
            sector: None,
            office: None,
            phone: None,
            email: None,
            website: None,
            employee_count: None,
            revenue: None,
            registration_number: None,
            legal_form: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let batch_id = Uuid::new_v4();

        {
            let registry = JsonFileRegistry::open(&path).unwrap();
            registry.insert(&record("Acme", batch_id)).await.unwrap();
            registry.insert(&record("Beta", batch_id)).await.unwrap();
        }

        let reopened = JsonFileRegistry::open(&path).unwrap();
        assert_eq!(reopened.list_by_batch(batch_id).await.unwrap().len(), 2);
        assert_eq!(reopened.query_identity().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batch_record_survives_reopen_with_final_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let mut batch = ImportBatch::new(5);
        {
            let registry = JsonFileRegistry::open(&path).unwrap();
            registry.create_batch(&batch).await.unwrap();
            batch.success_count = 3;
            batch.error_count = 1;
            batch.duplicate_count = 1;
            registry.update_batch(&batch).await.unwrap();
        }

        let reopened = JsonFileRegistry::open(&path).unwrap();
        let stored = reopened.get_batch(batch.id).await.unwrap().unwrap();
        assert_eq!(stored.total_rows, 5);
        assert_eq!(stored.success_count, 3);
        assert_eq!(stored.error_count, 1);
        assert_eq!(stored.duplicate_count, 1);
    }

    #[tokio::test]
    async fn rollback_across_reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let batch = ImportBatch::new(1);

        {
            let registry = JsonFileRegistry::open(&path).unwrap();
            registry.create_batch(&batch).await.unwrap();
            registry.insert(&record("Acme", batch.id)).await.unwrap();
        }

        let reopened = JsonFileRegistry::open(&path).unwrap();
        assert_eq!(reopened.delete_by_batch(batch.id).await.unwrap(), 1);
        // Rollback also removes the batch record
        assert!(reopened.get_batch(batch.id).await.unwrap().is_none());
        assert_eq!(reopened.delete_by_batch(batch.id).await.unwrap(), 0);
    }
}
