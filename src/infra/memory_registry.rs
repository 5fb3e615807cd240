use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::app::ports::RegistryPort;
use crate::domain::{CompanyRecord, IdentityEntry, ImportBatch};
use crate::error::Result;

/// In-memory registry implementation for development and testing.
pub struct InMemoryRegistry {
    records: Arc<Mutex<HashMap<Uuid, CompanyRecord>>>,
    batches: Arc<Mutex<HashMap<Uuid, ImportBatch>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            batches: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seed an existing record, e.g. to simulate a pre-populated registry.
    pub fn seed(&self, name: &str, tax_id: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        let record = CompanyRecord {
            id: Some(id),
            batch_id: Uuid::nil(),
            name: name.to_string(),
            address: String::new(),
            region: String::new(),
            latitude: None,
            longitude: None,
            tax_id: tax_id.map(|t| t.to_string()),
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
            created_at: chrono::Utc::now(),
        };
        self.records.lock().unwrap().insert(id, record);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<CompanyRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryPort for InMemoryRegistry {
    async fn insert(&self, record: &CompanyRecord) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut stored = record.clone();
        stored.id = Some(id);

        let mut records = self.records.lock().unwrap();
        records.insert(id, stored);

        debug!("Created registry record: {} with id {}", record.name, id);
        Ok(id)
    }

    async fn create_batch(&self, batch: &ImportBatch) -> Result<()> {
        self.batches.lock().unwrap().insert(batch.id, batch.clone());
        debug!("Created import batch record: {}", batch.id);
        Ok(())
    }

    async fn update_batch(&self, batch: &ImportBatch) -> Result<()> {
        self.batches.lock().unwrap().insert(batch.id, batch.clone());
        Ok(())
    }

    async fn get_batch(&self, batch_id: Uuid) -> Result<Option<ImportBatch>> {
        Ok(self.batches.lock().unwrap().get(&batch_id).cloned())
    }

    async fn list_by_batch(&self, batch_id: Uuid) -> Result<Vec<Uuid>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .values()
            .filter(|r| r.batch_id == batch_id)
            .filter_map(|r| r.id)
            .collect())
    }

    async fn delete_by_batch(&self, batch_id: Uuid) -> Result<usize> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, r| r.batch_id != batch_id);
        self.batches.lock().unwrap().remove(&batch_id);
        Ok(before - records.len())
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut records = self.records.lock().unwrap();
        let count = records.len();
        records.clear();
        self.batches.lock().unwrap().clear();
        Ok(count)
    }

    async fn query_identity(&self) -> Result<Vec<IdentityEntry>> {
        let records = self.records.lock().unwrap();
        let mut entries: Vec<IdentityEntry> = records
            .values()
            .map(|r| IdentityEntry {
                id: r.id.unwrap_or_default(),
                name: r.name.clone(),
                tax_id: r.tax_id.clone(),
            })
            .collect();
        // Stable order keeps duplicate detection deterministic across runs
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }
}
