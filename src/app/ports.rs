use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{CompanyRecord, IdentityEntry, ImportBatch, TargetField};
use crate::error::Result;

/// CRUD contract of the company registry store. The pipeline never talks
/// to a concrete store directly.
#[async_trait]
pub trait RegistryPort: Send + Sync {
    /// Insert a record and return its assigned id.
    async fn insert(&self, record: &CompanyRecord) -> Result<Uuid>;

    /// Persist the batch record. Called before the batch's first row insert
    /// so a partially-run import is attributable after the process exits.
    async fn create_batch(&self, batch: &ImportBatch) -> Result<()>;

    /// Store the batch record's finalized counts.
    async fn update_batch(&self, batch: &ImportBatch) -> Result<()>;

    /// Fetch a stored batch record.
    async fn get_batch(&self, batch_id: Uuid) -> Result<Option<ImportBatch>>;

    /// Ids of all records created under `batch_id`.
    async fn list_by_batch(&self, batch_id: Uuid) -> Result<Vec<Uuid>>;

    /// Delete every record created under `batch_id`, along with the batch
    /// record itself; returns the record count.
    async fn delete_by_batch(&self, batch_id: Uuid) -> Result<usize>;

    /// Delete every imported record and batch record; returns the record
    /// count.
    async fn delete_all(&self) -> Result<usize>;

    /// Identity snapshot ({id, name, tax_id}) of the full registry, read
    /// once at run start by the duplicate detector.
    async fn query_identity(&self) -> Result<Vec<IdentityEntry>>;
}

/// Geocoding collaborator. `Ok(None)` means the address was not found;
/// errors are treated the same way by the enrichment step.
#[async_trait]
pub trait GeocoderPort: Send + Sync {
    async fn geocode(&self, address: &str, region: &str) -> Result<Option<(f64, f64)>>;
}

/// Conversational column-mapping assistant. Best-effort: any error means
/// the assistant is unavailable and callers fall back to the heuristic
/// mapper explicitly.
#[async_trait]
pub trait MappingAssistantPort: Send + Sync {
    async fn suggest(
        &self,
        columns: &[String],
        sample_rows: &[Vec<String>],
    ) -> Result<Vec<(String, TargetField)>>;
}
