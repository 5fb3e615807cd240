use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::ports::RegistryPort;
use crate::domain::{
    CompanyRecord, DuplicateFlag, FieldMapping, ImportBatch, RawRow, RowOutcome, Sheet,
    TargetField, ValidationViolation,
};
use crate::error::Result;
use crate::pipeline::enrich::Enricher;
use crate::pipeline::report::{ProgressHandle, RunAccumulator};
use crate::pipeline::validator::parse_decimal;

/// Commits eligible rows to the registry under a single batch id, in file
/// order, with per-row isolation: one row's failure never blocks or rolls
/// back the others.
pub struct BatchImporter {
    registry: Arc<dyn RegistryPort>,
    enricher: Enricher,
}

impl BatchImporter {
    pub fn new(registry: Arc<dyn RegistryPort>, enricher: Enricher) -> Self {
        Self { registry, enricher }
    }

    /// Run the commit phase. The batch record is stored before the first
    /// insert so a partially-run import is always attributable and cleanable
    /// via `rollback`.
    pub async fn commit(
        &self,
        sheet: &Sheet,
        mapping: &FieldMapping,
        violations: &[ValidationViolation],
        duplicates: &[DuplicateFlag],
        progress: Option<ProgressHandle>,
    ) -> Result<(ImportBatch, RunAccumulator)> {
        let mut batch = ImportBatch::new(sheet.rows.len());
        self.registry.create_batch(&batch).await?;
        info!(
            batch_id = %batch.id,
            total_rows = batch.total_rows,
            "Starting import batch"
        );

        let invalid_rows: HashSet<usize> = violations.iter().map(|v| v.row_index).collect();
        let duplicate_rows: HashMap<usize, &DuplicateFlag> =
            duplicates.iter().map(|f| (f.row_index, f)).collect();

        let mut accumulator = RunAccumulator::new(sheet.rows.len());

        for row in &sheet.rows {
            let outcome = if invalid_rows.contains(&row.index) {
                debug!(batch_id = %batch.id, row = row.index, "Row excluded by validation");
                RowOutcome::ValidationError
            } else if let Some(flag) = duplicate_rows.get(&row.index) {
                debug!(
                    batch_id = %batch.id,
                    row = row.index,
                    kind = flag.kind.as_str(),
                    matched = %flag.matched_name,
                    "Row excluded as duplicate"
                );
                RowOutcome::Duplicate
            } else {
                self.commit_row(&batch, sheet, row, mapping).await
            };

            accumulator.record(row.index, outcome);
            if let Some(handle) = &progress {
                handle.tick();
            }
        }

        let summary = accumulator.summary();
        batch.success_count = summary.success;
        batch.error_count = summary.errors;
        batch.duplicate_count = summary.duplicates;
        self.registry.update_batch(&batch).await?;
        info!(
            batch_id = %batch.id,
            success = batch.success_count,
            errors = batch.error_count,
            duplicates = batch.duplicate_count,
            "Import batch finished"
        );

        Ok((batch, accumulator))
    }

    async fn commit_row(
        &self,
        batch: &ImportBatch,
        sheet: &Sheet,
        row: &RawRow,
        mapping: &FieldMapping,
    ) -> RowOutcome {
        let mut record = build_record(batch.id, sheet, row, mapping);

        // Best-effort enrichment for rows with an address but no usable
        // coordinates; failure leaves the coordinates null.
        if Enricher::needs_coordinates(record.latitude, record.longitude) {
            match self
                .enricher
                .enrich(&record.address, &record.region)
                .await
            {
                Some((lat, lon)) => {
                    record.latitude = Some(lat);
                    record.longitude = Some(lon);
                }
                None => {
                    record.latitude = None;
                    record.longitude = None;
                }
            }
        }

        match self.registry.insert(&record).await {
            Ok(id) => {
                debug!(batch_id = %batch.id, row = row.index, record_id = %id, "Row committed");
                RowOutcome::Success { record_id: id }
            }
            Err(e) => {
                warn!(
                    batch_id = %batch.id,
                    row = row.index,
                    "Insert failed, continuing with remaining rows: {}",
                    e
                );
                RowOutcome::CommitError {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Delete every record committed under `batch_id`, and the batch record
    /// with them. Idempotent: rolling back an already-rolled-back batch
    /// deletes zero rows.
    pub async fn rollback(&self, batch_id: Uuid) -> Result<usize> {
        let deleted = self.registry.delete_by_batch(batch_id).await?;
        info!(batch_id = %batch_id, deleted, "Rolled back batch");
        Ok(deleted)
    }

    /// Delete every imported record regardless of batch.
    pub async fn rollback_all(&self) -> Result<usize> {
        let deleted = self.registry.delete_all().await?;
        info!(deleted, "Rolled back all imported records");
        Ok(deleted)
    }
}

fn build_record(
    batch_id: Uuid,
    sheet: &Sheet,
    row: &RawRow,
    mapping: &FieldMapping,
) -> CompanyRecord {
    let text = |field: TargetField| {
        sheet
            .mapped_value(row, mapping, field)
            .map(|v| v.to_string())
    };
    let number = |field: TargetField| {
        sheet
            .mapped_value(row, mapping, field)
            .and_then(parse_decimal)
    };

    CompanyRecord {
        id: None,
        batch_id,
        // Eligible rows always carry the required fields; the validator ran first
        name: text(TargetField::Name).unwrap_or_default(),
        address: text(TargetField::Address).unwrap_or_default(),
        region: text(TargetField::Region).unwrap_or_default(),
        latitude: number(TargetField::Latitude),
        longitude: number(TargetField::Longitude),
        tax_id: text(TargetField::TaxId),
        sector: text(TargetField::Sector),
        office: text(TargetField::Office),
        phone: text(TargetField::Phone),
        email: text(TargetField::Email),
        website: text(TargetField::Website),
        employee_count: number(TargetField::EmployeeCount).map(|n| n.round() as i64),
        revenue: number(TargetField::Revenue),
        registration_number: text(TargetField::RegistrationNumber),
        legal_form: text(TargetField::LegalForm),
        notes: text(TargetField::Notes),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::GeocoderPort;
    use crate::infra::memory_registry::InMemoryRegistry;
    use crate::pipeline::mapper::HeuristicMapper;
    use crate::pipeline::reader::SpreadsheetReader;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NotFoundGeocoder;

    #[async_trait]
    impl GeocoderPort for NotFoundGeocoder {
        async fn geocode(&self, _address: &str, _region: &str) -> Result<Option<(f64, f64)>> {
            Ok(None)
        }
    }

    fn importer(registry: Arc<InMemoryRegistry>) -> BatchImporter {
        let enricher = Enricher::new(
            Arc::new(NotFoundGeocoder),
            Duration::ZERO,
            Duration::from_secs(1),
        );
        BatchImporter::new(registry, enricher)
    }

    fn parse(content: &str) -> (Sheet, FieldMapping) {
        let sheet = SpreadsheetReader::parse_csv_content(content, b',').unwrap();
        let mapping = HeuristicMapper::map(&sheet.columns);
        (sheet, mapping)
    }

    #[tokio::test]
    async fn violations_and_duplicates_are_skipped() {
        let registry = Arc::new(InMemoryRegistry::new());
        let importer = importer(registry.clone());
        let (sheet, mapping) = parse(
            "name,address,region,latitude,longitude\n\
             Acme,Street 1,Centro,42.5,1.5\n\
             Beta,Street 2,Norte,42.6,1.6\n\
             Gamma,Street 3,Sur,42.7,1.7",
        );

        let violations = vec![ValidationViolation {
            row_index: 2,
            field: "required",
            raw_value: String::new(),
            reason: "missing".into(),
        }];
        let duplicates = vec![DuplicateFlag {
            row_index: 3,
            matched_id: Uuid::new_v4(),
            matched_name: "Gamma SA".into(),
            kind: crate::domain::MatchKind::ExactName,
            similarity: 100,
        }];

        let (batch, acc) = importer
            .commit(&sheet, &mapping, &violations, &duplicates, None)
            .await
            .unwrap();

        assert_eq!(batch.success_count, 1);
        assert_eq!(batch.error_count, 1);
        assert_eq!(batch.duplicate_count, 1);
        assert_eq!(registry.list_by_batch(batch.id).await.unwrap().len(), 1);
        assert_eq!(acc.processed(), 3);
    }

    #[tokio::test]
    async fn batch_record_is_stored_and_finalized() {
        let registry = Arc::new(InMemoryRegistry::new());
        let importer = importer(registry.clone());
        let (sheet, mapping) = parse(
            "name,address,region\nAcme,Street 1,Centro\nBeta,Street 2,Norte",
        );

        let (batch, _) = importer
            .commit(&sheet, &mapping, &[], &[], None)
            .await
            .unwrap();

        let stored = registry.get_batch(batch.id).await.unwrap().unwrap();
        assert_eq!(stored.total_rows, 2);
        assert_eq!(stored.success_count, 2);
        assert_eq!(stored.created_at, batch.created_at);

        // Rollback removes the batch record along with its rows
        importer.rollback(batch.id).await.unwrap();
        assert!(registry.get_batch(batch.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fractional_employee_counts_are_rounded() {
        let registry = Arc::new(InMemoryRegistry::new());
        let importer = importer(registry.clone());
        let (sheet, mapping) = parse(
            "name,address,region,employees\nAcme,Street 1,Centro,25.7",
        );

        let (batch, _) = importer
            .commit(&sheet, &mapping, &[], &[], None)
            .await
            .unwrap();

        let ids = registry.list_by_batch(batch.id).await.unwrap();
        assert_eq!(registry.get(ids[0]).unwrap().employee_count, Some(26));
    }

    #[tokio::test]
    async fn rollback_is_idempotent() {
        let registry = Arc::new(InMemoryRegistry::new());
        let importer = importer(registry.clone());
        let (sheet, mapping) = parse(
            "name,address,region\nAcme,Street 1,Centro\nBeta,Street 2,Norte",
        );

        let (batch, _) = importer
            .commit(&sheet, &mapping, &[], &[], None)
            .await
            .unwrap();
        assert_eq!(registry.list_by_batch(batch.id).await.unwrap().len(), 2);

        assert_eq!(importer.rollback(batch.id).await.unwrap(), 2);
        assert!(registry.list_by_batch(batch.id).await.unwrap().is_empty());
        assert_eq!(importer.rollback(batch.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn geocoder_not_found_still_commits_with_null_coordinates() {
        let registry = Arc::new(InMemoryRegistry::new());
        let importer = importer(registry.clone());
        // Zero coordinates qualify for enrichment
        let (sheet, mapping) = parse(
            "name,address,region,latitude,longitude\nAcme,Street 1,Centro,0,0",
        );

        let (batch, acc) = importer
            .commit(&sheet, &mapping, &[], &[], None)
            .await
            .unwrap();

        assert_eq!(batch.success_count, 1);
        assert_eq!(batch.error_count, 0);
        let ids = registry.list_by_batch(batch.id).await.unwrap();
        let record = registry.get(ids[0]).unwrap();
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, None);
        assert!(matches!(
            acc.outcomes()[0].1,
            RowOutcome::Success { .. }
        ));
    }

    #[tokio::test]
    async fn progress_handle_ticks_per_row() {
        let registry = Arc::new(InMemoryRegistry::new());
        let importer = importer(registry);
        let (sheet, mapping) = parse("name,address,region\nA,s,r\nB,s,r");

        let reporter = crate::pipeline::report::RunReporter::new(sheet.rows.len());
        let handle = reporter.handle();
        importer
            .commit(&sheet, &mapping, &[], &[], Some(handle))
            .await
            .unwrap();

        assert_eq!(reporter.progress().processed, 2);
    }
}
