use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::ports::{GeocoderPort, MappingAssistantPort, RegistryPort};
use crate::domain::{
    DuplicateFlag, FieldMapping, ImportBatch, MappingSource, TargetField, ValidationViolation,
};
use crate::error::{ImportError, Result};
use crate::pipeline::dedup::DuplicateDetector;
use crate::pipeline::enrich::Enricher;
use crate::pipeline::importer::BatchImporter;
use crate::pipeline::mapper::{self, HeuristicMapper};
use crate::pipeline::reader::SpreadsheetReader;
use crate::pipeline::report::{ProgressHandle, RunSummary};
use crate::pipeline::validator::FieldValidator;

/// Options for one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Ask the conversational assistant for the column mapping; falls back
    /// to the heuristic mapper when unavailable.
    pub use_assistant: bool,
    /// Run stages 1-4 and report without mutating the registry.
    pub dry_run: bool,
    /// Operator mapping corrections; non-empty implies a manual mapping.
    pub overrides: Vec<(String, TargetField)>,
    /// Data rows sent to the assistant as a sample.
    pub sample_rows: usize,
}

/// Operator-facing result of a run: counts by outcome plus every violation
/// and duplicate, sufficient to fix the source file and re-run.
#[derive(Debug)]
pub struct ImportReport {
    /// Absent for dry runs.
    pub batch: Option<ImportBatch>,
    pub mapping: FieldMapping,
    pub mapping_source: MappingSource,
    pub summary: RunSummary,
    pub violations: Vec<ValidationViolation>,
    pub duplicates: Vec<DuplicateFlag>,
}

/// Orchestrates one import run: read, map, validate, detect duplicates,
/// then commit row-by-row in file order. Stages 1-4 complete for the whole
/// row set before any registry mutation begins, so the operator-facing
/// counts are stable before the first insert.
pub struct ImportUseCase {
    registry: Arc<dyn RegistryPort>,
    geocoder: Arc<dyn GeocoderPort>,
    assistant: Option<Arc<dyn MappingAssistantPort>>,
    geocode_delay: Duration,
    geocode_timeout: Duration,
}

impl ImportUseCase {
    pub fn new(
        registry: Arc<dyn RegistryPort>,
        geocoder: Arc<dyn GeocoderPort>,
        assistant: Option<Arc<dyn MappingAssistantPort>>,
        geocode_delay: Duration,
        geocode_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            geocoder,
            assistant,
            geocode_delay,
            geocode_timeout,
        }
    }

    pub async fn run(
        &self,
        path: &Path,
        options: &ImportOptions,
        progress: Option<ProgressHandle>,
    ) -> Result<ImportReport> {
        let start = std::time::Instant::now();
        let sheet = SpreadsheetReader::read_file(path)?;

        let (mapping, mapping_source) = self.resolve_mapping(&sheet, options).await;
        let missing = mapping.missing_required_fields();
        if !missing.is_empty() {
            // Fatal to run start, not a per-row error
            return Err(ImportError::MissingRequiredFields(missing));
        }
        for (column, field) in mapping.pairs() {
            info!("Column '{}' -> {}", column, field);
        }

        let violations = FieldValidator::validate(&sheet, &mapping);
        info!(
            rows = sheet.rows.len(),
            invalid_rows = violations
                .iter()
                .map(|v| v.row_index)
                .collect::<std::collections::HashSet<_>>()
                .len(),
            "Validation complete"
        );

        // Single identity read per run; the detector never re-queries
        let snapshot = self.registry.query_identity().await?;
        let duplicates = DuplicateDetector::new(snapshot).detect(&sheet, &mapping);
        info!(flagged = duplicates.len(), "Duplicate detection complete");

        if options.dry_run {
            info!("Dry run requested; skipping commit");
            let summary = dry_run_summary(sheet.rows.len(), &violations, &duplicates);
            return Ok(ImportReport {
                batch: None,
                mapping,
                mapping_source,
                summary,
                violations,
                duplicates,
            });
        }

        let enricher = Enricher::new(
            Arc::clone(&self.geocoder),
            self.geocode_delay,
            self.geocode_timeout,
        );
        let importer = BatchImporter::new(Arc::clone(&self.registry), enricher);
        let (batch, accumulator) = importer
            .commit(&sheet, &mapping, &violations, &duplicates, progress)
            .await?;
        let summary = accumulator.summary();

        info!(
            batch_id = %batch.id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Import run complete"
        );
        debug_assert_eq!(
            summary.success + summary.errors + summary.duplicates,
            summary.total
        );

        Ok(ImportReport {
            batch: Some(batch),
            mapping,
            mapping_source,
            summary,
            violations,
            duplicates,
        })
    }

    async fn resolve_mapping(
        &self,
        sheet: &crate::domain::Sheet,
        options: &ImportOptions,
    ) -> (FieldMapping, MappingSource) {
        if !options.overrides.is_empty() {
            return (
                HeuristicMapper::remap(&sheet.columns, &options.overrides),
                MappingSource::Manual,
            );
        }

        if options.use_assistant {
            if let Some(assistant) = &self.assistant {
                let sample: Vec<Vec<String>> = sheet
                    .rows
                    .iter()
                    .take(options.sample_rows.max(1))
                    .map(|r| r.cells.clone())
                    .collect();
                return mapper::resolve_mapping(&sheet.columns, &sample, Some(assistant.as_ref()))
                    .await;
            }
            warn!("Assistant requested but not configured; using heuristic mapping");
            return (
                HeuristicMapper::map(&sheet.columns),
                MappingSource::HeuristicFallback,
            );
        }

        (HeuristicMapper::map(&sheet.columns), MappingSource::Heuristic)
    }
}

fn dry_run_summary(
    total: usize,
    violations: &[ValidationViolation],
    duplicates: &[DuplicateFlag],
) -> RunSummary {
    let invalid: std::collections::HashSet<usize> =
        violations.iter().map(|v| v.row_index).collect();
    let duplicate_rows = duplicates
        .iter()
        .filter(|f| !invalid.contains(&f.row_index))
        .count();
    let errors = invalid.len();
    RunSummary {
        total,
        success: total - errors - duplicate_rows,
        errors,
        duplicates: duplicate_rows,
        skipped: 0,
    }
}
