use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed set of registry fields an import can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    Name,
    Address,
    Latitude,
    Longitude,
    Region,
    TaxId,
    Sector,
    Office,
    Phone,
    Email,
    Website,
    EmployeeCount,
    Revenue,
    RegistrationNumber,
    LegalForm,
    Notes,
}

/// Syntactic type of a target field, used by the validator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    Decimal,
    BoundedDecimal { min: f64, max: f64 },
    Email,
    Url,
}

impl TargetField {
    /// All target fields, required fields first. Template export and the
    /// mapper iterate in this order.
    pub const ALL: [TargetField; 16] = [
        TargetField::Name,
        TargetField::Address,
        TargetField::Region,
        TargetField::TaxId,
        TargetField::Latitude,
        TargetField::Longitude,
        TargetField::Sector,
        TargetField::Office,
        TargetField::Phone,
        TargetField::Email,
        TargetField::Website,
        TargetField::EmployeeCount,
        TargetField::Revenue,
        TargetField::RegistrationNumber,
        TargetField::LegalForm,
        TargetField::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetField::Name => "name",
            TargetField::Address => "address",
            TargetField::Latitude => "latitude",
            TargetField::Longitude => "longitude",
            TargetField::Region => "region",
            TargetField::TaxId => "tax_id",
            TargetField::Sector => "sector",
            TargetField::Office => "office",
            TargetField::Phone => "phone",
            TargetField::Email => "email",
            TargetField::Website => "website",
            TargetField::EmployeeCount => "employee_count",
            TargetField::Revenue => "revenue",
            TargetField::RegistrationNumber => "registration_number",
            TargetField::LegalForm => "legal_form",
            TargetField::Notes => "notes",
        }
    }

    /// Whether a run may start without this field mapped.
    pub fn required(&self) -> bool {
        matches!(
            self,
            TargetField::Name | TargetField::Address | TargetField::Region
        )
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            TargetField::Latitude => FieldKind::BoundedDecimal { min: -90.0, max: 90.0 },
            TargetField::Longitude => FieldKind::BoundedDecimal { min: -180.0, max: 180.0 },
            TargetField::EmployeeCount | TargetField::Revenue => FieldKind::Decimal,
            TargetField::Email => FieldKind::Email,
            TargetField::Website => FieldKind::Url,
            _ => FieldKind::Text,
        }
    }
}

impl std::fmt::Display for TargetField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One data row as read from the source file. Cells are parallel to the
/// sheet's column list; `index` is the 1-based position among the data rows
/// of the source file, used for operator-facing error reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRow {
    pub index: usize,
    pub cells: Vec<String>,
}

impl RawRow {
    /// Raw cell value under the named source column, if present.
    pub fn get<'a>(&'a self, columns: &[String], column: &str) -> Option<&'a str> {
        columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.cells.get(i))
            .map(|s| s.as_str())
    }
}

/// Parsed spreadsheet: the ordered header row plus all data rows.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl Sheet {
    /// Mapped value of `field` for `row`, trimmed; `None` when the field is
    /// unmapped or the cell is blank.
    pub fn mapped_value<'a>(
        &'a self,
        row: &'a RawRow,
        mapping: &FieldMapping,
        field: TargetField,
    ) -> Option<&'a str> {
        let column = mapping.column_for(field)?;
        let value = row.get(&self.columns, column)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

/// How the active mapping was produced. Surfaced to the operator so an
/// assistant fallback is never silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingSource {
    Heuristic,
    Assistant,
    /// Assistant was requested but unavailable; heuristic used instead.
    HeuristicFallback,
    Manual,
}

/// Assignment of source columns to target fields. Each source column maps
/// to at most one field and each field is claimed by at most one column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldMapping {
    pairs: Vec<(String, TargetField)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Claim `field` for `column`. Ignored when either side is already
    /// taken; first assignment wins.
    pub fn assign(&mut self, column: &str, field: TargetField) -> bool {
        if self.target_for(column).is_some() || self.column_for(field).is_some() {
            return false;
        }
        self.pairs.push((column.to_string(), field));
        true
    }

    pub fn column_for(&self, field: TargetField) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(_, f)| *f == field)
            .map(|(c, _)| c.as_str())
    }

    pub fn target_for(&self, column: &str) -> Option<TargetField> {
        self.pairs
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, f)| *f)
    }

    pub fn pairs(&self) -> &[(String, TargetField)] {
        &self.pairs
    }

    /// Required target fields with no mapped source column. A non-empty
    /// result is fatal to run start.
    pub fn missing_required_fields(&self) -> Vec<TargetField> {
        TargetField::ALL
            .iter()
            .copied()
            .filter(|f| f.required() && self.column_for(*f).is_none())
            .collect()
    }
}

/// A single per-row rule failure. Rows carrying at least one violation are
/// excluded from commit but still reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationViolation {
    pub row_index: usize,
    /// Field label; `"required"` covers all missing required fields at once.
    pub field: &'static str,
    pub raw_value: String,
    pub reason: String,
}

/// Which duplicate rule fired for a row. Ordered by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    ExactTaxId,
    ExactName,
    FuzzyName,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::ExactTaxId => "exact_tax_id",
            MatchKind::ExactName => "exact_name",
            MatchKind::FuzzyName => "fuzzy_name",
        }
    }
}

/// Duplicate signal for one row. A row carries at most one flag; the first
/// rule that matches wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateFlag {
    pub row_index: usize,
    pub matched_id: Uuid,
    pub matched_name: String,
    pub kind: MatchKind,
    /// 0-100; exact matches report 100.
    pub similarity: u8,
}

/// Identity snapshot of one existing registry record, read once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityEntry {
    pub id: Uuid,
    pub name: String,
    pub tax_id: Option<String>,
}

/// One execution of the import pipeline. Created before any row commits so
/// a partially-run import is always attributable to a batch id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub total_rows: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub duplicate_count: usize,
}

impl ImportBatch {
    pub fn new(total_rows: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            total_rows,
            success_count: 0,
            error_count: 0,
            duplicate_count: 0,
        }
    }
}

/// A company row as committed to the registry, tagged with the batch that
/// created it. The tag is the sole linkage enabling batch-scoped rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub id: Option<Uuid>,
    pub batch_id: Uuid,
    pub name: String,
    pub address: String,
    pub region: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub tax_id: Option<String>,
    pub sector: Option<String>,
    pub office: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub employee_count: Option<i64>,
    pub revenue: Option<f64>,
    pub registration_number: Option<String>,
    pub legal_form: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Final disposition of one input row within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowOutcome {
    Success { record_id: Uuid },
    ValidationError,
    Duplicate,
    CommitError { reason: String },
}
