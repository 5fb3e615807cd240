use tracing::{debug, warn};

use crate::app::ports::MappingAssistantPort;
use crate::domain::{FieldMapping, MappingSource, TargetField};

/// Ordered keyword table: for a normalized column name, the first target
/// field whose keyword set contains a substring match wins. Keywords cover
/// the header spellings seen in partner and field-agent exports.
const KEYWORD_TABLE: [(TargetField, &[&str]); 16] = [
    (TargetField::Name, &["nombre", "razon social", "empresa", "company", "name", "denominacion"]),
    (TargetField::Address, &["direccion", "address", "domicilio", "calle"]),
    (TargetField::Region, &["parroquia", "parish", "region", "municipio", "freguesia", "comarca"]),
    (TargetField::TaxId, &["nif", "cif", "tax_id", "taxid", "dni", "ruc", "vat"]),
    (TargetField::Latitude, &["latitud", "latitude", "lat"]),
    (TargetField::Longitude, &["longitud", "longitude", "lng", "lon"]),
    (TargetField::Sector, &["sector", "actividad", "industry", "industria"]),
    (TargetField::Office, &["oficina", "office", "sucursal", "branch"]),
    (TargetField::Phone, &["telefono", "phone", "movil", "mobile", "tel"]),
    (TargetField::Email, &["email", "correo", "e-mail", "mail"]),
    (TargetField::Website, &["website", "web", "url", "sitio"]),
    (TargetField::EmployeeCount, &["empleado", "employee", "trabajadores", "plantilla", "staff"]),
    (TargetField::Revenue, &["facturacion", "revenue", "ingresos", "ventas", "turnover"]),
    (TargetField::RegistrationNumber, &["registro", "registration", "matricula", "inscripcion"]),
    (TargetField::LegalForm, &["forma juridica", "legal form", "tipo societario"]),
    (TargetField::Notes, &["notas", "notes", "observaciones", "comentarios", "remarks"]),
];

/// Deterministic keyword-table mapping strategy.
pub struct HeuristicMapper;

impl HeuristicMapper {
    /// Assign each source column to at most one target field. Two columns
    /// matching the same field: the first encountered keeps it, later ones
    /// are left unmapped. No error is raised here; an unmapped required
    /// field surfaces through `missing_required_fields` before the run.
    pub fn map(columns: &[String]) -> FieldMapping {
        let mut mapping = FieldMapping::new();
        for column in columns {
            let normalized = normalize_column(column);
            if normalized.is_empty() {
                continue;
            }
            if let Some(field) = Self::match_field(&normalized) {
                if mapping.assign(column, field) {
                    debug!("Mapped column '{}' -> {}", column, field);
                } else {
                    debug!("Column '{}' ignored; {} already claimed", column, field);
                }
            } else {
                debug!("Column '{}' ignored; no keyword match", column);
            }
        }
        mapping
    }

    /// Manual correction: operator overrides claim their columns and fields
    /// first, then the heuristic fills whatever remains unclaimed.
    pub fn remap(columns: &[String], overrides: &[(String, TargetField)]) -> FieldMapping {
        let mut mapping = FieldMapping::new();
        for (column, field) in overrides {
            if !columns.contains(column) {
                warn!("Override references unknown column '{}'; skipped", column);
                continue;
            }
            if !mapping.assign(column, *field) {
                warn!("Conflicting override for column '{}'; first one kept", column);
            }
        }
        for column in columns {
            if mapping.target_for(column).is_some() {
                continue;
            }
            let normalized = normalize_column(column);
            if let Some(field) = Self::match_field(&normalized) {
                mapping.assign(column, field);
            }
        }
        mapping
    }

    fn match_field(normalized: &str) -> Option<TargetField> {
        KEYWORD_TABLE
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| normalized.contains(k)))
            .map(|(field, _)| *field)
    }
}

/// Resolve the mapping for a run. The assistant path, when requested and
/// available, replaces the heuristic mapping outright; on any assistant
/// failure the caller gets the heuristic mapping with an explicit
/// `HeuristicFallback` source so the operator sees the downgrade.
pub async fn resolve_mapping(
    columns: &[String],
    sample_rows: &[Vec<String>],
    assistant: Option<&dyn MappingAssistantPort>,
) -> (FieldMapping, MappingSource) {
    let Some(assistant) = assistant else {
        return (HeuristicMapper::map(columns), MappingSource::Heuristic);
    };

    match assistant.suggest(columns, sample_rows).await {
        Ok(pairs) => {
            let mut mapping = FieldMapping::new();
            for (column, field) in &pairs {
                if !columns.contains(column) {
                    warn!("Assistant suggested unknown column '{}'; skipped", column);
                    continue;
                }
                mapping.assign(column, *field);
            }
            (mapping, MappingSource::Assistant)
        }
        Err(e) => {
            warn!("Mapping assistant unavailable ({}); falling back to heuristic mapping", e);
            (HeuristicMapper::map(columns), MappingSource::HeuristicFallback)
        }
    }
}

/// Lowercase, trim and strip diacritics from a source column name.
pub fn normalize_column(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportError;
    use async_trait::async_trait;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn maps_spanish_headers() {
        let cols = columns(&["Nombre", "Dirección", "Parroquia", "NIF", "Teléfono"]);
        let mapping = HeuristicMapper::map(&cols);

        assert_eq!(mapping.target_for("Nombre"), Some(TargetField::Name));
        assert_eq!(mapping.target_for("Dirección"), Some(TargetField::Address));
        assert_eq!(mapping.target_for("Parroquia"), Some(TargetField::Region));
        assert_eq!(mapping.target_for("NIF"), Some(TargetField::TaxId));
        assert_eq!(mapping.target_for("Teléfono"), Some(TargetField::Phone));
        assert!(mapping.missing_required_fields().is_empty());
    }

    #[test]
    fn first_column_wins_for_shared_field() {
        let cols = columns(&["NIF", "CIF", "Nombre"]);
        let mapping = HeuristicMapper::map(&cols);

        assert_eq!(mapping.target_for("NIF"), Some(TargetField::TaxId));
        assert_eq!(mapping.target_for("CIF"), None);
    }

    #[test]
    fn unmatched_columns_left_unmapped() {
        let cols = columns(&["Nombre", "Columna Misteriosa"]);
        let mapping = HeuristicMapper::map(&cols);

        assert_eq!(mapping.target_for("Columna Misteriosa"), None);
        assert_eq!(mapping.pairs().len(), 1);
    }

    #[test]
    fn missing_required_surfaces_lost_race() {
        // "Empresa" wins name; the address column is absent entirely
        let cols = columns(&["Empresa", "Parroquia"]);
        let mapping = HeuristicMapper::map(&cols);

        assert_eq!(mapping.missing_required_fields(), vec![TargetField::Address]);
    }

    #[test]
    fn remap_overrides_take_precedence() {
        let cols = columns(&["Codigo", "Nombre", "Direccion", "Municipio"]);
        let overrides = vec![("Codigo".to_string(), TargetField::TaxId)];
        let mapping = HeuristicMapper::remap(&cols, &overrides);

        assert_eq!(mapping.target_for("Codigo"), Some(TargetField::TaxId));
        assert_eq!(mapping.target_for("Nombre"), Some(TargetField::Name));
        assert_eq!(mapping.target_for("Municipio"), Some(TargetField::Region));
    }

    #[test]
    fn normalization_strips_diacritics() {
        assert_eq!(normalize_column("  Dirección "), "direccion");
        assert_eq!(normalize_column("AÑO"), "ano");
    }

    struct FailingAssistant;

    #[async_trait]
    impl MappingAssistantPort for FailingAssistant {
        async fn suggest(
            &self,
            _columns: &[String],
            _sample_rows: &[Vec<String>],
        ) -> crate::error::Result<Vec<(String, TargetField)>> {
            Err(ImportError::AssistantUnavailable("rate limited".into()))
        }
    }

    struct FixedAssistant;

    #[async_trait]
    impl MappingAssistantPort for FixedAssistant {
        async fn suggest(
            &self,
            _columns: &[String],
            _sample_rows: &[Vec<String>],
        ) -> crate::error::Result<Vec<(String, TargetField)>> {
            Ok(vec![
                ("Col A".to_string(), TargetField::Name),
                ("Col B".to_string(), TargetField::Address),
            ])
        }
    }

    #[tokio::test]
    async fn assistant_mapping_replaces_heuristic_outright() {
        // "Col A" / "Col B" match no keywords; only the assistant can map them
        let cols = columns(&["Col A", "Col B"]);
        let (mapping, source) = resolve_mapping(&cols, &[], Some(&FixedAssistant)).await;

        assert_eq!(source, MappingSource::Assistant);
        assert_eq!(mapping.target_for("Col A"), Some(TargetField::Name));
        assert_eq!(mapping.target_for("Col B"), Some(TargetField::Address));
    }

    #[tokio::test]
    async fn assistant_failure_falls_back_with_explicit_source() {
        let cols = columns(&["Nombre", "Direccion", "Parroquia"]);
        let (mapping, source) = resolve_mapping(&cols, &[], Some(&FailingAssistant)).await;

        assert_eq!(source, MappingSource::HeuristicFallback);
        assert_eq!(mapping.target_for("Nombre"), Some(TargetField::Name));
    }
}
