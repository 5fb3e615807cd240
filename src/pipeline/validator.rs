use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::domain::{FieldKind, Sheet, TargetField, ValidationViolation};
use crate::domain::{FieldMapping, RawRow};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").unwrap());

/// Applies per-field syntactic and range rules to every row under the
/// current mapping. Pure and deterministic; violations are produced, never
/// mutated, and a row with at least one violation is ineligible for commit.
pub struct FieldValidator;

impl FieldValidator {
    pub fn validate(sheet: &Sheet, mapping: &FieldMapping) -> Vec<ValidationViolation> {
        let mut violations = Vec::new();
        for row in &sheet.rows {
            Self::validate_row(sheet, row, mapping, &mut violations);
        }
        violations
    }

    fn validate_row(
        sheet: &Sheet,
        row: &RawRow,
        mapping: &FieldMapping,
        violations: &mut Vec<ValidationViolation>,
    ) {
        // Missing required fields are reported once per row under the
        // umbrella field name "required", not per individual column.
        let missing: Vec<&str> = TargetField::ALL
            .iter()
            .filter(|f| f.required())
            .filter(|f| sheet.mapped_value(row, mapping, **f).is_none())
            .map(|f| f.as_str())
            .collect();
        if !missing.is_empty() {
            violations.push(ValidationViolation {
                row_index: row.index,
                field: "required",
                raw_value: String::new(),
                reason: format!("missing required field(s): {}", missing.join(", ")),
            });
        }

        for field in TargetField::ALL {
            let Some(value) = sheet.mapped_value(row, mapping, field) else {
                continue;
            };
            match field.kind() {
                FieldKind::Text => {}
                FieldKind::Decimal => {
                    if parse_decimal(value).is_none() {
                        violations.push(ValidationViolation {
                            row_index: row.index,
                            field: field.as_str(),
                            raw_value: value.to_string(),
                            reason: "not a number".to_string(),
                        });
                    }
                }
                FieldKind::BoundedDecimal { min, max } => match parse_decimal(value) {
                    Some(n) if (min..=max).contains(&n) => {}
                    Some(n) => violations.push(ValidationViolation {
                        row_index: row.index,
                        field: field.as_str(),
                        raw_value: value.to_string(),
                        reason: format!("{} outside [{}, {}]", n, min, max),
                    }),
                    None => violations.push(ValidationViolation {
                        row_index: row.index,
                        field: field.as_str(),
                        raw_value: value.to_string(),
                        reason: "not a number".to_string(),
                    }),
                },
                FieldKind::Email => {
                    if !EMAIL_RE.is_match(value) {
                        violations.push(ValidationViolation {
                            row_index: row.index,
                            field: field.as_str(),
                            raw_value: value.to_string(),
                            reason: "not a valid email address".to_string(),
                        });
                    }
                }
                FieldKind::Url => {
                    if !is_valid_website(value) {
                        violations.push(ValidationViolation {
                            row_index: row.index,
                            field: field.as_str(),
                            raw_value: value.to_string(),
                            reason: "not a valid URL".to_string(),
                        });
                    }
                }
            }
        }
    }
}

/// Parse a spreadsheet number. Handles plain decimals plus the common
/// export formats "1.234,56" and "1,234.56".
pub fn parse_decimal(value: &str) -> Option<f64> {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let has_dot = cleaned.contains('.');
    let has_comma = cleaned.contains(',');

    let normalized = if has_dot && has_comma {
        // Whichever separator appears last is the decimal one
        if cleaned.rfind('.') > cleaned.rfind(',') {
            cleaned.replace(',', "")
        } else {
            cleaned.replace('.', "").replace(',', ".")
        }
    } else if has_comma {
        cleaned.replace(',', ".")
    } else {
        cleaned
    };

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Spreadsheet websites often come without a scheme; prefix one before
/// parsing rather than rejecting a bare host.
fn is_valid_website(value: &str) -> bool {
    let candidate = if value.contains("://") {
        value.to_string()
    } else {
        format!("https://{}", value)
    };
    match Url::parse(&candidate) {
        Ok(url) => url.host_str().map_or(false, |h| h.contains('.')),
        Err(_) => false,
    }
}
