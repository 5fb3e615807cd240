use thiserror::Error;

use crate::domain::TargetField;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Spreadsheet has no header row")]
    EmptySheet,

    #[error("Required fields unmapped: {}", format_fields(.0))]
    MissingRequiredFields(Vec<TargetField>),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Geocoder error: {0}")]
    Geocoder(String),

    #[error("Mapping assistant unavailable: {0}")]
    AssistantUnavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

fn format_fields(fields: &[TargetField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ImportError>;
