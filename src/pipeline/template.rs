use std::path::Path;

use tracing::info;

use crate::domain::TargetField;
use crate::error::Result;

/// Header labels for the downloadable import template: required fields
/// first, then optional ones, no data rows.
pub fn template_headers() -> Vec<&'static str> {
    TargetField::ALL.iter().map(|f| f.as_str()).collect()
}

/// Write the template as a header-only CSV.
pub fn write_template_csv(path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(template_headers())?;
    writer.flush()?;
    info!("Wrote import template to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_fields_come_first() {
        let headers = template_headers();
        assert_eq!(&headers[..3], &["name", "address", "region"]);
        assert_eq!(headers.len(), 16);
    }

    #[test]
    fn template_file_has_single_header_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.csv");
        write_template_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("name,address,region"));
    }
}
