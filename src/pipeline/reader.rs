use std::fs;
use std::path::Path;

use calamine::{open_workbook, DataType, Reader, Xlsx};
use csv::{ReaderBuilder, Trim};
use tracing::{debug, info};

use crate::domain::{RawRow, Sheet};
use crate::error::{ImportError, Result};

/// Parses third-party spreadsheet exports into a [`Sheet`]: the ordered
/// header row plus data rows. First sheet only; no column order or naming
/// is assumed.
pub struct SpreadsheetReader;

impl SpreadsheetReader {
    /// Read a spreadsheet file, dispatching on its extension.
    pub fn read_file(path: &Path) -> Result<Sheet> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let sheet = match extension.as_str() {
            "csv" | "tsv" | "txt" => Self::read_csv(path)?,
            "xlsx" | "xlsm" => Self::read_xlsx(path)?,
            other => return Err(ImportError::UnsupportedFileType(other.to_string())),
        };

        info!(
            columns = sheet.columns.len(),
            rows = sheet.rows.len(),
            "Parsed spreadsheet {}",
            path.display()
        );
        Ok(sheet)
    }

    fn read_csv(path: &Path) -> Result<Sheet> {
        let bytes = fs::read(path)?;
        let content = Self::decode(&bytes);
        let delimiter = Self::detect_delimiter(&content);
        debug!("Detected delimiter: {:?}", delimiter as char);
        Self::parse_csv_content(&content, delimiter)
    }

    /// Parse CSV text that has already been decoded. Exposed for tests and
    /// for callers that hold content in memory.
    pub fn parse_csv_content(content: &str, delimiter: u8) -> Result<Sheet> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(ImportError::EmptySheet);
        }

        let mut rows = Vec::new();
        let mut index = 0usize;
        for record in reader.records() {
            let record = record?;
            index += 1;
            let cells: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(i, _)| record.get(i).unwrap_or("").to_string())
                .collect();
            if cells.iter().all(|c| c.trim().is_empty()) {
                debug!("Skipping blank row {}", index);
                continue;
            }
            rows.push(RawRow { index, cells });
        }

        Ok(Sheet { columns, rows })
    }

    fn read_xlsx(path: &Path) -> Result<Sheet> {
        let mut workbook: Xlsx<_> = open_workbook(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(ImportError::EmptySheet)??;

        let mut row_iter = range.rows();
        let header = row_iter.next().ok_or(ImportError::EmptySheet)?;
        let columns: Vec<String> = header.iter().map(Self::cell_to_string).collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(ImportError::EmptySheet);
        }

        let mut rows = Vec::new();
        for (offset, row) in row_iter.enumerate() {
            let index = offset + 1;
            let mut cells: Vec<String> = row.iter().map(Self::cell_to_string).collect();
            // Pad short rows so cells stay parallel to the header
            cells.resize(columns.len(), String::new());
            cells.truncate(columns.len());
            if cells.iter().all(|c| c.trim().is_empty()) {
                debug!("Skipping blank row {}", index);
                continue;
            }
            rows.push(RawRow { index, cells });
        }

        Ok(Sheet { columns, rows })
    }

    fn cell_to_string(cell: &calamine::Data) -> String {
        cell.as_string()
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| format!("{}", cell).trim().to_string())
    }

    /// Decode raw bytes as UTF-8, falling back to Windows-1252 for the
    /// usual legacy exports.
    fn decode(bytes: &[u8]) -> String {
        match std::str::from_utf8(bytes) {
            Ok(content) => content.to_string(),
            Err(_) => {
                let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
                decoded.into_owned()
            }
        }
    }

    /// Pick the delimiter whose per-line counts are high and consistent
    /// across the first sample lines.
    pub fn detect_delimiter(content: &str) -> u8 {
        let candidates = [b',', b';', b'\t', b'|'];
        let sample_lines: Vec<_> = content.lines().take(10).collect();

        let mut best_delimiter = b',';
        let mut best_score = 0.0f32;

        for &delimiter in &candidates {
            let counts: Vec<usize> = sample_lines
                .iter()
                .map(|line| line.bytes().filter(|&b| b == delimiter).count())
                .collect();
            if counts.is_empty() {
                continue;
            }

            let avg = counts.iter().sum::<usize>() as f32 / counts.len() as f32;
            let variance = counts
                .iter()
                .map(|&c| (c as f32 - avg).powi(2))
                .sum::<f32>()
                / counts.len() as f32;
            let score = avg / (1.0 + variance.sqrt());

            if score > best_score {
                best_score = score;
                best_delimiter = delimiter;
            }
        }

        best_delimiter
    }
}
