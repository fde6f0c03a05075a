//! Shared CSV plumbing for the input tables.
//!
//! All input files are comma-delimited with a header row. Header names are
//! matched case-insensitively after trimming (and after stripping a UTF-8 BOM,
//! which spreadsheet exports like to prepend).

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::error::AppError;

/// A row-level error encountered while reading a table.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Open a CSV file for reading; `#` lines are comments.
pub fn open_reader(path: &Path) -> Result<csv::Reader<File>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(file))
}

/// Header name -> column index.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    columns: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn read<R: std::io::Read>(reader: &mut csv::Reader<R>, path: &Path) -> Result<Self, AppError> {
        let headers = reader
            .headers()
            .map_err(|e| AppError::input(format!("Failed to read CSV headers of '{}': {e}", path.display())))?
            .clone();
        Ok(Self::from_record(&headers))
    }

    pub fn from_record(headers: &StringRecord) -> Self {
        let columns = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (normalize_header_name(name), idx))
            .collect();
        Self { columns }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(&normalize_header_name(name))
    }

    /// Fail early (exit code 2) when a required column is absent.
    pub fn require(&self, names: &[&str], path: &Path) -> Result<(), AppError> {
        for name in names {
            if !self.contains(name) {
                return Err(AppError::input(format!(
                    "Missing required column `{name}` in '{}'.",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    pub fn get_required<'a>(&self, record: &'a StringRecord, name: &str) -> Result<&'a str, String> {
        let idx = self
            .columns
            .get(&normalize_header_name(name))
            .ok_or_else(|| format!("Missing required column: `{name}`"))?;
        record
            .get(*idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("Missing required value: `{name}`"))
    }

    pub fn get_optional<'a>(&self, record: &'a StringRecord, name: &str) -> Option<&'a str> {
        let idx = self.columns.get(&normalize_header_name(name))?;
        record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn get_f64(&self, record: &StringRecord, name: &str) -> Result<f64, String> {
        let raw = self.get_required(record, name)?;
        parse_f64(raw).ok_or_else(|| format!("Invalid number '{raw}' in `{name}`."))
    }
}

fn normalize_header_name(name: &str) -> String {
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Parse a finite float.
pub fn parse_f64(s: &str) -> Option<f64> {
    let v = s.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// Log skipped rows once per table.
pub fn report_row_errors(path: &Path, errors: &[RowError]) {
    if errors.is_empty() {
        return;
    }
    tracing::warn!(file = %path.display(), skipped = errors.len(), "skipped malformed rows");
    for e in errors.iter().take(5) {
        tracing::debug!(line = e.line, "{}", e.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_and_bom_insensitive() {
        let headers = StringRecord::from(vec!["\u{feff}RF Channel", " dc on [v] "]);
        let map = HeaderMap::from_record(&headers);
        assert!(map.contains("rf channel"));
        assert!(map.contains("DC On [V]"));

        let row = StringRecord::from(vec!["A", " 0.25 "]);
        assert_eq!(map.get_required(&row, "RF Channel").unwrap(), "A");
        assert_eq!(map.get_f64(&row, "DC On [V]").unwrap(), 0.25);
        assert!(map.get_optional(&row, "Repeat").is_none());
    }

    #[test]
    fn parse_f64_rejects_non_finite() {
        assert_eq!(parse_f64("1.5"), Some(1.5));
        assert_eq!(parse_f64("inf"), None);
        assert_eq!(parse_f64("x"), None);
    }
}
