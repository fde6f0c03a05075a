//! Path table (`path_data.csv`).
//!
//! The table has a header row; the first column names a setting and the second
//! holds its path:
//!
//! ```text
//! Setting,Path
//! Simulation Data Folder,D:\Data\Simulations
//! ```
//!
//! Backslashes are normalized to `/`. Relative paths are resolved against the
//! directory containing the table so a data tree can be moved as a whole.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::io::table::open_reader;

pub const CODE_FOLDER: &str = "Code Folder";
pub const ANALYZED_DATA_FOLDER: &str = "FOSOF Analyzed Data Folder";
pub const WVG_CALIB_FOLDER: &str = "Waveguide Calibration Folder";
pub const KRYTAR_109B_FOLDER: &str = "KRYTAR 109 B Power Detector Calibration Data Folder";
pub const SIM_DATA_FOLDER: &str = "Simulation Data Folder";

/// Environment variable (or `.env` entry) pointing at the path table.
pub const PATH_DATA_ENV: &str = "WVG_PATH_DATA";
pub const DEFAULT_PATH_DATA: &str = "path_data.csv";

/// Resolved folder settings.
#[derive(Debug, Clone)]
pub struct PathTable {
    source: PathBuf,
    entries: BTreeMap<String, PathBuf>,
}

impl PathTable {
    /// Read the table from disk.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let mut reader = open_reader(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut entries = BTreeMap::new();
        for (idx, result) in reader.records().enumerate() {
            let line = idx + 2;
            let record = result.map_err(|e| {
                AppError::input(format!("Malformed path table '{}' (line {line}): {e}", path.display()))
            })?;
            let Some(name) = record.get(0).map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };
            let value = record.get(1).map(str::trim).unwrap_or("");
            if value.is_empty() {
                return Err(AppError::input(format!(
                    "Setting '{name}' in '{}' has no path.",
                    path.display()
                )));
            }
            entries.insert(name.to_string(), resolve(value, base_dir));
        }

        tracing::debug!(file = %path.display(), settings = entries.len(), "loaded path table");
        Ok(Self {
            source: path.to_path_buf(),
            entries,
        })
    }

    /// Path of a named setting.
    pub fn get(&self, name: &str) -> Result<&Path, AppError> {
        self.entries.get(name).map(PathBuf::as_path).ok_or_else(|| {
            AppError::input(format!(
                "Setting '{name}' is missing from path table '{}'.",
                self.source.display()
            ))
        })
    }

    pub fn analyzed_data_folder(&self) -> Result<&Path, AppError> {
        self.get(ANALYZED_DATA_FOLDER)
    }

    pub fn wvg_calib_folder(&self) -> Result<&Path, AppError> {
        self.get(WVG_CALIB_FOLDER)
    }

    pub fn krytar_109b_folder(&self) -> Result<&Path, AppError> {
        self.get(KRYTAR_109B_FOLDER)
    }

    pub fn sim_data_folder(&self) -> Result<&Path, AppError> {
        self.get(SIM_DATA_FOLDER)
    }
}

/// Default table location: `$WVG_PATH_DATA` (also read from `.env`), else `path_data.csv`.
pub fn default_path_data() -> PathBuf {
    dotenvy::dotenv().ok();
    std::env::var_os(PATH_DATA_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PATH_DATA))
}

fn resolve(raw: &str, base_dir: &Path) -> PathBuf {
    let normalized = PathBuf::from(raw.replace('\\', "/"));
    if normalized.is_relative() {
        base_dir.join(normalized)
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_settings_and_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("path_data.csv");
        fs::write(
            &table,
            "# folders used by the waveguide calibration\n\
             Setting,Path\n\
             Code Folder,/opt/code\n\
             \n\
             Simulation Data Folder,sims\\old\n",
        )
        .unwrap();

        let paths = PathTable::load(&table).unwrap();
        assert_eq!(paths.get(CODE_FOLDER).unwrap(), Path::new("/opt/code"));
        assert_eq!(paths.sim_data_folder().unwrap(), dir.path().join("sims/old"));
    }

    #[test]
    fn missing_setting_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("path_data.csv");
        fs::write(&table, "Setting,Path\nCode Folder,/opt/code\n").unwrap();

        let paths = PathTable::load(&table).unwrap();
        let err = paths.wvg_calib_folder().unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains(WVG_CALIB_FOLDER));
    }
}
