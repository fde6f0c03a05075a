//! Read/write calibration JSON files.
//!
//! A calibration file is the persisted form of one calibration run:
//! - the calibration parameters (including the fractional DC offset used)
//! - the simulation and data sets it was derived from
//! - intermediate results (extracted fields, fits)
//! - the method-averaged calibration and, for the nominal offset, the
//!   aggregated RF power calibration error
//!
//! The schema is defined by `domain::CalibrationFile`.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use crate::domain::CalibrationFile;
use crate::error::AppError;

/// File name encoding date, geometry, voltage, offset and variant.
pub fn calibration_file_name(calib: &CalibrationFile) -> String {
    let p = &calib.params;
    format!(
        "wvg_calib_{}_{}cm_{}kV_offset_{:.4}_{}.json",
        p.date.format("%y%m%d"),
        p.waveguide_separation_cm,
        p.accelerating_voltage_kv,
        p.fract_dc_offset,
        calib.variant.label(),
    )
}

/// Write a calibration into `folder`, returning the file path.
pub fn write_calibration_json(folder: &Path, calib: &CalibrationFile) -> Result<PathBuf, AppError> {
    create_dir_all(folder)
        .map_err(|e| AppError::input(format!("Failed to create calibration folder '{}': {e}", folder.display())))?;
    let path = folder.join(calibration_file_name(calib));
    let file = File::create(&path)
        .map_err(|e| AppError::input(format!("Failed to create calibration JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, calib)
        .map_err(|e| AppError::input(format!("Failed to write calibration JSON: {e}")))?;

    tracing::info!(file = %path.display(), variant = calib.variant.label(), "saved calibration");
    Ok(path)
}

/// Read a calibration JSON file.
pub fn read_calibration_json(path: &Path) -> Result<CalibrationFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open calibration JSON '{}': {e}", path.display())))?;
    let calib: CalibrationFile = serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid calibration JSON '{}': {e}", path.display())))?;
    Ok(calib)
}
