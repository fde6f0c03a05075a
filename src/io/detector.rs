//! KRYTAR 109B power detector calibration.
//!
//! Raw power scans may record only the detector voltage of the RF system power
//! sensor. The detector calibration table maps that voltage to power in dBm;
//! we interpolate linearly in voltage and hold the end values outside the
//! calibrated range.

use std::path::Path;

use crate::error::AppError;
use crate::io::table::{HeaderMap, RowError, open_reader, report_row_errors};
use crate::math::interp_linear_clamped;

pub const DETECTOR_CALIB_FILE: &str = "krytar_109b_calib.csv";

const COL_VOLTAGE: &str = "Detector Voltage [V]";
const COL_POWER_DBM: &str = "Power [dBm]";

#[derive(Debug, Clone)]
pub struct DetectorCalibration {
    volts: Vec<f64>,
    dbm: Vec<f64>,
}

impl DetectorCalibration {
    pub fn load(folder: &Path) -> Result<Self, AppError> {
        let path = folder.join(DETECTOR_CALIB_FILE);
        let mut reader = open_reader(&path)?;
        let headers = HeaderMap::read(&mut reader, &path)?;
        headers.require(&[COL_VOLTAGE, COL_POWER_DBM], &path)?;

        let mut table = Vec::new();
        let mut row_errors = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let line = idx + 2;
            let parsed = result
                .map_err(|e| format!("CSV parse error: {e}"))
                .and_then(|r| Ok((headers.get_f64(&r, COL_VOLTAGE)?, headers.get_f64(&r, COL_POWER_DBM)?)));
            match parsed {
                Ok(pair) => table.push(pair),
                Err(message) => row_errors.push(RowError { line, message }),
            }
        }
        report_row_errors(&path, &row_errors);

        Self::from_pairs(table)
            .map_err(|e| AppError::new(e.exit_code(), format!("{} ('{}')", e.message(), path.display())))
    }

    pub fn from_pairs(mut table: Vec<(f64, f64)>) -> Result<Self, AppError> {
        table.sort_by(|a, b| a.0.total_cmp(&b.0));
        table.dedup_by(|a, b| a.0 == b.0);
        if table.len() < 2 {
            return Err(AppError::no_data("Detector calibration needs at least two points."));
        }
        let (volts, dbm) = table.into_iter().unzip();
        Ok(Self { volts, dbm })
    }

    /// Detected power in mW for a detector reading in V.
    pub fn power_mw(&self, volts: f64) -> Option<f64> {
        let dbm = interp_linear_clamped(&self.volts, &self.dbm, volts)?;
        Some(10f64.powf(dbm / 10.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_voltage_through_dbm() {
        let calib = DetectorCalibration::from_pairs(vec![(1.0, 10.0), (0.0, 0.0)]).unwrap();
        assert!((calib.power_mw(0.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((calib.power_mw(0.5).unwrap() - 10f64.powf(0.5)).abs() < 1e-12);
        // Held at the upper end.
        assert!((calib.power_mw(2.0).unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn needs_two_points() {
        assert!(DetectorCalibration::from_pairs(vec![(1.0, 10.0)]).is_err());
    }
}
