//! Precomputed waveguide quench simulations.
//!
//! The simulation folder holds a catalog (`old_sim_info.csv`) with one row per
//! simulation run:
//!
//! ```text
//! Simulation Key,Waveguide Electric Field [V/cm],Speed [cm/ns],File
//! wvg_pwr_scan_22kV,Power Scan,0.2254,wvg_pwr_scan_22kV.csv
//! ```
//!
//! A power-scan simulation file tabulates the surviving fraction versus RF
//! frequency and field amplitude for several atom off-axis distances.

use std::path::Path;

use crate::domain::SimCatalogEntry;
use crate::domain::SimPoint;
use crate::error::AppError;
use crate::io::paths::PathTable;
use crate::io::table::{HeaderMap, RowError, open_reader, report_row_errors};

pub const SIM_CATALOG_FILE: &str = "old_sim_info.csv";
pub const POWER_SCAN: &str = "Power Scan";

const COL_KEY: &str = "Simulation Key";
const COL_SCAN_TYPE: &str = "Waveguide Electric Field [V/cm]";
const COL_SPEED: &str = "Speed [cm/ns]";
const COL_FILE: &str = "File";

const COL_OFF_AXIS: &str = "Off-Axis Distance [mm]";
const COL_FREQ: &str = "Frequency [MHz]";
const COL_E_FIELD: &str = "E Field [V/cm]";
const COL_SURV_FRAC: &str = "Surviving Fraction";

/// Speeds (cm/ns) and distances (mm) closer than this are considered equal.
const MATCH_TOL: f64 = 1e-6;

/// Read the simulation catalog.
pub fn load_catalog(paths: &PathTable) -> Result<Vec<SimCatalogEntry>, AppError> {
    let folder = paths.sim_data_folder()?;
    let path = folder.join(SIM_CATALOG_FILE);
    let mut reader = open_reader(&path)?;
    let headers = HeaderMap::read(&mut reader, &path)?;
    headers.require(&[COL_KEY, COL_SCAN_TYPE, COL_SPEED, COL_FILE], &path)?;

    let mut entries = Vec::new();
    let mut row_errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let parsed = result.map_err(|e| format!("CSV parse error: {e}")).and_then(|r| {
            Ok(SimCatalogEntry {
                key: headers.get_required(&r, COL_KEY)?.to_string(),
                scan_type: headers.get_required(&r, COL_SCAN_TYPE)?.to_string(),
                speed_cm_per_ns: headers.get_f64(&r, COL_SPEED)?,
                file: folder.join(headers.get_required(&r, COL_FILE)?.replace('\\', "/")),
            })
        });
        match parsed {
            Ok(entry) => entries.push(entry),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }
    report_row_errors(&path, &row_errors);
    Ok(entries)
}

/// First catalog entry with the given scan type and beam speed.
pub fn select_simulation<'a>(
    catalog: &'a [SimCatalogEntry],
    scan_type: &str,
    speed_cm_per_ns: f64,
) -> Result<&'a SimCatalogEntry, AppError> {
    let mut matches = catalog
        .iter()
        .filter(|e| e.scan_type.eq_ignore_ascii_case(scan_type))
        .filter(|e| (e.speed_cm_per_ns - speed_cm_per_ns).abs() < MATCH_TOL);

    let first = matches.next().ok_or_else(|| {
        AppError::no_data(format!(
            "No '{scan_type}' simulation for beam speed {speed_cm_per_ns} cm/ns in the catalog."
        ))
    })?;
    let others = matches.count();
    if others > 0 {
        tracing::info!(key = %first.key, others, "several simulations match; using the first one");
    }
    Ok(first)
}

/// All curves of one power-scan simulation file.
#[derive(Debug, Clone)]
pub struct QuenchSimulationSet {
    pub entry: SimCatalogEntry,
    pub points: Vec<SimPoint>,
}

impl QuenchSimulationSet {
    pub fn load(entry: &SimCatalogEntry) -> Result<Self, AppError> {
        let points = read_sim_points(&entry.file)?;
        if points.is_empty() {
            return Err(AppError::no_data(format!(
                "Simulation file '{}' has no valid rows.",
                entry.file.display()
            )));
        }
        tracing::info!(key = %entry.key, points = points.len(), "loaded quench simulation");
        Ok(Self {
            entry: entry.clone(),
            points,
        })
    }

    /// Off-axis distances (mm) available in the file, ascending.
    pub fn list_simulations(&self) -> Vec<f64> {
        let mut distances: Vec<f64> = self.points.iter().map(|p| p.off_axis_mm).collect();
        distances.sort_by(f64::total_cmp);
        distances.dedup_by(|a, b| (*a - *b).abs() < MATCH_TOL);
        distances
    }

    /// Points simulated at one off-axis distance.
    pub fn simulation_data(&self, off_axis_mm: f64) -> Result<Vec<SimPoint>, AppError> {
        let points: Vec<SimPoint> = self
            .points
            .iter()
            .filter(|p| (p.off_axis_mm - off_axis_mm).abs() < MATCH_TOL)
            .copied()
            .collect();
        if points.is_empty() {
            return Err(AppError::no_data(format!(
                "Simulation '{}' has no {off_axis_mm} mm off-axis curves (available: {:?}).",
                self.entry.key,
                self.list_simulations()
            )));
        }
        Ok(points)
    }
}

fn read_sim_points(path: &Path) -> Result<Vec<SimPoint>, AppError> {
    let mut reader = open_reader(path)?;
    let headers = HeaderMap::read(&mut reader, path)?;
    headers.require(&[COL_OFF_AXIS, COL_FREQ, COL_E_FIELD, COL_SURV_FRAC], path)?;

    let mut points = Vec::new();
    let mut row_errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let parsed = result.map_err(|e| format!("CSV parse error: {e}")).and_then(|r| {
            Ok(SimPoint {
                off_axis_mm: headers.get_f64(&r, COL_OFF_AXIS)?,
                freq_mhz: headers.get_f64(&r, COL_FREQ)?,
                e_field: headers.get_f64(&r, COL_E_FIELD)?,
                surv_frac: headers.get_f64(&r, COL_SURV_FRAC)?,
            })
        });
        match parsed {
            Ok(p) if p.e_field >= 0.0 => points.push(p),
            Ok(p) => row_errors.push(RowError {
                line,
                message: format!("Negative field {} V/cm.", p.e_field),
            }),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }
    report_row_errors(path, &row_errors);
    Ok(points)
}
