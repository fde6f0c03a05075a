//! Waveguide quench-curve data sets.
//!
//! A data set lives in `<Waveguide Calibration Folder>/<experiment folder>/`:
//!
//! - `data.csv`: one row per repeat, RF channel, RF frequency and RF power
//!   setting, with the beam DC measured with the waveguide RF on and off
//! - `beam_dc_rf_off.csv` (optional): beam DC with all RF off over the scan
//!
//! Loading averages the repeats into survival-fraction records. The averaged
//! records are cached under `<FOSOF Analyzed Data Folder>/<experiment folder>/`
//! and reused on the next run unless recomputation is requested.

use std::collections::BTreeMap;
use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{BeamDcSample, BeamDcSummary, DatasetId, GroupKey, RfChannel, SurvFracRecord};
use crate::error::AppError;
use crate::io::detector::DetectorCalibration;
use crate::io::paths::PathTable;
use crate::io::table::{HeaderMap, RowError, open_reader, report_row_errors};
use crate::math::{mean, sample_std, stdom};

/// Data set analyzed when none is named.
pub const DEFAULT_DATASET: &str =
    "180522-195929 - Waveguide Calibration - 0 config, PD ON 82.5 V, 22.17 kV, 908-912 MHz";

pub const RAW_DATA_FILE: &str = "data.csv";
pub const BEAM_DC_FILE: &str = "beam_dc_rf_off.csv";
pub const SURV_FRAC_CACHE_FILE: &str = "surv_frac_av.json";

pub const COL_CHANNEL: &str = "RF Channel";
pub const COL_FREQ: &str = "RF Frequency [MHz]";
pub const COL_POWER_SETTING: &str = "RF Power Setting [V]";
pub const COL_DETECTED_POWER: &str = "RF System Power Sensor Detected Power [mW]";
pub const COL_SENSOR_READING: &str = "RF System Power Sensor Reading [V]";
pub const COL_DC_ON: &str = "DC On [V]";
pub const COL_DC_OFF: &str = "DC Off [V]";

pub const COL_ELAPSED: &str = "Elapsed Time [s]";
pub const COL_DC: &str = "DC [V]";
pub const COL_DC_STDOM: &str = "DC STDOM [V]";

/// A loaded and averaged data set.
#[derive(Debug, Clone)]
pub struct QuenchCurveDataSet {
    pub id: DatasetId,
    pub surv_frac_av: Vec<SurvFracRecord>,
    pub beam_dc_rf_off: Vec<BeamDcSample>,
    /// True when the averages came from the cache instead of `data.csv`.
    pub loaded_from_cache: bool,
    pub rows_read: usize,
    pub row_errors: Vec<RowError>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SurvFracCache {
    dataset: String,
    surv_frac_av: Vec<SurvFracRecord>,
    beam_dc_rf_off: Vec<BeamDcSample>,
}

/// One parsed raw row.
#[derive(Debug, Clone, Copy)]
struct RawRow {
    channel: RfChannel,
    freq_mhz: f64,
    power_setting: f64,
    detected_power_mw: f64,
    dc_ratio: f64,
}

/// Where the detected power of a raw row comes from.
enum PowerSource {
    Column,
    Detector(DetectorCalibration),
}

impl QuenchCurveDataSet {
    /// Load a data set, reusing cached averages when `use_cache` is set.
    ///
    /// Freshly averaged data is written to the cache.
    pub fn load(paths: &PathTable, name: &str, use_cache: bool) -> Result<Self, AppError> {
        let id = DatasetId::parse(name)?;
        let cache_path = cache_path(paths, name)?;

        if use_cache && cache_path.exists() {
            let file = File::open(&cache_path).map_err(|e| {
                AppError::input(format!("Failed to open cached averages '{}': {e}", cache_path.display()))
            })?;
            let cache: SurvFracCache = serde_json::from_reader(file).map_err(|e| {
                AppError::input(format!("Invalid cached averages '{}': {e}", cache_path.display()))
            })?;
            tracing::info!(dataset = name, records = cache.surv_frac_av.len(), "loaded cached survival fractions");
            return Ok(Self {
                id,
                surv_frac_av: cache.surv_frac_av,
                beam_dc_rf_off: cache.beam_dc_rf_off,
                loaded_from_cache: true,
                rows_read: 0,
                row_errors: Vec::new(),
            });
        }

        let folder = paths.wvg_calib_folder()?.join(name);
        let raw_path = folder.join(RAW_DATA_FILE);
        let (rows, rows_read, row_errors) = read_raw_rows(&raw_path, paths)?;
        let surv_frac_av = average_surv_frac(name, &rows);
        if surv_frac_av.is_empty() {
            return Err(AppError::no_data(format!(
                "No valid rows in '{}' ({} read, {} rejected).",
                raw_path.display(),
                rows_read,
                row_errors.len()
            )));
        }

        let beam_path = folder.join(BEAM_DC_FILE);
        let beam_dc_rf_off = if beam_path.exists() {
            read_beam_dc(&beam_path)?
        } else {
            Vec::new()
        };

        tracing::info!(
            dataset = name,
            rows = rows_read,
            records = surv_frac_av.len(),
            "averaged survival fractions"
        );

        let data_set = Self {
            id,
            surv_frac_av,
            beam_dc_rf_off,
            loaded_from_cache: false,
            rows_read,
            row_errors,
        };
        data_set.save_cache(&cache_path)?;
        Ok(data_set)
    }

    /// Scatter of the RF-off DC over the scan; `None` without beam DC samples.
    pub fn beam_dc_summary(&self) -> Option<BeamDcSummary> {
        summarize_beam_dc(&self.beam_dc_rf_off)
    }

    fn save_cache(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent).map_err(|e| {
                AppError::input(format!("Failed to create cache folder '{}': {e}", parent.display()))
            })?;
        }
        let file = File::create(path)
            .map_err(|e| AppError::input(format!("Failed to create cache '{}': {e}", path.display())))?;
        let cache = SurvFracCache {
            dataset: self.id.name.clone(),
            surv_frac_av: self.surv_frac_av.clone(),
            beam_dc_rf_off: self.beam_dc_rf_off.clone(),
        };
        serde_json::to_writer_pretty(file, &cache)
            .map_err(|e| AppError::input(format!("Failed to write cache '{}': {e}", path.display())))?;
        tracing::debug!(file = %path.display(), "saved survival fraction cache");
        Ok(())
    }
}

/// Combine the averaged records of several data sets, sorted by channel, frequency and power.
pub fn combine_surv_frac(data_sets: &[QuenchCurveDataSet]) -> Vec<SurvFracRecord> {
    let mut out: Vec<SurvFracRecord> = data_sets.iter().flat_map(|d| d.surv_frac_av.iter().cloned()).collect();
    out.sort_by(|a, b| {
        a.channel
            .cmp(&b.channel)
            .then(a.freq_mhz.total_cmp(&b.freq_mhz))
            .then(a.detected_power_mw.total_cmp(&b.detected_power_mw))
    });
    out
}

pub fn cache_path(paths: &PathTable, name: &str) -> Result<PathBuf, AppError> {
    Ok(paths.analyzed_data_folder()?.join(name).join(SURV_FRAC_CACHE_FILE))
}

fn read_raw_rows(path: &Path, paths: &PathTable) -> Result<(Vec<RawRow>, usize, Vec<RowError>), AppError> {
    let mut reader = open_reader(path)?;
    let headers = HeaderMap::read(&mut reader, path)?;
    headers.require(&[COL_CHANNEL, COL_FREQ, COL_POWER_SETTING, COL_DC_ON, COL_DC_OFF], path)?;

    let power = if headers.contains(COL_DETECTED_POWER) {
        PowerSource::Column
    } else if headers.contains(COL_SENSOR_READING) {
        PowerSource::Detector(DetectorCalibration::load(paths.krytar_109b_folder()?)?)
    } else {
        return Err(AppError::input(format!(
            "'{}' needs `{COL_DETECTED_POWER}` or `{COL_SENSOR_READING}`.",
            path.display()
        )));
    };

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: header line plus 1-based numbering.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_raw_row(&record, &headers, &power) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    report_row_errors(path, &row_errors);
    Ok((rows, rows_read, row_errors))
}

fn parse_raw_row(record: &csv::StringRecord, headers: &HeaderMap, power: &PowerSource) -> Result<RawRow, String> {
    let channel: RfChannel = headers.get_required(record, COL_CHANNEL)?.parse()?;
    let freq_mhz = headers.get_f64(record, COL_FREQ)?;
    let power_setting = headers.get_f64(record, COL_POWER_SETTING)?;
    let detected_power_mw = match power {
        PowerSource::Column => headers.get_f64(record, COL_DETECTED_POWER)?,
        PowerSource::Detector(calib) => {
            let volts = headers.get_f64(record, COL_SENSOR_READING)?;
            calib
                .power_mw(volts)
                .ok_or_else(|| format!("Cannot convert detector reading {volts} V."))?
        }
    };
    if detected_power_mw < 0.0 {
        return Err(format!("Negative detected power {detected_power_mw} mW."));
    }

    let dc_on = headers.get_f64(record, COL_DC_ON)?;
    let dc_off = headers.get_f64(record, COL_DC_OFF)?;
    if dc_off <= 0.0 {
        return Err(format!("`{COL_DC_OFF}` must be > 0, got {dc_off}."));
    }

    Ok(RawRow {
        channel,
        freq_mhz,
        power_setting,
        detected_power_mw,
        dc_ratio: dc_on / dc_off,
    })
}

/// Average repeats per (channel, frequency, power setting).
fn average_surv_frac(dataset: &str, rows: &[RawRow]) -> Vec<SurvFracRecord> {
    let mut groups: BTreeMap<(GroupKey, i64), Vec<&RawRow>> = BTreeMap::new();
    for row in rows {
        let key = (GroupKey::new(row.channel, row.freq_mhz), (row.power_setting * 1e6).round() as i64);
        groups.entry(key).or_default().push(row);
    }

    groups
        .into_iter()
        .filter_map(|((key, _), rows)| {
            let ratios: Vec<f64> = rows.iter().map(|r| r.dc_ratio).collect();
            let powers: Vec<f64> = rows.iter().map(|r| r.detected_power_mw).collect();
            Some(SurvFracRecord {
                dataset: dataset.to_string(),
                channel: key.channel,
                freq_mhz: key.freq_mhz(),
                power_setting: rows[0].power_setting,
                detected_power_mw: mean(&powers)?,
                detected_power_stdom_mw: stdom(&powers).unwrap_or(0.0),
                dc_ratio: mean(&ratios)?,
                dc_ratio_stdom: stdom(&ratios).unwrap_or(0.0),
                n_repeats: rows.len(),
            })
        })
        .collect()
}

fn read_beam_dc(path: &Path) -> Result<Vec<BeamDcSample>, AppError> {
    let mut reader = open_reader(path)?;
    let headers = HeaderMap::read(&mut reader, path)?;
    headers.require(&[COL_ELAPSED, COL_DC, COL_DC_STDOM], path)?;

    let mut samples = Vec::new();
    let mut row_errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let parsed = result.map_err(|e| format!("CSV parse error: {e}")).and_then(|r| {
            Ok(BeamDcSample {
                elapsed_s: headers.get_f64(&r, COL_ELAPSED)?,
                dc_v: headers.get_f64(&r, COL_DC)?,
                dc_stdom_v: headers.get_f64(&r, COL_DC_STDOM)?,
            })
        });
        match parsed {
            Ok(s) => samples.push(s),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }
    report_row_errors(path, &row_errors);

    samples.sort_by(|a, b| a.elapsed_s.total_cmp(&b.elapsed_s));
    Ok(samples)
}

fn summarize_beam_dc(samples: &[BeamDcSample]) -> Option<BeamDcSummary> {
    let dc: Vec<f64> = samples.iter().map(|s| s.dc_v).collect();
    let stdoms: Vec<f64> = samples.iter().map(|s| s.dc_stdom_v).collect();
    Some(BeamDcSummary {
        n: samples.len(),
        mean_dc_v: mean(&dc)?,
        dc_std_v: sample_std(&dc)?,
        mean_stdom_v: mean(&stdoms)?,
    })
}
