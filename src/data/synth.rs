//! Synthetic waveguide calibration data.
//!
//! Writes a complete, self-consistent data tree so the calibration can be run
//! without archived measurements:
//!
//! ```text
//! <out>/path_data.csv
//! <out>/wvg_calib/<data set>/data.csv
//! <out>/wvg_calib/<data set>/beam_dc_rf_off.csv
//! <out>/krytar_109b/krytar_109b_calib.csv
//! <out>/simulations/old_sim_info.csv
//! <out>/simulations/wvg_pwr_scan_22kV.csv
//! ```
//!
//! The simulated surviving fraction is a damped Rabi curve,
//! `s = 1 - A·sin²(π E / (2 E_π))`, whose π-pulse field depends weakly on the
//! RF frequency and the atom off-axis distance. The measurement follows
//! `E² = κ·P` per channel with a slight frequency dependence, a fractional DC
//! offset and Gaussian noise on the DC ratio and the detected power.

use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::RfChannel;
use crate::error::AppError;
use crate::io::dataset::{
    BEAM_DC_FILE, COL_CHANNEL, COL_DC, COL_DC_OFF, COL_DC_ON, COL_DC_STDOM, COL_ELAPSED, COL_FREQ,
    COL_POWER_SETTING, COL_SENSOR_READING, DEFAULT_DATASET, RAW_DATA_FILE,
};
use crate::io::detector::DETECTOR_CALIB_FILE;
use crate::io::paths::{ANALYZED_DATA_FOLDER, CODE_FOLDER, DEFAULT_PATH_DATA, KRYTAR_109B_FOLDER, SIM_DATA_FOLDER, WVG_CALIB_FOLDER};
use crate::io::simulation::{POWER_SCAN, SIM_CATALOG_FILE};

pub const SIM_KEY: &str = "wvg_pwr_scan_22kV";
pub const BEAM_SPEED_CM_PER_NS: f64 = 0.2254;
pub const OFF_AXIS_DISTANCES_MM: [f64; 4] = [0.0, 1.0, 1.8, 2.5];

/// Quenched amplitude of the simulated curves.
const QUENCH_DEPTH: f64 = 0.95;
const E_PI_CENTER: f64 = 32.0;
const CENTER_FREQ_MHZ: f64 = 910.0;
/// Detector sensitivity: P [mW] = SENSOR_MW_PER_V · reading [V].
const SENSOR_MW_PER_V: f64 = 30.0;
const POWER_NOISE_REL: f64 = 0.003;
const N_POWER_SETTINGS: usize = 18;

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub out_dir: PathBuf,
    pub seed: u64,
    pub true_offset: f64,
    pub ratio_noise: f64,
    pub repeats: usize,
}

#[derive(Debug, Clone)]
pub struct SynthSummary {
    pub path_data: PathBuf,
    pub dataset: String,
    pub files: Vec<PathBuf>,
}

/// π-pulse field of the simulated curve.
pub fn pi_pulse_field(freq_mhz: f64, off_axis_mm: f64) -> f64 {
    let detuning = (freq_mhz - CENTER_FREQ_MHZ) / 40.0;
    E_PI_CENTER * (1.0 + detuning * detuning).sqrt() * (1.0 + 0.02 * off_axis_mm)
}

/// Simulated surviving fraction.
pub fn sim_surv_frac(freq_mhz: f64, off_axis_mm: f64, e_field: f64) -> f64 {
    let x = std::f64::consts::FRAC_PI_2 * e_field / pi_pulse_field(freq_mhz, off_axis_mm);
    1.0 - QUENCH_DEPTH * x.sin().powi(2)
}

/// E² per mW of detected power.
pub fn kappa(channel: RfChannel, freq_mhz: f64) -> f64 {
    let base = match channel {
        RfChannel::A => 40.0,
        RfChannel::B => 36.0,
    };
    base * (1.0 + 0.003 * (freq_mhz - CENTER_FREQ_MHZ))
}

pub fn write_synthetic_tree(config: &SynthConfig) -> Result<SynthSummary, AppError> {
    if !(config.true_offset.is_finite() && (0.0..0.5).contains(&config.true_offset)) {
        return Err(AppError::input(format!(
            "Synthetic offset must be in [0, 0.5), got {}.",
            config.true_offset
        )));
    }
    if !(config.ratio_noise.is_finite() && config.ratio_noise >= 0.0) {
        return Err(AppError::input("Synthetic noise must be >= 0."));
    }
    if config.repeats == 0 {
        return Err(AppError::input("At least one repeat is required."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let unit = Normal::new(0.0, 1.0).map_err(|e| AppError::compute(format!("Noise distribution error: {e}")))?;

    let out = &config.out_dir;
    let dataset_dir = out.join("wvg_calib").join(DEFAULT_DATASET);
    let krytar_dir = out.join("krytar_109b");
    let sim_dir = out.join("simulations");
    for dir in [&dataset_dir, &krytar_dir, &sim_dir, &out.join("analyzed")] {
        create_dir_all(dir)
            .map_err(|e| AppError::input(format!("Failed to create '{}': {e}", dir.display())))?;
    }

    let mut files = Vec::new();

    let path_data = out.join(DEFAULT_PATH_DATA);
    write_csv(
        &path_data,
        &["Setting", "Path"],
        [
            [CODE_FOLDER, "."],
            [ANALYZED_DATA_FOLDER, "analyzed"],
            [WVG_CALIB_FOLDER, "wvg_calib"],
            [KRYTAR_109B_FOLDER, "krytar_109b"],
            [SIM_DATA_FOLDER, "simulations"],
        ]
        .iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect()),
    )?;
    files.push(path_data.clone());

    // Detector table, log-spaced so linear interpolation stays accurate at low power.
    let krytar = krytar_dir.join(DETECTOR_CALIB_FILE);
    write_csv(
        &krytar,
        &["Detector Voltage [V]", "Power [dBm]"],
        (0..=400).map(|i| {
            let volts = 10f64.powf(-4.0 + 4.0 * i as f64 / 400.0);
            vec![format!("{volts:.8e}"), format!("{:.8}", 10.0 * (SENSOR_MW_PER_V * volts).log10())]
        }),
    )?;
    files.push(krytar);

    let catalog = sim_dir.join(SIM_CATALOG_FILE);
    write_csv(
        &catalog,
        &["Simulation Key", "Waveguide Electric Field [V/cm]", "Speed [cm/ns]", "File"],
        [
            vec!["wvg_18Vcm_22kV".to_string(), "18".to_string(), BEAM_SPEED_CM_PER_NS.to_string(), "wvg_18Vcm_22kV.csv".to_string()],
            vec![SIM_KEY.to_string(), POWER_SCAN.to_string(), BEAM_SPEED_CM_PER_NS.to_string(), format!("{SIM_KEY}.csv")],
        ],
    )?;
    files.push(catalog);

    let sim_file = sim_dir.join(format!("{SIM_KEY}.csv"));
    let mut sim_rows = Vec::new();
    for d in OFF_AXIS_DISTANCES_MM {
        for f in 894..=926 {
            let freq = f as f64;
            for i in 0..=180 {
                let e = i as f64 * 0.25;
                sim_rows.push(vec![
                    d.to_string(),
                    freq.to_string(),
                    e.to_string(),
                    format!("{:.10}", sim_surv_frac(freq, d, e)),
                ]);
            }
        }
    }
    write_csv(
        &sim_file,
        &["Off-Axis Distance [mm]", "Frequency [MHz]", "E Field [V/cm]", "Surviving Fraction"],
        sim_rows,
    )?;
    files.push(sim_file);

    // Quench curves measured at 1.8 mm off axis.
    let raw = dataset_dir.join(RAW_DATA_FILE);
    let mut raw_rows = Vec::new();
    for repeat in 0..config.repeats {
        for channel in RfChannel::ALL {
            for f in 908..=912 {
                let freq = f as f64;
                for i in 0..N_POWER_SETTINGS {
                    let e_true = 2.0 + 28.0 * i as f64 / (N_POWER_SETTINGS - 1) as f64;
                    let power = e_true * e_true / kappa(channel, freq);
                    let reading = power * (1.0 + POWER_NOISE_REL * unit.sample(&mut rng)) / SENSOR_MW_PER_V;
                    let s = sim_surv_frac(freq, 1.8, e_true);
                    let ratio = s * (1.0 - config.true_offset)
                        + config.true_offset
                        + config.ratio_noise * unit.sample(&mut rng);
                    let dc_off = 1.0 + 0.01 * unit.sample(&mut rng);
                    raw_rows.push(vec![
                        (repeat + 1).to_string(),
                        channel.to_string(),
                        freq.to_string(),
                        format!("{:.4}", 0.05 + 0.01 * i as f64),
                        format!("{reading:.8}"),
                        format!("{:.8}", ratio * dc_off),
                        format!("{dc_off:.8}"),
                    ]);
                }
            }
        }
    }
    write_csv(
        &raw,
        &["Repeat", COL_CHANNEL, COL_FREQ, COL_POWER_SETTING, COL_SENSOR_READING, COL_DC_ON, COL_DC_OFF],
        raw_rows,
    )?;
    files.push(raw);

    let beam = dataset_dir.join(BEAM_DC_FILE);
    write_csv(
        &beam,
        &[COL_ELAPSED, COL_DC, COL_DC_STDOM],
        (0..60).map(|i| {
            let t = 30.0 * i as f64;
            let dc = 1.0 + 0.02 * (t / 300.0).sin() + 0.001 * unit.sample(&mut rng);
            vec![t.to_string(), format!("{dc:.8}"), "0.0005".to_string()]
        }),
    )?;
    files.push(beam);

    tracing::info!(out = %out.display(), files = files.len(), "wrote synthetic calibration data");
    Ok(SynthSummary {
        path_data,
        dataset: DEFAULT_DATASET.to_string(),
        files,
    })
}

fn write_csv(path: &Path, header: &[&str], rows: impl IntoIterator<Item = Vec<String>>) -> Result<(), AppError> {
    let err = |e: csv::Error| AppError::input(format!("Failed to write '{}': {e}", path.display()));
    let mut writer = csv::Writer::from_path(path).map_err(err)?;
    writer.write_record(header).map_err(err)?;
    for row in rows {
        writer.write_record(&row).map_err(err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to write '{}': {e}", path.display())))
}
