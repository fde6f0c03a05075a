//! Command-line parsing for the waveguide power calibration.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! calibration code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::domain::{RfChannel, ScanRange};
use crate::io::{DEFAULT_DATASET, POWER_SCAN};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "wvg-calib", version, about = "Waveguide RF power calibration from quench curves")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calibrate at the nominal, half and 1.5x fractional DC offsets and report the systematic error.
    Run(RunArgs),
    /// Print a saved calibration file.
    Show(ShowArgs),
    /// Write a synthetic data tree (path table, data set, detector table, simulations).
    Synth(SynthArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Path table CSV. Defaults to $WVG_PATH_DATA, then `path_data.csv`.
    #[arg(short = 'c', long, value_name = "CSV")]
    pub config: Option<PathBuf>,

    /// Experiment folder name; repeat to combine data sets.
    #[arg(short = 'd', long = "dataset", value_name = "NAME", default_values_t = [DEFAULT_DATASET.to_string()])]
    pub datasets: Vec<String>,

    /// Re-average the raw data even if cached averages exist.
    #[arg(long)]
    pub recompute: bool,

    /// Beam speed used to pick the simulation (cm/ns).
    #[arg(long, default_value_t = 0.2254)]
    pub speed: f64,

    /// Simulation scan type.
    #[arg(long, default_value = POWER_SCAN)]
    pub scan_type: String,

    /// Nominal fractional DC offset.
    #[arg(long, default_value_t = 0.02)]
    pub offset: f64,

    /// Calibration date (YYYY-MM-DD). Defaults to the acquisition date of the first data set.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Waveguide separation (cm).
    #[arg(long, default_value_t = 4.0)]
    pub separation: f64,

    /// Accelerating voltage (kV). Defaults to the value in the data set name.
    #[arg(long)]
    pub voltage: Option<f64>,

    /// RF frequency scan range (MHz), e.g. 894-926.
    #[arg(long, default_value = "894-926")]
    pub freq_range: ScanRange,

    /// Atom off-axis distance of the simulation (mm).
    #[arg(long, default_value_t = 1.8)]
    pub off_axis: f64,

    /// Smallest calibrated RF field amplitude (V/cm).
    #[arg(long, default_value_t = 5.0)]
    pub e_min: f64,

    /// Largest calibrated RF field amplitude (V/cm).
    #[arg(long, default_value_t = 27.0)]
    pub e_max: f64,

    /// Pin the fits at zero power: E²(0) = 0 and ratio(0) = 1.
    #[arg(long)]
    pub boundary_conditions: bool,

    /// Polynomial order of the quench-curve fits.
    #[arg(long, default_value_t = 4)]
    pub order: usize,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// RF channel shown in the detailed tables and plots.
    #[arg(long, value_enum, ignore_case = true, default_value_t = RfChannel::A)]
    pub channel: RfChannel,

    /// RF frequency of the plotted quench curve (MHz). Defaults to the channel's first frequency.
    #[arg(long)]
    pub freq: Option<f64>,

    /// Field amplitude of the comparison table and plot (V/cm).
    #[arg(long, default_value_t = 8.0)]
    pub e_field: f64,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export the variant comparison to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_comparison: Option<PathBuf>,

    /// Export the aggregated power error to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_error: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Calibration JSON written by `wvg-calib run`.
    #[arg(long, value_name = "JSON")]
    pub calib: PathBuf,

    /// RF channel of the calibration table.
    #[arg(long, value_enum, ignore_case = true, default_value_t = RfChannel::A)]
    pub channel: RfChannel,

    /// Field amplitude of the calibration table (V/cm).
    #[arg(long, default_value_t = 5.0)]
    pub e_field: f64,
}

#[derive(Debug, Parser)]
pub struct SynthArgs {
    /// Output directory.
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// True fractional DC offset of the synthetic detector.
    #[arg(long, default_value_t = 0.02)]
    pub offset: f64,

    /// Noise of a single DC On/Off ratio.
    #[arg(long, default_value_t = 0.002)]
    pub noise: f64,

    /// Repeats per (channel, frequency, power setting).
    #[arg(long, default_value_t = 3)]
    pub repeats: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["wvg-calib", "run"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.datasets, vec![DEFAULT_DATASET.to_string()]);
        assert_eq!(args.offset, 0.02);
        assert_eq!(args.freq_range.to_string(), "894-926");
        assert_eq!((args.e_min, args.e_max, args.order), (5.0, 27.0, 4));
        assert!(!args.boundary_conditions);
        assert_eq!(args.scan_type, POWER_SCAN);
    }

    #[test]
    fn repeated_datasets_and_channel() {
        let cli = Cli::parse_from([
            "wvg-calib", "run", "-d", "a", "-d", "b", "--channel", "B", "--freq-range", "900-920",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.datasets, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(args.channel, RfChannel::B);
        assert_eq!(args.freq_range.min_mhz, 900.0);
    }
}
