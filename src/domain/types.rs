//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during the calibration
//! - cached (averaged survival fractions) and persisted (calibration files)
//! - reloaded later for printing or comparisons

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// RF system channel feeding one of the two waveguides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
pub enum RfChannel {
    A,
    B,
}

impl RfChannel {
    pub const ALL: [RfChannel; 2] = [RfChannel::A, RfChannel::B];

    pub fn label(self) -> &'static str {
        match self {
            RfChannel::A => "A",
            RfChannel::B => "B",
        }
    }
}

impl fmt::Display for RfChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RfChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(RfChannel::A),
            "B" | "b" => Ok(RfChannel::B),
            other => Err(format!("Unknown RF channel '{other}' (expected A or B).")),
        }
    }
}

/// Frequency in kHz, an exact grouping key for MHz values read from files.
pub fn freq_key(freq_mhz: f64) -> i64 {
    (freq_mhz * 1e3).round() as i64
}

/// Field amplitude in mV/cm, an exact grouping key for V/cm values.
pub fn field_key(e_field: f64) -> i64 {
    (e_field * 1e3).round() as i64
}

/// (channel, frequency) key of one quench curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub channel: RfChannel,
    pub freq_khz: i64,
}

impl GroupKey {
    pub fn new(channel: RfChannel, freq_mhz: f64) -> Self {
        Self {
            channel,
            freq_khz: freq_key(freq_mhz),
        }
    }

    pub fn freq_mhz(self) -> f64 {
        self.freq_khz as f64 / 1e3
    }
}

/// Inclusive RF frequency range, written as `"894-926"` (MHz).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScanRange {
    pub min_mhz: f64,
    pub max_mhz: f64,
}

impl ScanRange {
    pub fn contains(&self, freq_mhz: f64) -> bool {
        freq_mhz >= self.min_mhz && freq_mhz <= self.max_mhz
    }
}

impl FromStr for ScanRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (lo, hi) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid frequency range '{s}' (expected e.g. 894-926)."))?;
        let min_mhz: f64 = lo
            .trim()
            .parse()
            .map_err(|_| format!("Invalid lower frequency in range '{s}'."))?;
        let max_mhz: f64 = hi
            .trim()
            .parse()
            .map_err(|_| format!("Invalid upper frequency in range '{s}'."))?;
        if !(min_mhz.is_finite() && max_mhz.is_finite() && max_mhz > min_mhz) {
            return Err(format!("Frequency range '{s}' must satisfy min < max."));
        }
        Ok(Self { min_mhz, max_mhz })
    }
}

impl TryFrom<String> for ScanRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScanRange> for String {
    fn from(value: ScanRange) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ScanRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min_mhz, self.max_mhz)
    }
}

/// Information encoded in an experiment folder name such as
/// `180522-195929 - Waveguide Calibration - 0 config, PD ON 82.5 V, 22.17 kV, 908-912 MHz`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetId {
    pub name: String,
    pub acquired: NaiveDateTime,
    pub accelerating_voltage_kv: Option<f64>,
    pub freq_range: Option<ScanRange>,
}

impl DatasetId {
    pub fn parse(name: &str) -> Result<Self, AppError> {
        let stamp = name.split(" - ").next().unwrap_or("").trim();
        let acquired = NaiveDateTime::parse_from_str(stamp, "%y%m%d-%H%M%S").map_err(|e| {
            AppError::input(format!(
                "Dataset name '{name}' does not start with a yymmdd-HHMMSS timestamp: {e}"
            ))
        })?;

        let mut accelerating_voltage_kv = None;
        let mut freq_range = None;
        for token in name.split(',').map(str::trim) {
            if let Some(v) = token.strip_suffix("kV") {
                accelerating_voltage_kv = v.trim().parse().ok();
            } else if let Some(r) = token.strip_suffix("MHz") {
                freq_range = r.trim().parse().ok();
            }
        }

        Ok(Self {
            name: name.to_string(),
            acquired,
            accelerating_voltage_kv,
            freq_range,
        })
    }
}

/// Averaged survival fraction at one (channel, frequency, power setting).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvFracRecord {
    pub dataset: String,
    pub channel: RfChannel,
    pub freq_mhz: f64,
    pub power_setting: f64,
    pub detected_power_mw: f64,
    pub detected_power_stdom_mw: f64,
    /// DC On/Off Ratio.
    pub dc_ratio: f64,
    pub dc_ratio_stdom: f64,
    pub n_repeats: usize,
}

/// Beam DC with all RF off, sampled during the scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamDcSample {
    pub elapsed_s: f64,
    pub dc_v: f64,
    pub dc_stdom_v: f64,
}

/// Scatter of the RF-off beam DC over the scan compared with the per-trace STDOM.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamDcSummary {
    pub n: usize,
    pub mean_dc_v: f64,
    /// Sample standard deviation of DC across the scan.
    pub dc_std_v: f64,
    /// Mean per-trace STDOM.
    pub mean_stdom_v: f64,
}

/// One row of the simulation catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimCatalogEntry {
    pub key: String,
    /// `Power Scan` or the fixed field the simulation was run at.
    pub scan_type: String,
    pub speed_cm_per_ns: f64,
    pub file: PathBuf,
}

/// One simulated surviving fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimPoint {
    pub off_axis_mm: f64,
    pub freq_mhz: f64,
    pub e_field: f64,
    pub surv_frac: f64,
}

/// Fractional DC offset variant of the sensitivity study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetVariant {
    Nominal,
    Half,
    PlusHalf,
}

impl OffsetVariant {
    /// Evaluation order; the nominal variant comes first.
    pub const ALL: [OffsetVariant; 3] = [OffsetVariant::Nominal, OffsetVariant::Half, OffsetVariant::PlusHalf];

    /// Multiplier applied to the nominal offset.
    pub fn factor(self) -> f64 {
        match self {
            OffsetVariant::Nominal => 1.0,
            OffsetVariant::Half => 0.5,
            OffsetVariant::PlusHalf => 1.5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OffsetVariant::Nominal => "nominal",
            OffsetVariant::Half => "half",
            OffsetVariant::PlusHalf => "plus_half",
        }
    }
}

/// Settings of one waveguide power calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibParams {
    pub date: NaiveDate,
    pub waveguide_separation_cm: f64,
    pub accelerating_voltage_kv: f64,
    pub freq_scan_range: ScanRange,
    /// Atom off-axis distance used to pick the simulation.
    pub off_axis_distance_mm: f64,
    pub fract_dc_offset: f64,
    pub min_e_field: f64,
    pub max_e_field: f64,
    pub use_boundary_conditions: bool,
    pub poly_fit_order: usize,
}

impl CalibParams {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.fract_dc_offset.is_finite() && (0.0..1.0).contains(&self.fract_dc_offset)) {
            return Err(AppError::input(format!(
                "Fractional DC offset must be in [0, 1), got {}.",
                self.fract_dc_offset
            )));
        }
        if !(self.min_e_field.is_finite() && self.max_e_field.is_finite())
            || self.min_e_field <= 0.0
            || self.max_e_field < self.min_e_field
        {
            return Err(AppError::input(format!(
                "Invalid RF E field range [{}, {}] V/cm.",
                self.min_e_field, self.max_e_field
            )));
        }
        if self.poly_fit_order == 0 {
            return Err(AppError::input("Polynomial fit order must be >= 1."));
        }
        Ok(())
    }

    /// Requested field amplitudes: `min..=max` in 1 V/cm steps.
    pub fn e_field_targets(&self) -> Vec<f64> {
        let mut out = Vec::new();
        let mut e = self.min_e_field;
        while e <= self.max_e_field + 1e-9 {
            out.push(e);
            e += 1.0;
        }
        out
    }
}

/// Polynomial basis: powers `1..=order`, plus the constant term when `intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolyBasis {
    pub order: usize,
    pub intercept: bool,
}

impl PolyBasis {
    pub fn len(self) -> usize {
        self.order + usize::from(self.intercept)
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
}

/// Fitted polynomial `y(x) = offset + Σ c_k (x / x_scale)^k`.
///
/// `offset` is the fixed value at `x = 0` when the basis has no intercept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolyFit {
    pub basis: PolyBasis,
    pub coeffs: Vec<f64>,
    pub offset: f64,
    pub x_scale: f64,
    pub x_min: f64,
    pub x_max: f64,
    pub quality: FitQuality,
}

/// Fit of one quench curve (channel, frequency).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupFit {
    pub channel: RfChannel,
    pub freq_mhz: f64,
    pub fit: PolyFit,
}

/// Monotonic segment of one simulated quench curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimCurveSummary {
    pub freq_mhz: f64,
    pub n_points: usize,
    /// Field of the first minimum of the surviving fraction.
    pub pi_pulse_e_field: f64,
    pub min_surv_frac: f64,
}

/// Field amplitude extracted from a measured survival fraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedField {
    pub channel: RfChannel,
    pub freq_mhz: f64,
    pub power_setting: f64,
    pub detected_power_mw: f64,
    pub dc_ratio: f64,
    /// Survival fraction after the DC offset correction.
    pub surv_frac: f64,
    pub e_field: f64,
    /// Absent where the simulated curve is flat.
    pub e_field_sigma: Option<f64>,
}

/// Which fit produced a calibration estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibMethod {
    /// E² vs detected power fit.
    FieldFit,
    /// DC On/Off ratio vs detected power fit, mapped through the simulation.
    QuenchFit,
}

/// Detected RF power needed for a field amplitude, from one method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibPoint {
    pub channel: RfChannel,
    pub e_field: f64,
    pub freq_mhz: f64,
    pub method: CalibMethod,
    pub detected_power_mw: f64,
}

/// Method-averaged detected RF power per (channel, field, frequency).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibAverage {
    pub channel: RfChannel,
    pub e_field: f64,
    pub freq_mhz: f64,
    pub mean_mw: f64,
    /// Standard error of the mean; absent for a single estimate.
    pub stdom_mw: Option<f64>,
    pub n: usize,
}

/// Aggregated fractional power error for one E² bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBucket {
    /// E² [V²/cm²], proportional to RF power.
    pub power_proportional: f64,
    pub mean_fractional_error_pct: f64,
    pub fractional_error_stdom_pct: Option<f64>,
    pub n: usize,
}

/// Persisted calibration object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub tool: String,
    pub created: NaiveDateTime,
    pub variant: OffsetVariant,
    pub params: CalibParams,
    pub datasets: Vec<String>,
    pub simulation_key: String,
    pub offset_ceiling: f64,
    pub offset_clamped: bool,
    pub sim_curves: Vec<SimCurveSummary>,
    pub extracted: Vec<ExtractedField>,
    pub n_extraction_skipped: usize,
    pub field_fits: Vec<GroupFit>,
    pub quench_fits: Vec<GroupFit>,
    pub calib: Vec<CalibPoint>,
    pub calib_av: Vec<CalibAverage>,
    pub av_rf_power_calib_error: Option<Vec<ErrorBucket>>,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub path_data: PathBuf,
    pub datasets: Vec<String>,
    pub recompute_averages: bool,

    pub beam_speed_cm_per_ns: f64,
    pub scan_type: String,
    pub nominal_offset: f64,

    pub date: Option<NaiveDate>,
    pub waveguide_separation_cm: f64,
    pub accelerating_voltage_kv: Option<f64>,
    pub freq_scan_range: ScanRange,
    pub off_axis_distance_mm: f64,
    pub min_e_field: f64,
    pub max_e_field: f64,
    pub use_boundary_conditions: bool,
    pub poly_fit_order: usize,

    pub plot: bool,
    pub plot_channel: RfChannel,
    pub plot_freq_mhz: Option<f64>,
    pub plot_e_field: f64,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_comparison: Option<PathBuf>,
    pub export_error: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_range_parses_and_prints() {
        let r: ScanRange = "894-926".parse().unwrap();
        assert_eq!(r.min_mhz, 894.0);
        assert_eq!(r.max_mhz, 926.0);
        assert!(r.contains(910.0));
        assert!(!r.contains(927.0));
        assert_eq!(r.to_string(), "894-926");
        assert!("926-894".parse::<ScanRange>().is_err());
    }

    #[test]
    fn dataset_id_extracts_timestamp_voltage_and_range() {
        let id = DatasetId::parse(
            "180522-195929 - Waveguide Calibration - 0 config, PD ON 82.5 V, 22.17 kV, 908-912 MHz",
        )
        .unwrap();
        assert_eq!(id.acquired.date(), NaiveDate::from_ymd_opt(2018, 5, 22).unwrap());
        assert_eq!(id.accelerating_voltage_kv, Some(22.17));
        let range = id.freq_range.unwrap();
        assert_eq!((range.min_mhz, range.max_mhz), (908.0, 912.0));
    }

    #[test]
    fn dataset_id_requires_timestamp() {
        assert!(DatasetId::parse("Waveguide Calibration").is_err());
    }

    #[test]
    fn e_field_targets_are_inclusive() {
        let params = CalibParams {
            date: NaiveDate::from_ymd_opt(2018, 5, 22).unwrap(),
            waveguide_separation_cm: 4.0,
            accelerating_voltage_kv: 22.17,
            freq_scan_range: "894-926".parse().unwrap(),
            off_axis_distance_mm: 1.8,
            fract_dc_offset: 0.02,
            min_e_field: 5.0,
            max_e_field: 27.0,
            use_boundary_conditions: false,
            poly_fit_order: 4,
        };
        let targets = params.e_field_targets();
        assert_eq!(targets.len(), 23);
        assert_eq!(targets[0], 5.0);
        assert_eq!(targets[22], 27.0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn variants_carry_offset_factors() {
        let factors: Vec<f64> = OffsetVariant::ALL.iter().map(|v| v.factor()).collect();
        assert_eq!(factors, vec![1.0, 0.5, 1.5]);
    }

    #[test]
    fn channel_parses_case_insensitively() {
        assert_eq!("a".parse::<RfChannel>().unwrap(), RfChannel::A);
        assert_eq!(" B ".parse::<RfChannel>().unwrap(), RfChannel::B);
        assert!("C".parse::<RfChannel>().is_err());
    }
}
