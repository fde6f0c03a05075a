//! One waveguide power calibration at a fixed fractional DC offset.
//!
//! The calibration is built in steps, each depending on the previous one:
//!
//! 1. [`WaveguideCalibration::analyze_simulation_quench_curves`]
//! 2. [`WaveguideCalibration::extract_e_fields`]
//! 3. [`WaveguideCalibration::converted_e_field_curve_fits`]
//! 4. [`WaveguideCalibration::quench_curve_fits`]
//! 5. [`WaveguideCalibration::perform_power_calib`]
//! 6. [`WaveguideCalibration::av_calib_data`]
//!
//! [`WaveguideCalibration::run_all`] performs them in order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::calib::extract::extract_e_fields;
use crate::calib::power::{average_calib, perform_power_calib};
use crate::calib::sim_curves::SimCurveSet;
use crate::domain::{
    CalibAverage, CalibParams, CalibPoint, CalibrationFile, ErrorBucket, ExtractedField, GroupFit, GroupKey,
    OffsetVariant, SimCurveSummary, SimPoint, SurvFracRecord,
};
use crate::error::AppError;
use crate::fit::{GroupSeries, fit_groups};
use crate::io::write_calibration_json;

pub const TOOL_NAME: &str = concat!("wvg-calib ", env!("CARGO_PKG_VERSION"));

/// Inputs shared by every offset variant of a run.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationInputs<'a> {
    pub datasets: &'a [String],
    pub simulation_key: &'a str,
    pub sim_points: &'a [SimPoint],
    pub surv_frac_av: &'a [SurvFracRecord],
    pub offset_ceiling: f64,
}

#[derive(Debug, Clone)]
pub struct WaveguideCalibration {
    params: CalibParams,
    variant: OffsetVariant,
    datasets: Vec<String>,
    simulation_key: String,
    sim_points: Vec<SimPoint>,
    surv_frac_av: Vec<SurvFracRecord>,
    offset_ceiling: f64,
    offset_clamped: bool,

    sim_curves: Option<SimCurveSet>,
    extracted: Option<Vec<ExtractedField>>,
    n_extraction_skipped: usize,
    field_fits: Option<Vec<GroupFit>>,
    quench_fits: Option<Vec<GroupFit>>,
    calib: Option<Vec<CalibPoint>>,
    calib_av: Option<Vec<CalibAverage>>,
    av_rf_power_calib_error: Option<Vec<ErrorBucket>>,
}

fn missing_step(step: &str, before: &str) -> AppError {
    AppError::compute(format!("Calibration step `{step}` must run before `{before}`."))
}

impl WaveguideCalibration {
    pub fn new(
        params: CalibParams,
        variant: OffsetVariant,
        offset_clamped: bool,
        inputs: CalibrationInputs<'_>,
    ) -> Result<Self, AppError> {
        params.validate()?;
        if params.fract_dc_offset > inputs.offset_ceiling {
            return Err(AppError::input(format!(
                "Fractional DC offset {} exceeds the ceiling {}.",
                params.fract_dc_offset, inputs.offset_ceiling
            )));
        }
        if inputs.surv_frac_av.is_empty() {
            return Err(AppError::no_data("No averaged survival fractions to calibrate."));
        }
        Ok(Self {
            params,
            variant,
            datasets: inputs.datasets.to_vec(),
            simulation_key: inputs.simulation_key.to_string(),
            sim_points: inputs.sim_points.to_vec(),
            surv_frac_av: inputs.surv_frac_av.to_vec(),
            offset_ceiling: inputs.offset_ceiling,
            offset_clamped,
            sim_curves: None,
            extracted: None,
            n_extraction_skipped: 0,
            field_fits: None,
            quench_fits: None,
            calib: None,
            calib_av: None,
            av_rf_power_calib_error: None,
        })
    }

    /// Run every step in order.
    pub fn run_all(&mut self) -> Result<(), AppError> {
        self.analyze_simulation_quench_curves()?;
        self.extract_e_fields()?;
        self.converted_e_field_curve_fits()?;
        self.quench_curve_fits()?;
        self.perform_power_calib()?;
        self.av_calib_data()?;
        Ok(())
    }

    pub fn analyze_simulation_quench_curves(&mut self) -> Result<Vec<SimCurveSummary>, AppError> {
        let curves = SimCurveSet::analyze(&self.sim_points, &self.params.freq_scan_range)?;
        let summaries = curves.summaries();
        self.sim_curves = Some(curves);
        Ok(summaries)
    }

    pub fn extract_e_fields(&mut self) -> Result<&[ExtractedField], AppError> {
        let curves = self
            .sim_curves
            .as_ref()
            .ok_or_else(|| missing_step("analyze_simulation_quench_curves", "extract_e_fields"))?;
        let in_range: Vec<SurvFracRecord> = self
            .surv_frac_av
            .iter()
            .filter(|r| self.params.freq_scan_range.contains(r.freq_mhz))
            .cloned()
            .collect();
        let extraction = extract_e_fields(&in_range, curves, self.params.fract_dc_offset);
        if extraction.fields.is_empty() {
            return Err(AppError::no_data(format!(
                "No measured survival fraction could be converted to a field amplitude (offset {}).",
                self.params.fract_dc_offset
            )));
        }
        tracing::info!(
            variant = self.variant.label(),
            extracted = extraction.fields.len(),
            skipped = extraction.skipped,
            "extracted RF field amplitudes"
        );
        self.n_extraction_skipped = extraction.skipped;
        Ok(self.extracted.insert(extraction.fields).as_slice())
    }

    /// Fit E² vs detected power per (channel, frequency).
    pub fn converted_e_field_curve_fits(&mut self) -> Result<&[GroupFit], AppError> {
        let extracted = self
            .extracted
            .as_ref()
            .ok_or_else(|| missing_step("extract_e_fields", "converted_e_field_curve_fits"))?;
        let series = group_series(
            extracted
                .iter()
                .map(|f| (GroupKey::new(f.channel, f.freq_mhz), f.detected_power_mw, f.e_field * f.e_field)),
        );
        let boundary = self.params.use_boundary_conditions.then_some(0.0);
        let fits = fit_groups(&series, self.params.poly_fit_order, boundary)?;
        Ok(self.field_fits.insert(fits).as_slice())
    }

    /// Fit DC On/Off ratio vs detected power per (channel, frequency).
    pub fn quench_curve_fits(&mut self) -> Result<&[GroupFit], AppError> {
        let series = group_series(
            self.surv_frac_av
                .iter()
                .filter(|r| self.params.freq_scan_range.contains(r.freq_mhz))
                .map(|r| (GroupKey::new(r.channel, r.freq_mhz), r.detected_power_mw, r.dc_ratio)),
        );
        let boundary = self.params.use_boundary_conditions.then_some(1.0);
        let fits = fit_groups(&series, self.params.poly_fit_order, boundary)?;
        Ok(self.quench_fits.insert(fits).as_slice())
    }

    pub fn perform_power_calib(&mut self) -> Result<&[CalibPoint], AppError> {
        let curves = self
            .sim_curves
            .as_ref()
            .ok_or_else(|| missing_step("analyze_simulation_quench_curves", "perform_power_calib"))?;
        let field_fits = self
            .field_fits
            .as_deref()
            .ok_or_else(|| missing_step("converted_e_field_curve_fits", "perform_power_calib"))?;
        let quench_fits = self
            .quench_fits
            .as_deref()
            .ok_or_else(|| missing_step("quench_curve_fits", "perform_power_calib"))?;

        let points = perform_power_calib(
            &self.params.e_field_targets(),
            self.params.fract_dc_offset,
            field_fits,
            quench_fits,
            curves,
        );
        if points.is_empty() {
            return Err(AppError::no_data(format!(
                "No requested field amplitude in [{}, {}] V/cm lies inside the measured power range.",
                self.params.min_e_field, self.params.max_e_field
            )));
        }
        Ok(self.calib.insert(points).as_slice())
    }

    pub fn av_calib_data(&mut self) -> Result<&[CalibAverage], AppError> {
        let calib = self
            .calib
            .as_deref()
            .ok_or_else(|| missing_step("perform_power_calib", "av_calib_data"))?;
        let averaged = average_calib(calib);
        tracing::info!(
            variant = self.variant.label(),
            offset = self.params.fract_dc_offset,
            points = averaged.len(),
            "averaged power calibration"
        );
        Ok(self.calib_av.insert(averaged).as_slice())
    }

    pub fn set_av_rf_power_calib_error(&mut self, buckets: Vec<ErrorBucket>) {
        self.av_rf_power_calib_error = Some(buckets);
    }

    pub fn params(&self) -> &CalibParams {
        &self.params
    }

    pub fn variant(&self) -> OffsetVariant {
        self.variant
    }

    pub fn offset_clamped(&self) -> bool {
        self.offset_clamped
    }

    pub fn sim_curves(&self) -> Option<&SimCurveSet> {
        self.sim_curves.as_ref()
    }

    pub fn extracted(&self) -> &[ExtractedField] {
        self.extracted.as_deref().unwrap_or_default()
    }

    pub fn n_extraction_skipped(&self) -> usize {
        self.n_extraction_skipped
    }

    pub fn field_fits(&self) -> &[GroupFit] {
        self.field_fits.as_deref().unwrap_or_default()
    }

    pub fn quench_fits(&self) -> &[GroupFit] {
        self.quench_fits.as_deref().unwrap_or_default()
    }

    pub fn calib(&self) -> &[CalibPoint] {
        self.calib.as_deref().unwrap_or_default()
    }

    pub fn calib_av(&self) -> &[CalibAverage] {
        self.calib_av.as_deref().unwrap_or_default()
    }

    pub fn av_rf_power_calib_error(&self) -> Option<&[ErrorBucket]> {
        self.av_rf_power_calib_error.as_deref()
    }

    /// Snapshot for persistence.
    pub fn to_file(&self) -> CalibrationFile {
        CalibrationFile {
            tool: TOOL_NAME.to_string(),
            created: Local::now().naive_local(),
            variant: self.variant,
            params: self.params.clone(),
            datasets: self.datasets.clone(),
            simulation_key: self.simulation_key.clone(),
            offset_ceiling: self.offset_ceiling,
            offset_clamped: self.offset_clamped,
            sim_curves: self.sim_curves.as_ref().map(SimCurveSet::summaries).unwrap_or_default(),
            extracted: self.extracted().to_vec(),
            n_extraction_skipped: self.n_extraction_skipped,
            field_fits: self.field_fits().to_vec(),
            quench_fits: self.quench_fits().to_vec(),
            calib: self.calib().to_vec(),
            calib_av: self.calib_av().to_vec(),
            av_rf_power_calib_error: self.av_rf_power_calib_error.clone(),
        }
    }

    /// Write the calibration as JSON into `folder`.
    pub fn save(&self, folder: &Path) -> Result<PathBuf, AppError> {
        write_calibration_json(folder, &self.to_file())
    }
}

/// Collect `(key, x, y)` observations into per-curve series, ordered by key.
fn group_series(obs: impl Iterator<Item = (GroupKey, f64, f64)>) -> Vec<GroupSeries> {
    let mut groups: BTreeMap<GroupKey, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for (key, x, y) in obs {
        let (xs, ys) = groups.entry(key).or_default();
        xs.push(x);
        ys.push(y);
    }
    groups
        .into_iter()
        .map(|(key, (xs, ys))| GroupSeries { key, xs, ys })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::offset::expected_ratio;
    use crate::domain::RfChannel;
    use chrono::NaiveDate;

    const KAPPA: f64 = 40.0;
    const OFFSET: f64 = 0.02;

    fn model(e: f64, freq_mhz: f64) -> f64 {
        let e_pi = 32.0 + 0.1 * (freq_mhz - 910.0);
        1.0 - 0.95 * (std::f64::consts::FRAC_PI_2 * e / e_pi).sin().powi(2)
    }

    fn sim_points() -> Vec<SimPoint> {
        let mut out = Vec::new();
        for freq in [906.0, 908.0, 910.0, 912.0, 914.0] {
            for i in 0..=160 {
                let e = i as f64 * 0.25;
                out.push(SimPoint {
                    off_axis_mm: 1.8,
                    freq_mhz: freq,
                    e_field: e,
                    surv_frac: model(e, freq),
                });
            }
        }
        out
    }

    fn records() -> Vec<SurvFracRecord> {
        let mut out = Vec::new();
        for channel in RfChannel::ALL {
            for freq in [908.0, 910.0, 912.0] {
                for i in 1..=20 {
                    let e = 1.5 * i as f64;
                    out.push(SurvFracRecord {
                        dataset: "ds".to_string(),
                        channel,
                        freq_mhz: freq,
                        power_setting: i as f64,
                        detected_power_mw: e * e / KAPPA,
                        detected_power_stdom_mw: 0.0,
                        dc_ratio: expected_ratio(model(e, freq), OFFSET),
                        dc_ratio_stdom: 0.001,
                        n_repeats: 3,
                    });
                }
            }
        }
        out
    }

    fn params(offset: f64) -> CalibParams {
        CalibParams {
            date: NaiveDate::from_ymd_opt(2018, 5, 22).unwrap(),
            waveguide_separation_cm: 4.0,
            accelerating_voltage_kv: 22.17,
            freq_scan_range: "894-926".parse().unwrap(),
            off_axis_distance_mm: 1.8,
            fract_dc_offset: offset,
            min_e_field: 5.0,
            max_e_field: 27.0,
            use_boundary_conditions: false,
            poly_fit_order: 4,
        }
    }

    fn calibration(offset: f64, sim: &[SimPoint], recs: &[SurvFracRecord], datasets: &[String]) -> WaveguideCalibration {
        let ceiling = recs.iter().map(|r| r.dc_ratio).fold(f64::INFINITY, f64::min);
        WaveguideCalibration::new(
            params(offset),
            OffsetVariant::Nominal,
            false,
            CalibrationInputs {
                datasets,
                simulation_key: "sim",
                sim_points: sim,
                surv_frac_av: recs,
                offset_ceiling: ceiling,
            },
        )
        .unwrap()
    }

    #[test]
    fn steps_must_run_in_order() {
        let (sim, recs, ds) = (sim_points(), records(), vec!["ds".to_string()]);
        let mut calib = calibration(OFFSET, &sim, &recs, &ds);
        assert_eq!(calib.extract_e_fields().unwrap_err().exit_code(), 4);
        assert!(calib.perform_power_calib().is_err());
        assert!(calib.av_calib_data().is_err());
    }

    #[test]
    fn calibration_recovers_true_power_at_true_offset() {
        let (sim, recs, ds) = (sim_points(), records(), vec!["ds".to_string()]);
        let mut calib = calibration(OFFSET, &sim, &recs, &ds);
        calib.run_all().unwrap();

        assert_eq!(calib.n_extraction_skipped(), 0);
        assert_eq!(calib.field_fits().len(), 6);
        assert_eq!(calib.quench_fits().len(), 6);
        for av in calib.calib_av() {
            let truth = av.e_field * av.e_field / KAPPA;
            assert!(
                (av.mean_mw / truth - 1.0).abs() < 0.02,
                "{:?} at {} V/cm: {} vs {}",
                av.channel,
                av.e_field,
                av.mean_mw,
                truth
            );
        }
        let file = calib.to_file();
        assert_eq!(file.calib_av.len(), calib.calib_av().len());
        assert_eq!(file.sim_curves.len(), 5);
        assert!(file.av_rf_power_calib_error.is_none());
    }

    #[test]
    fn larger_offset_shifts_the_calibration() {
        let (sim, recs, ds) = (sim_points(), records(), vec!["ds".to_string()]);
        let mut nominal = calibration(OFFSET, &sim, &recs, &ds);
        nominal.run_all().unwrap();
        let mut half = calibration(OFFSET * 0.5, &sim, &recs, &ds);
        half.run_all().unwrap();

        let n = nominal.calib_av().iter().find(|a| a.e_field == 20.0).unwrap();
        let h = half
            .calib_av()
            .iter()
            .find(|a| a.channel == n.channel && a.e_field == 20.0 && a.freq_mhz == n.freq_mhz)
            .unwrap();
        assert_ne!(n.mean_mw, h.mean_mw);
    }

    #[test]
    fn records_outside_scan_range_are_not_calibrated() {
        let (sim, ds) = (sim_points(), vec!["ds".to_string()]);
        let mut recs = records();
        let outside: Vec<SurvFracRecord> = recs
            .iter()
            .filter(|r| r.freq_mhz == 910.0)
            .map(|r| SurvFracRecord {
                freq_mhz: 930.0,
                ..r.clone()
            })
            .collect();
        recs.extend(outside);

        let mut calib = calibration(OFFSET, &sim, &recs, &ds);
        calib.run_all().unwrap();

        assert!(calib.extracted().iter().all(|f| f.freq_mhz != 930.0));
        assert_eq!(calib.field_fits().len(), 6);
        assert!(calib.field_fits().iter().all(|g| g.freq_mhz != 930.0));
        assert!(calib.quench_fits().iter().all(|g| g.freq_mhz != 930.0));
        assert!(calib.calib_av().iter().all(|a| a.freq_mhz != 930.0));
    }

    #[test]
    fn accepts_zero_offset_from_floored_ceiling() {
        let (sim, mut recs, ds) = (sim_points(), records(), vec!["ds".to_string()]);
        recs[0].dc_ratio = -0.001;
        let ceiling = crate::calib::offset::offset_ceiling(&recs).unwrap();
        let decision = crate::calib::offset::check_fract_offset(OFFSET, ceiling);
        let result = WaveguideCalibration::new(
            params(decision.value),
            OffsetVariant::Nominal,
            decision.clamped,
            CalibrationInputs {
                datasets: &ds,
                simulation_key: "sim",
                sim_points: &sim,
                surv_frac_av: &recs,
                offset_ceiling: ceiling,
            },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_offset_above_ceiling() {
        let (sim, recs, ds) = (sim_points(), records(), vec!["ds".to_string()]);
        let result = WaveguideCalibration::new(
            params(0.5),
            OffsetVariant::Nominal,
            false,
            CalibrationInputs {
                datasets: &ds,
                simulation_key: "sim",
                sim_points: &sim,
                surv_frac_av: &recs,
                offset_ceiling: 0.1,
            },
        );
        assert_eq!(result.unwrap_err().exit_code(), 2);
    }
}
