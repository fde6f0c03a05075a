//! Shared calibration pipeline.
//!
//! path table -> data sets -> simulation -> offset variants -> comparison ->
//! error aggregation -> persisted calibrations.
//!
//! The front-end (`app`) only formats what this returns.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::calib::{CalibrationInputs, OffsetDecision, WaveguideCalibration, check_fract_offset, offset_ceiling};
use crate::domain::{CalibParams, ErrorBucket, OffsetVariant, RunConfig, SimCatalogEntry, SurvFracRecord};
use crate::error::AppError;
use crate::io::{PathTable, QuenchCurveDataSet, QuenchSimulationSet, combine_surv_frac, load_catalog, select_simulation};
use crate::systematics::{ComparisonRow, aggregate_calib_error, compare_calibrations};

/// One offset variant of the study.
#[derive(Debug, Clone)]
pub struct VariantRun {
    pub offset: OffsetDecision,
    pub calibration: WaveguideCalibration,
    pub saved_to: PathBuf,
}

/// All computed outputs of a single `wvg-calib run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub data_sets: Vec<QuenchCurveDataSet>,
    pub surv_frac_av: Vec<SurvFracRecord>,
    pub simulation: SimCatalogEntry,
    pub off_axis_distances: Vec<f64>,
    pub offset_ceiling: f64,
    pub variants: BTreeMap<OffsetVariant, VariantRun>,
    pub comparison: Vec<ComparisonRow>,
    /// Half-offset deviation, attached to the nominal calibration.
    pub av_calib_error: Vec<ErrorBucket>,
    /// 1.5×-offset deviation, reported alongside.
    pub plus_half_calib_error: Vec<ErrorBucket>,
}

impl RunOutput {
    pub fn variant(&self, variant: OffsetVariant) -> Result<&VariantRun, AppError> {
        self.variants
            .get(&variant)
            .ok_or_else(|| AppError::compute(format!("Missing {} calibration.", variant.label())))
    }
}

/// Execute the full calibration pipeline.
pub fn run_calibration(config: &RunConfig) -> Result<RunOutput, AppError> {
    if config.datasets.is_empty() {
        return Err(AppError::input("At least one data set is required."));
    }

    // 1) Folders.
    let paths = PathTable::load(&config.path_data)?;
    let wvg_calib_folder = paths.wvg_calib_folder()?.to_path_buf();

    // 2) Data sets.
    let data_sets = config
        .datasets
        .iter()
        .map(|name| QuenchCurveDataSet::load(&paths, name, !config.recompute_averages))
        .collect::<Result<Vec<_>, AppError>>()?;
    let surv_frac_av = combine_surv_frac(&data_sets);
    let ceiling = offset_ceiling(&surv_frac_av)?;
    tracing::info!(records = surv_frac_av.len(), offset_ceiling = ceiling, "loaded survival fractions");

    // 3) Simulation.
    let catalog = load_catalog(&paths)?;
    let entry = select_simulation(&catalog, &config.scan_type, config.beam_speed_cm_per_ns)?.clone();
    let sim_set = QuenchSimulationSet::load(&entry)?;
    let off_axis_distances = sim_set.list_simulations();
    let sim_points = sim_set.simulation_data(config.off_axis_distance_mm)?;

    // 4) Parameters shared by the variants.
    let first = &data_sets[0].id;
    let date = config.date.unwrap_or_else(|| first.acquired.date());
    let accelerating_voltage_kv = config
        .accelerating_voltage_kv
        .or(first.accelerating_voltage_kv)
        .ok_or_else(|| {
            AppError::input(format!(
                "Accelerating voltage is not encoded in '{}'; pass it explicitly.",
                first.name
            ))
        })?;
    let dataset_names: Vec<String> = data_sets.iter().map(|d| d.id.name.clone()).collect();
    let inputs = CalibrationInputs {
        datasets: &dataset_names,
        simulation_key: &entry.key,
        sim_points: &sim_points,
        surv_frac_av: &surv_frac_av,
        offset_ceiling: ceiling,
    };

    // 5) Offset variants, nominal first.
    let nominal = check_fract_offset(config.nominal_offset, ceiling);
    let mut variants = BTreeMap::new();
    for variant in OffsetVariant::ALL {
        let offset = match variant {
            OffsetVariant::Nominal => nominal,
            other => check_fract_offset(nominal.value * other.factor(), ceiling),
        };
        let params = CalibParams {
            date,
            waveguide_separation_cm: config.waveguide_separation_cm,
            accelerating_voltage_kv,
            freq_scan_range: config.freq_scan_range,
            off_axis_distance_mm: config.off_axis_distance_mm,
            fract_dc_offset: offset.value,
            min_e_field: config.min_e_field,
            max_e_field: config.max_e_field,
            use_boundary_conditions: config.use_boundary_conditions,
            poly_fit_order: config.poly_fit_order,
        };

        let _span = tracing::info_span!("variant", name = variant.label(), offset = offset.value).entered();
        let mut calibration = WaveguideCalibration::new(params, variant, offset.clamped, inputs)?;
        calibration.run_all()?;
        let saved_to = calibration.save(&wvg_calib_folder)?;
        variants.insert(
            variant,
            VariantRun {
                offset,
                calibration,
                saved_to,
            },
        );
    }

    let mut run = RunOutput {
        data_sets,
        surv_frac_av,
        simulation: entry,
        off_axis_distances,
        offset_ceiling: ceiling,
        variants,
        comparison: Vec::new(),
        av_calib_error: Vec::new(),
        plus_half_calib_error: Vec::new(),
    };

    // 6) Sensitivity comparison and systematic error.
    let (comparison, av_calib_error, plus_half_calib_error) = {
        let nominal = run.variant(OffsetVariant::Nominal)?;
        let half = run.variant(OffsetVariant::Half)?;
        let plus_half = run.variant(OffsetVariant::PlusHalf)?;

        if plus_half.offset.clamped {
            tracing::warn!(
                requested = plus_half.offset.requested,
                used = plus_half.offset.value,
                "1.5x offset was clamped to the ceiling; its deviation understates the opposite-sign error"
            );
        }
        (
            compare_calibrations(
                nominal.calibration.calib_av(),
                half.calibration.calib_av(),
                plus_half.calibration.calib_av(),
            ),
            aggregate_calib_error(nominal.calibration.calib_av(), half.calibration.calib_av()),
            aggregate_calib_error(nominal.calibration.calib_av(), plus_half.calibration.calib_av()),
        )
    };
    run.comparison = comparison;
    run.av_calib_error = av_calib_error;
    run.plus_half_calib_error = plus_half_calib_error;
    if run.av_calib_error.is_empty() {
        return Err(AppError::no_data(
            "Nominal and half-offset calibrations share no (channel, field, frequency) point.",
        ));
    }

    // 7) Attach the error to the nominal calibration and save it again.
    let av_calib_error = run.av_calib_error.clone();
    if let Some(nominal) = run.variants.get_mut(&OffsetVariant::Nominal) {
        nominal.calibration.set_av_rf_power_calib_error(av_calib_error);
        nominal.saved_to = nominal.calibration.save(&wvg_calib_folder)?;
    }

    Ok(run)
}
