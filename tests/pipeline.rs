//! End-to-end calibration over a synthetic data tree.

use std::path::Path;

use wvg_calib::app::pipeline::run_calibration;
use wvg_calib::data::{SynthConfig, kappa, write_synthetic_tree};
use wvg_calib::domain::{OffsetVariant, RfChannel, RunConfig};
use wvg_calib::io::{DEFAULT_DATASET, POWER_SCAN, read_calibration_json};

fn synth(dir: &Path) -> std::path::PathBuf {
    write_synthetic_tree(&SynthConfig {
        out_dir: dir.to_path_buf(),
        seed: 42,
        true_offset: 0.02,
        ratio_noise: 0.001,
        repeats: 3,
    })
    .unwrap()
    .path_data
}

fn config(path_data: &Path, nominal_offset: f64) -> RunConfig {
    RunConfig {
        path_data: path_data.to_path_buf(),
        datasets: vec![DEFAULT_DATASET.to_string()],
        recompute_averages: false,
        beam_speed_cm_per_ns: 0.2254,
        scan_type: POWER_SCAN.to_string(),
        nominal_offset,
        date: None,
        waveguide_separation_cm: 4.0,
        accelerating_voltage_kv: None,
        freq_scan_range: "894-926".parse().unwrap(),
        off_axis_distance_mm: 1.8,
        min_e_field: 5.0,
        max_e_field: 27.0,
        use_boundary_conditions: false,
        poly_fit_order: 4,
        plot: false,
        plot_channel: RfChannel::A,
        plot_freq_mhz: None,
        plot_e_field: 8.0,
        plot_width: 80,
        plot_height: 20,
        export_comparison: None,
        export_error: None,
    }
}

#[test]
fn calibrates_synthetic_data_at_three_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let path_data = synth(dir.path());

    let run = run_calibration(&config(&path_data, 0.02)).unwrap();

    assert_eq!(run.simulation.key, "wvg_pwr_scan_22kV");
    assert_eq!(run.variants.len(), 3);
    assert!(run.offset_ceiling > 0.03 && run.offset_ceiling < 0.2);

    let offsets: Vec<f64> = OffsetVariant::ALL
        .iter()
        .map(|v| run.variant(*v).unwrap().offset.value)
        .collect();
    assert!((offsets[0] - 0.02).abs() < 1e-15);
    assert!((offsets[1] - 0.01).abs() < 1e-15);
    assert!((offsets[2] - 0.03).abs() < 1e-15);
    assert!(run.variants.values().all(|v| !v.offset.clamped));

    // The nominal offset is the true one, so the calibration recovers E² = κ P.
    let nominal = &run.variant(OffsetVariant::Nominal).unwrap().calibration;
    assert!(!nominal.calib_av().is_empty());
    for av in nominal.calib_av().iter().filter(|a| a.e_field >= 8.0 && a.e_field <= 25.0) {
        let truth = av.e_field * av.e_field / kappa(av.channel, av.freq_mhz);
        assert!(
            (av.mean_mw / truth - 1.0).abs() < 0.05,
            "{} {} V/cm {} MHz: {} vs {}",
            av.channel,
            av.e_field,
            av.freq_mhz,
            av.mean_mw,
            truth
        );
    }

    // Error buckets are keyed by E² of the requested fields and show a real shift.
    assert!(!run.av_calib_error.is_empty());
    assert!(run.av_calib_error.windows(2).all(|w| w[0].power_proportional < w[1].power_proportional));
    let b8 = run
        .av_calib_error
        .iter()
        .find(|b| b.power_proportional == 64.0)
        .unwrap();
    assert!(b8.mean_fractional_error_pct.abs() > 0.0);
    assert!(b8.fractional_error_stdom_pct.is_some());
    assert!(!run.plus_half_calib_error.is_empty());

    // One file per variant; the nominal one carries the aggregated error.
    let files: Vec<_> = run.variants.values().map(|v| v.saved_to.clone()).collect();
    assert!(files.iter().all(|f| f.exists()));
    assert_ne!(files[0], files[1]);
    let saved = read_calibration_json(&run.variant(OffsetVariant::Nominal).unwrap().saved_to).unwrap();
    assert_eq!(saved.variant, OffsetVariant::Nominal);
    let attached = saved.av_rf_power_calib_error.unwrap();
    assert_eq!(attached.len(), run.av_calib_error.len());
    assert!((attached[0].mean_fractional_error_pct - run.av_calib_error[0].mean_fractional_error_pct).abs() < 1e-9);
    let half = read_calibration_json(&run.variant(OffsetVariant::Half).unwrap().saved_to).unwrap();
    assert!(half.av_rf_power_calib_error.is_none());
    assert_eq!(saved.params.accelerating_voltage_kv, 22.17);

    // Comparison rows mirror the nominal calibration.
    assert_eq!(run.comparison.len(), nominal.calib_av().len());
}

#[test]
fn second_run_reuses_cached_averages() {
    let dir = tempfile::tempdir().unwrap();
    let path_data = synth(dir.path());
    let cfg = config(&path_data, 0.02);

    let first = run_calibration(&cfg).unwrap();
    assert!(!first.data_sets[0].loaded_from_cache);
    let second = run_calibration(&cfg).unwrap();
    assert!(second.data_sets[0].loaded_from_cache);
    assert_eq!(first.surv_frac_av.len(), second.surv_frac_av.len());

    let recompute = RunConfig {
        recompute_averages: true,
        ..cfg
    };
    assert!(!run_calibration(&recompute).unwrap().data_sets[0].loaded_from_cache);
}

#[test]
fn offsets_above_the_ceiling_are_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let path_data = synth(dir.path());

    let mut cfg = config(&path_data, 0.9);
    cfg.max_e_field = 20.0;
    let run = run_calibration(&cfg).unwrap();

    let nominal = run.variant(OffsetVariant::Nominal).unwrap();
    assert!(nominal.offset.clamped);
    assert_eq!(nominal.offset.value, run.offset_ceiling);
    let half = run.variant(OffsetVariant::Half).unwrap();
    assert!(!half.offset.clamped);
    assert_eq!(half.offset.value, run.offset_ceiling * 0.5);
    let plus_half = run.variant(OffsetVariant::PlusHalf).unwrap();
    assert!(plus_half.offset.clamped);
    assert_eq!(plus_half.offset.value, run.offset_ceiling);
}

#[test]
fn missing_path_table_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_calibration(&config(&dir.path().join("nope.csv"), 0.02)).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
