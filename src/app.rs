//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - runs the calibration pipeline
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;

use crate::cli::{Cli, Command, RunArgs, ShowArgs, SynthArgs};
use crate::data::{SynthConfig, write_synthetic_tree};
use crate::domain::{GroupFit, OffsetVariant, RunConfig, freq_key};
use crate::error::AppError;
use crate::io::{default_path_data, read_calibration_json, write_comparison_csv, write_error_csv};
use crate::systematics::rows_for;

pub mod pipeline;

/// Entry point for the `wvg-calib` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Show(args) => handle_show(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let run = pipeline::run_calibration(&config)?;

    println!("{}", crate::report::format_run_summary(&run));

    let nominal = &run.variant(OffsetVariant::Nominal)?.calibration;
    let plot_freq = config.plot_freq_mhz.or_else(|| {
        nominal
            .quench_fits()
            .iter()
            .find(|g| g.channel == config.plot_channel)
            .map(|g| g.freq_mhz)
    });

    if let Some(freq) = plot_freq {
        println!(
            "{}",
            crate::report::format_fit_details(nominal.field_fits(), nominal.quench_fits(), config.plot_channel, freq)
        );
    }
    println!(
        "{}",
        crate::report::format_calibration_table(nominal.calib_av(), config.plot_channel, config.plot_e_field)
    );

    let selected = rows_for(&run.comparison, config.plot_channel, config.plot_e_field);
    println!(
        "{}",
        crate::report::format_comparison(&selected, config.plot_channel, config.plot_e_field)
    );
    println!(
        "{}",
        crate::report::format_error_table(&run.av_calib_error, &run.plus_half_calib_error)
    );

    if config.plot {
        if let Some(freq) = plot_freq {
            let extracted: Vec<(f64, f64)> = nominal
                .extracted()
                .iter()
                .filter(|f| f.channel == config.plot_channel && freq_key(f.freq_mhz) == freq_key(freq))
                .map(|f| (f.detected_power_mw, f.e_field * f.e_field))
                .collect();
            let find = |fits: &[GroupFit]| {
                fits.iter()
                    .find(|g| g.channel == config.plot_channel && freq_key(g.freq_mhz) == freq_key(freq))
                    .cloned()
            };
            println!(
                "{}",
                crate::plot::quench_curve_plots(
                    &run.surv_frac_av,
                    &extracted,
                    find(nominal.quench_fits()).as_ref(),
                    find(nominal.field_fits()).as_ref(),
                    config.plot_channel,
                    freq,
                    config.plot_width,
                    config.plot_height,
                )
            );
        }
        println!(
            "{}",
            crate::plot::comparison_plot(
                &selected,
                config.plot_channel,
                config.plot_e_field,
                config.plot_width,
                config.plot_height
            )
        );
        println!(
            "{}",
            crate::plot::error_plot(
                &run.av_calib_error,
                &run.plus_half_calib_error,
                config.plot_width,
                config.plot_height
            )
        );
    }

    // Optional exports.
    if let Some(path) = &config.export_comparison {
        write_comparison_csv(path, &run.comparison)?;
        tracing::info!(file = %path.display(), rows = run.comparison.len(), "exported variant comparison");
    }
    if let Some(path) = &config.export_error {
        write_error_csv(path, &run.av_calib_error, &run.plus_half_calib_error)?;
        tracing::info!(file = %path.display(), buckets = run.av_calib_error.len(), "exported power error");
    }

    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let file = read_calibration_json(&args.calib)?;
    println!(
        "{}",
        crate::report::format_calibration_file(&file, args.channel, args.e_field)
    );
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let summary = write_synthetic_tree(&SynthConfig {
        out_dir: args.out,
        seed: args.seed,
        true_offset: args.offset,
        ratio_noise: args.noise,
        repeats: args.repeats,
    })?;
    println!("Wrote {} files.", summary.files.len());
    println!("Path table: {}", summary.path_data.display());
    println!("Data set  : {}", summary.dataset);
    println!("Run with  : wvg-calib run --config {}", summary.path_data.display());
    Ok(())
}

pub fn run_config_from_args(args: &RunArgs) -> RunConfig {
    RunConfig {
        path_data: args.config.clone().unwrap_or_else(default_path_data),
        datasets: args.datasets.clone(),
        recompute_averages: args.recompute,
        beam_speed_cm_per_ns: args.speed,
        scan_type: args.scan_type.clone(),
        nominal_offset: args.offset,
        date: args.date,
        waveguide_separation_cm: args.separation,
        accelerating_voltage_kv: args.voltage,
        freq_scan_range: args.freq_range,
        off_axis_distance_mm: args.off_axis,
        min_e_field: args.e_min,
        max_e_field: args.e_max,
        use_boundary_conditions: args.boundary_conditions,
        poly_fit_order: args.order,
        plot: !args.no_plot,
        plot_channel: args.channel,
        plot_freq_mhz: args.freq,
        plot_e_field: args.e_field,
        plot_width: args.width,
        plot_height: args.height,
        export_comparison: args.export_comparison.clone(),
        export_error: args.export_error.clone(),
    }
}
