//! Terminal tables for calibration runs and saved calibration files.

use crate::app::pipeline::RunOutput;
use crate::domain::{
    CalibAverage, CalibrationFile, ErrorBucket, GroupFit, OffsetVariant, RfChannel, field_key, freq_key,
};
use crate::systematics::ComparisonRow;

/// Data sets, simulation and per-variant diagnostics.
pub fn format_run_summary(run: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str("=== wvg-calib - Waveguide RF Power Calibration ===\n");
    for ds in &run.data_sets {
        out.push_str(&format!("Data set: {}\n", ds.id.name));
        out.push_str(&format!(
            "  acquired {} | {} averaged points{}\n",
            ds.id.acquired,
            ds.surv_frac_av.len(),
            if ds.loaded_from_cache {
                " (cached)".to_string()
            } else {
                format!(" from {} rows, {} skipped", ds.rows_read, ds.row_errors.len())
            }
        ));
        if let Some(dc) = ds.beam_dc_summary() {
            out.push_str(&format!(
                "  beam DC (RF off): n={} mean={:.5} V | scatter={:.3e} V vs mean STDOM={:.3e} V\n",
                dc.n, dc.mean_dc_v, dc.dc_std_v, dc.mean_stdom_v
            ));
        }
    }
    out.push_str(&format!(
        "Simulation: {} ({}, {} cm/ns) | off-axis distances [mm]: {}\n",
        run.simulation.key,
        run.simulation.scan_type,
        run.simulation.speed_cm_per_ns,
        fmt_vec(&run.off_axis_distances, 2)
    ));
    out.push_str(&format!(
        "Max fractional DC offset (min DC On/Off ratio): {:.5}\n",
        run.offset_ceiling
    ));

    out.push('\n');
    out.push_str(
        format!(
            "{:<10} {:>10} {:>10} {:>8} {:>10} {:>8} {:>6} {:>8}  {}\n",
            "variant", "requested", "offset", "clamped", "extracted", "skipped", "fits", "points", "file"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<10} {:-<10} {:-<10} {:-<8} {:-<10} {:-<8} {:-<6} {:-<8}  {:-<4}\n",
            "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');
    for (variant, v) in &run.variants {
        let c = &v.calibration;
        out.push_str(&format!(
            "{:<10} {:>10.5} {:>10.5} {:>8} {:>10} {:>8} {:>6} {:>8}  {}\n",
            variant.label(),
            v.offset.requested,
            v.offset.value,
            if v.offset.clamped { "yes" } else { "no" },
            c.extracted().len(),
            c.n_extraction_skipped(),
            c.field_fits().len() + c.quench_fits().len(),
            c.calib_av().len(),
            v.saved_to.display()
        ));
    }

    out
}

/// Field and quench fits of one (channel, frequency) curve.
pub fn format_fit_details(field_fits: &[GroupFit], quench_fits: &[GroupFit], channel: RfChannel, freq_mhz: f64) -> String {
    let mut out = String::new();
    out.push_str(&format!("Fits for channel {channel} at {freq_mhz:.3} MHz:\n"));
    for (label, fits) in [("E² vs P", field_fits), ("ratio vs P", quench_fits)] {
        match find_fit(fits, channel, freq_mhz) {
            Some(g) => {
                let f = &g.fit;
                out.push_str(&format!(
                    "  {label:<11} order={} pinned={} n={} RMSE={:.4e} P=[{:.4}, {:.4}] mW\n",
                    f.basis.order,
                    if f.basis.intercept { "no".to_string() } else { format!("{}", f.offset) },
                    f.quality.n,
                    f.quality.rmse,
                    f.x_min,
                    f.x_max
                ));
                out.push_str(&format!("  {:<11} coeffs (x/{:.4}): {}\n", "", f.x_scale, fmt_vec(&f.coeffs, 6)));
            }
            None => out.push_str(&format!("  {label:<11} (no fit)\n")),
        }
    }
    out
}

/// Method-averaged detected power for one (channel, field), by frequency.
pub fn format_calibration_table(calib_av: &[CalibAverage], channel: RfChannel, e_field: f64) -> String {
    let mut rows: Vec<&CalibAverage> = calib_av
        .iter()
        .filter(|a| a.channel == channel && field_key(a.e_field) == field_key(e_field))
        .collect();
    rows.sort_by(|a, b| a.freq_mhz.total_cmp(&b.freq_mhz));

    let mut out = String::new();
    out.push_str(&format!("Detected power for {e_field} V/cm, channel {channel}:\n"));
    out.push_str(format!("{:>12} {:>12} {:>12} {:>3}\n", "freq [MHz]", "P [mW]", "SEM [mW]", "n").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<12} {:-<12} {:-<3}\n", "", "", "", "").trim_end());
    out.push('\n');
    for a in rows {
        out.push_str(&format!(
            "{:>12.3} {:>12.6} {:>12} {:>3}\n",
            a.freq_mhz,
            a.mean_mw,
            fmt_opt(a.stdom_mw, 6),
            a.n
        ));
    }
    out
}

/// Variant comparison rows of one (channel, field).
pub fn format_comparison(rows: &[&ComparisonRow], channel: RfChannel, e_field: f64) -> String {
    let mut out = String::new();
    out.push_str(&format!("Offset sensitivity at {e_field} V/cm, channel {channel}:\n"));
    out.push_str(
        format!(
            "{:>12} {:>12} {:>12} {:>12} {:>10} {:>10}\n",
            "freq [MHz]", "nominal", "half", "plus_half", "half %", "plus %"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<12} {:-<12} {:-<12} {:-<10} {:-<10}\n", "", "", "", "", "", "").trim_end());
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{:>12.3} {:>12.6} {:>12} {:>12} {:>10} {:>10}\n",
            r.freq_mhz,
            r.nominal_mw,
            fmt_opt(r.half_mw, 6),
            fmt_opt(r.plus_half_mw, 6),
            fmt_opt(r.half_frac_dev.map(|v| v * 100.0), 3),
            fmt_opt(r.plus_half_frac_dev.map(|v| v * 100.0), 3),
        ));
    }
    out
}

/// Aggregated fractional power error by E², half and 1.5× offsets side by side.
pub fn format_error_table(half: &[ErrorBucket], plus_half: &[ErrorBucket]) -> String {
    let mut out = String::new();
    out.push_str("Fractional RF power error from the DC offset (pooled over channels and frequencies):\n");
    out.push_str(
        format!(
            "{:>10} {:>8} {:>10} {:>10} {:>4} {:>10} {:>10} {:>4}\n",
            "E² [V²/cm²]", "E [V/cm]", "half %", "SEM %", "n", "plus %", "SEM %", "n"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<10} {:-<8} {:-<10} {:-<10} {:-<4} {:-<10} {:-<10} {:-<4}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');
    for b in half {
        let p = plus_half
            .iter()
            .find(|p| field_key(p.power_proportional) == field_key(b.power_proportional));
        out.push_str(
            format!(
                "{:>10.1} {:>8.2} {:>10.4} {:>10} {:>4} {:>10} {:>10} {:>4}\n",
                b.power_proportional,
                b.power_proportional.sqrt(),
                b.mean_fractional_error_pct,
                fmt_opt(b.fractional_error_stdom_pct, 4),
                b.n,
                fmt_opt(p.map(|p| p.mean_fractional_error_pct), 4),
                fmt_opt(p.and_then(|p| p.fractional_error_stdom_pct), 4),
                p.map(|p| p.n.to_string()).unwrap_or_default(),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out.push_str("The half-offset deviation is the recorded error; the 1.5x column is not assumed symmetric.\n");
    out
}

/// Summary of a saved calibration file.
pub fn format_calibration_file(file: &CalibrationFile, channel: RfChannel, e_field: f64) -> String {
    let p = &file.params;
    let mut out = String::new();
    out.push_str(&format!("=== {} calibration ({}) ===\n", file.variant.label(), file.tool));
    out.push_str(&format!("Created: {}\n", file.created));
    out.push_str(&format!("Data sets: {}\n", file.datasets.join("; ")));
    out.push_str(&format!("Simulation: {}\n", file.simulation_key));
    out.push_str(&format!(
        "Date {} | separation {} cm | {} kV | {} MHz | off-axis {} mm\n",
        p.date, p.waveguide_separation_cm, p.accelerating_voltage_kv, p.freq_scan_range, p.off_axis_distance_mm
    ));
    out.push_str(&format!(
        "Offset {:.5} (ceiling {:.5}{}) | E [{}, {}] V/cm | order {} | boundary conditions: {}\n",
        p.fract_dc_offset,
        file.offset_ceiling,
        if file.offset_clamped { ", clamped" } else { "" },
        p.min_e_field,
        p.max_e_field,
        p.poly_fit_order,
        p.use_boundary_conditions
    ));
    out.push_str(&format!(
        "Extracted fields: {} ({} skipped) | fits: {} field, {} quench | calibration points: {}\n\n",
        file.extracted.len(),
        file.n_extraction_skipped,
        file.field_fits.len(),
        file.quench_fits.len(),
        file.calib_av.len()
    ));
    out.push_str(&format_calibration_table(&file.calib_av, channel, e_field));
    if let Some(err) = &file.av_rf_power_calib_error {
        out.push('\n');
        out.push_str(&format_error_table(err, &[]));
    } else if file.variant == OffsetVariant::Nominal {
        out.push_str("\n(no aggregated power error attached)\n");
    }
    out
}

fn find_fit(fits: &[GroupFit], channel: RfChannel, freq_mhz: f64) -> Option<&GroupFit> {
    fits.iter()
        .find(|g| g.channel == channel && freq_key(g.freq_mhz) == freq_key(freq_mhz))
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|x| format!("{x:.decimals$}")).unwrap_or_default()
}

fn fmt_vec(v: &[f64], decimals: usize) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.decimals$}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(e: f64, mean: f64, sem: Option<f64>) -> ErrorBucket {
        ErrorBucket {
            power_proportional: e * e,
            mean_fractional_error_pct: mean,
            fractional_error_stdom_pct: sem,
            n: 6,
        }
    }

    #[test]
    fn error_table_lists_buckets_with_plus_half_column() {
        let half = [bucket(5.0, 1.25, Some(0.1)), bucket(6.0, 1.5, None)];
        let plus = [bucket(5.0, -1.2, Some(0.2))];
        let table = format_error_table(&half, &plus);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[3].contains("25.0"));
        assert!(lines[3].contains("1.2500"));
        assert!(lines[3].contains("-1.2000"));
        assert!(lines[4].contains("36.0"));
        assert!(!lines[4].contains('-'));
    }

    #[test]
    fn calibration_table_filters_and_sorts() {
        let av = |channel, e_field, freq_mhz| CalibAverage {
            channel,
            e_field,
            freq_mhz,
            mean_mw: 1.0,
            stdom_mw: None,
            n: 1,
        };
        let table = format_calibration_table(
            &[
                av(RfChannel::A, 5.0, 912.0),
                av(RfChannel::B, 5.0, 910.0),
                av(RfChannel::A, 5.0, 908.0),
                av(RfChannel::A, 6.0, 910.0),
            ],
            RfChannel::A,
            5.0,
        );
        let rows: Vec<&str> = table.lines().skip(3).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].trim_start().starts_with("908.000"));
        assert!(rows[1].trim_start().starts_with("912.000"));
    }
}
