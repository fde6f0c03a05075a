//! Field amplitudes from measured survival fractions.

use rayon::prelude::*;

use crate::calib::offset::correct_surv_frac;
use crate::calib::sim_curves::SimCurveSet;
use crate::domain::{ExtractedField, SurvFracRecord};

/// Result of inverting all measured points.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub fields: Vec<ExtractedField>,
    /// Points whose corrected fraction lies outside the invertible range.
    pub skipped: usize,
}

/// Offset-correct each averaged record and invert it through the simulation.
///
/// `σ_E = σ_s / |ds/dE|` with `σ_s = σ_ratio / (1 - offset)`.
pub fn extract_e_fields(records: &[SurvFracRecord], curves: &SimCurveSet, offset: f64) -> Extraction {
    let inverted: Vec<Option<ExtractedField>> = records
        .par_iter()
        .map(|r| {
            let surv_frac = correct_surv_frac(r.dc_ratio, offset);
            let e_field = curves.field_for_surv_frac(r.freq_mhz, surv_frac)?;
            let surv_frac_sigma = r.dc_ratio_stdom / (1.0 - offset);
            let e_field_sigma = curves
                .slope(r.freq_mhz, e_field)
                .filter(|slope| *slope != 0.0)
                .map(|slope| surv_frac_sigma / slope.abs());
            Some(ExtractedField {
                channel: r.channel,
                freq_mhz: r.freq_mhz,
                power_setting: r.power_setting,
                detected_power_mw: r.detected_power_mw,
                dc_ratio: r.dc_ratio,
                surv_frac,
                e_field,
                e_field_sigma,
            })
        })
        .collect();

    let skipped = inverted.iter().filter(|f| f.is_none()).count();
    if skipped > 0 {
        tracing::debug!(skipped, offset, "points outside the invertible simulation range");
    }
    Extraction {
        fields: inverted.into_iter().flatten().collect(),
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::offset::expected_ratio;
    use crate::domain::{RfChannel, ScanRange, SimPoint};

    fn curves() -> SimCurveSet {
        let points: Vec<SimPoint> = (0..=80)
            .map(|i| {
                let e = i as f64 * 0.5;
                SimPoint {
                    off_axis_mm: 1.8,
                    freq_mhz: 910.0,
                    e_field: e,
                    surv_frac: 1.0 - 0.9 * (std::f64::consts::FRAC_PI_2 * e / 30.0).sin().powi(2),
                }
            })
            .collect();
        let range: ScanRange = "900-920".parse().unwrap();
        SimCurveSet::analyze(&points, &range).unwrap()
    }

    fn record(ratio: f64) -> SurvFracRecord {
        SurvFracRecord {
            dataset: "ds".to_string(),
            channel: RfChannel::B,
            freq_mhz: 910.0,
            power_setting: 0.3,
            detected_power_mw: 2.5,
            detected_power_stdom_mw: 0.01,
            dc_ratio: ratio,
            dc_ratio_stdom: 0.002,
            n_repeats: 3,
        }
    }

    #[test]
    fn inverts_offset_corrected_fraction() {
        let curves = curves();
        let offset = 0.02;
        let s = curves.surv_frac(910.0, 12.0).unwrap();
        let out = extract_e_fields(&[record(expected_ratio(s, offset))], &curves, offset);

        assert_eq!(out.skipped, 0);
        let f = &out.fields[0];
        assert!((f.e_field - 12.0).abs() < 1e-6);
        assert!((f.surv_frac - s).abs() < 1e-12);
        let sigma = f.e_field_sigma.unwrap();
        assert!(sigma > 0.0 && sigma.is_finite());
    }

    #[test]
    fn out_of_range_points_are_skipped() {
        let curves = curves();
        // Below the π-pulse minimum once corrected, and above one.
        let out = extract_e_fields(&[record(0.05), record(1.1), record(0.6)], &curves, 0.02);
        assert_eq!(out.skipped, 2);
        assert_eq!(out.fields.len(), 1);
    }
}
