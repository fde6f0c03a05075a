//! Detected RF power for requested field amplitudes.
//!
//! Two independent estimates per (channel, frequency, field):
//!
//! - field fit: solve `E²(P) = E²`
//! - quench fit: solve `ratio(P) = s_sim(f, E)·(1 - offset) + offset`
//!
//! Both are restricted to the measured power range of the curve, so
//! extrapolated powers never enter the calibration.

use std::collections::BTreeMap;

use crate::calib::offset::expected_ratio;
use crate::calib::sim_curves::SimCurveSet;
use crate::domain::{CalibAverage, CalibMethod, CalibPoint, GroupFit, RfChannel, field_key, freq_key};
use crate::math::{mean, stdom};

pub fn perform_power_calib(
    targets: &[f64],
    offset: f64,
    field_fits: &[GroupFit],
    quench_fits: &[GroupFit],
    curves: &SimCurveSet,
) -> Vec<CalibPoint> {
    let mut points = Vec::new();

    for g in field_fits {
        for &e in targets {
            if let Some(p) = g.fit.solve_for(e * e) {
                points.push(CalibPoint {
                    channel: g.channel,
                    e_field: e,
                    freq_mhz: g.freq_mhz,
                    method: CalibMethod::FieldFit,
                    detected_power_mw: p,
                });
            }
        }
    }

    for g in quench_fits {
        for &e in targets {
            let Some(s) = curves.surv_frac(g.freq_mhz, e) else {
                continue;
            };
            if let Some(p) = g.fit.solve_for(expected_ratio(s, offset)) {
                points.push(CalibPoint {
                    channel: g.channel,
                    e_field: e,
                    freq_mhz: g.freq_mhz,
                    method: CalibMethod::QuenchFit,
                    detected_power_mw: p,
                });
            }
        }
    }

    let requested = (field_fits.len() + quench_fits.len()) * targets.len();
    if points.len() < requested {
        tracing::debug!(
            requested,
            solved = points.len(),
            "some field amplitudes lie outside the measured power range"
        );
    }
    points
}

/// Average the method estimates per (channel, field, frequency).
///
/// Output is ordered by channel, field and frequency.
pub fn average_calib(points: &[CalibPoint]) -> Vec<CalibAverage> {
    let mut groups: BTreeMap<(RfChannel, i64, i64), (f64, f64, Vec<f64>)> = BTreeMap::new();
    for p in points {
        groups
            .entry((p.channel, field_key(p.e_field), freq_key(p.freq_mhz)))
            .or_insert_with(|| (p.e_field, p.freq_mhz, Vec::new()))
            .2
            .push(p.detected_power_mw);
    }

    groups
        .into_iter()
        .filter_map(|((channel, _, _), (e_field, freq_mhz, powers))| {
            Some(CalibAverage {
                channel,
                e_field,
                freq_mhz,
                mean_mw: mean(&powers)?,
                stdom_mw: stdom(&powers),
                n: powers.len(),
            })
        })
        .collect()
}
