//! Side-by-side comparison of the offset variants.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{CalibAverage, RfChannel, field_key, freq_key};

/// Powers of one (channel, field, frequency) point under every variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub channel: RfChannel,
    pub e_field: f64,
    pub freq_mhz: f64,
    pub nominal_mw: f64,
    pub half_mw: Option<f64>,
    pub plus_half_mw: Option<f64>,
    /// `half / nominal - 1`.
    pub half_frac_dev: Option<f64>,
    pub plus_half_frac_dev: Option<f64>,
    /// `half - nominal` (mW).
    pub half_diff_mw: Option<f64>,
    pub plus_half_diff_mw: Option<f64>,
}

type PointKey = (RfChannel, i64, i64);

fn key(a: &CalibAverage) -> PointKey {
    (a.channel, field_key(a.e_field), freq_key(a.freq_mhz))
}

pub(crate) fn index(points: &[CalibAverage]) -> HashMap<PointKey, f64> {
    points.iter().map(|a| (key(a), a.mean_mw)).collect()
}

/// One row per nominal point, in the nominal order.
pub fn compare_calibrations(
    nominal: &[CalibAverage],
    half: &[CalibAverage],
    plus_half: &[CalibAverage],
) -> Vec<ComparisonRow> {
    let half = index(half);
    let plus_half = index(plus_half);

    nominal
        .iter()
        .map(|n| {
            let k = key(n);
            let h = half.get(&k).copied();
            let p = plus_half.get(&k).copied();
            ComparisonRow {
                channel: n.channel,
                e_field: n.e_field,
                freq_mhz: n.freq_mhz,
                nominal_mw: n.mean_mw,
                half_mw: h,
                plus_half_mw: p,
                half_frac_dev: h.and_then(|v| frac_dev(v, n.mean_mw)),
                plus_half_frac_dev: p.and_then(|v| frac_dev(v, n.mean_mw)),
                half_diff_mw: h.map(|v| v - n.mean_mw),
                plus_half_diff_mw: p.map(|v| v - n.mean_mw),
            }
        })
        .collect()
}

/// `value / nominal - 1`, absent when it is not finite (zero nominal power).
fn frac_dev(value: f64, nominal: f64) -> Option<f64> {
    Some(value / nominal - 1.0).filter(|d| d.is_finite())
}

/// Rows of one (channel, field) pair, ordered by frequency.
pub fn rows_for(rows: &[ComparisonRow], channel: RfChannel, e_field: f64) -> Vec<&ComparisonRow> {
    let mut out: Vec<&ComparisonRow> = rows
        .iter()
        .filter(|r| r.channel == channel && field_key(r.e_field) == field_key(e_field))
        .collect();
    out.sort_by(|a, b| a.freq_mhz.total_cmp(&b.freq_mhz));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn av(channel: RfChannel, e_field: f64, freq_mhz: f64, mean_mw: f64) -> CalibAverage {
        CalibAverage {
            channel,
            e_field,
            freq_mhz,
            mean_mw,
            stdom_mw: None,
            n: 2,
        }
    }

    #[test]
    fn computes_deviations_and_differences() {
        let nominal = [av(RfChannel::A, 8.0, 910.0, 2.0), av(RfChannel::A, 8.0, 908.0, 1.0)];
        let half = [av(RfChannel::A, 8.0, 910.0, 2.1)];
        let plus_half = [av(RfChannel::A, 8.0, 910.0, 1.8), av(RfChannel::A, 8.0, 908.0, 0.9)];

        let rows = compare_calibrations(&nominal, &half, &plus_half);
        assert_eq!(rows.len(), 2);

        let r = &rows[0];
        assert!((r.half_frac_dev.unwrap() - 0.05).abs() < 1e-12);
        assert!((r.plus_half_frac_dev.unwrap() + 0.1).abs() < 1e-12);
        assert!((r.half_diff_mw.unwrap() - 0.1).abs() < 1e-12);
        assert!((r.plus_half_diff_mw.unwrap() + 0.2).abs() < 1e-12);

        // Missing half point leaves empty cells.
        assert_eq!(rows[1].half_mw, None);
        assert_eq!(rows[1].half_frac_dev, None);
        assert!(rows[1].plus_half_mw.is_some());

        let selected = rows_for(&rows, RfChannel::A, 8.0);
        assert_eq!(selected[0].freq_mhz, 908.0);
        assert!(rows_for(&rows, RfChannel::B, 8.0).is_empty());
    }

    #[test]
    fn zero_nominal_power_leaves_deviation_empty() {
        let nominal = [av(RfChannel::B, 5.0, 910.0, 0.0)];
        let half = [av(RfChannel::B, 5.0, 910.0, 0.1)];
        let plus_half = [av(RfChannel::B, 5.0, 910.0, 0.0)];

        let rows = compare_calibrations(&nominal, &half, &plus_half);
        assert_eq!(rows[0].half_frac_dev, None);
        assert_eq!(rows[0].plus_half_frac_dev, None);
        assert_eq!(rows[0].half_mw, Some(0.1));
        assert!((rows[0].half_diff_mw.unwrap() - 0.1).abs() < 1e-12);
    }
}
