//! Systematic power error from the offset variants.
//!
//! The fractional deviation `variant / nominal - 1` of every matching
//! (channel, field, frequency) point is pooled over channels and frequencies
//! per field amplitude. The mean and its standard error are expressed in
//! percent and keyed by E², which is proportional to RF power.

use std::collections::BTreeMap;

use crate::domain::{CalibAverage, ErrorBucket, field_key, freq_key};
use crate::math::{mean, stdom};
use crate::systematics::comparison::index;

/// `(E, variant / nominal - 1)` for every point present in both calibrations.
pub fn fractional_deviations(nominal: &[CalibAverage], variant: &[CalibAverage]) -> Vec<(f64, f64)> {
    let variant = index(variant);
    nominal
        .iter()
        .filter_map(|n| {
            let v = variant.get(&(n.channel, field_key(n.e_field), freq_key(n.freq_mhz)))?;
            let dev = v / n.mean_mw - 1.0;
            dev.is_finite().then_some((n.e_field, dev))
        })
        .collect()
}

/// Group deviations by field amplitude; buckets are ordered by E².
pub fn aggregate_fractional_errors(deviations: &[(f64, f64)]) -> Vec<ErrorBucket> {
    let mut groups: BTreeMap<i64, (f64, Vec<f64>)> = BTreeMap::new();
    for &(e_field, dev) in deviations {
        groups
            .entry(field_key(e_field))
            .or_insert_with(|| (e_field, Vec::new()))
            .1
            .push(dev);
    }

    groups
        .into_values()
        .filter_map(|(e_field, devs)| {
            Some(ErrorBucket {
                power_proportional: e_field * e_field,
                mean_fractional_error_pct: mean(&devs)? * 100.0,
                fractional_error_stdom_pct: stdom(&devs).map(|s| s * 100.0),
                n: devs.len(),
            })
        })
        .collect()
}

/// Aggregated fractional error of `variant` relative to `nominal`.
pub fn aggregate_calib_error(nominal: &[CalibAverage], variant: &[CalibAverage]) -> Vec<ErrorBucket> {
    aggregate_fractional_errors(&fractional_deviations(nominal, variant))
}
