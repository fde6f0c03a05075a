//! Simulated quench curves as a function of RF frequency and field.
//!
//! A power-scan simulation tabulates the surviving fraction for a grid of field
//! amplitudes at each simulated frequency. Only the segment from the lowest
//! field down to the first minimum (the π pulse) is usable for inverting a
//! measured fraction, since past it the curve turns back up and the inverse is
//! ambiguous.
//!
//! Between simulated frequencies the curves are interpolated linearly; the
//! invertible field range at a frequency is limited by both neighbours.

use std::collections::BTreeMap;

use crate::domain::{ScanRange, SimCurveSummary, SimPoint, freq_key};
use crate::error::AppError;
use crate::math::{bisect, interp_linear};

/// Relative step of the numeric derivative used for the field uncertainty.
const SLOPE_STEP: f64 = 1e-3;
const BISECT_TOL: f64 = 1e-10;

/// Monotonic segment of one simulated curve.
#[derive(Debug, Clone)]
pub struct SimCurve {
    pub freq_mhz: f64,
    e_field: Vec<f64>,
    surv_frac: Vec<f64>,
}

impl SimCurve {
    /// Build the segment from the points of one frequency (any order).
    pub fn from_points(freq_mhz: f64, points: &[SimPoint]) -> Option<Self> {
        let mut sorted: Vec<(f64, f64)> = points.iter().map(|p| (p.e_field, p.surv_frac)).collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        sorted.dedup_by(|a, b| a.0 == b.0);

        let mut end = 0;
        while end + 1 < sorted.len() && sorted[end + 1].1 <= sorted[end].1 {
            end += 1;
        }
        if end == 0 {
            return None;
        }
        let (e_field, surv_frac) = sorted[..=end].iter().copied().unzip();
        Some(Self {
            freq_mhz,
            e_field,
            surv_frac,
        })
    }

    /// Field of the first minimum.
    pub fn pi_pulse_e_field(&self) -> f64 {
        self.e_field.last().copied().unwrap_or(0.0)
    }

    pub fn min_e_field(&self) -> f64 {
        self.e_field.first().copied().unwrap_or(0.0)
    }

    pub fn min_surv_frac(&self) -> f64 {
        self.surv_frac.last().copied().unwrap_or(1.0)
    }

    pub fn len(&self) -> usize {
        self.e_field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.e_field.is_empty()
    }

    pub fn surv_frac_at(&self, e_field: f64) -> Option<f64> {
        interp_linear(&self.e_field, &self.surv_frac, e_field)
    }

    pub fn summary(&self) -> SimCurveSummary {
        SimCurveSummary {
            freq_mhz: self.freq_mhz,
            n_points: self.len(),
            pi_pulse_e_field: self.pi_pulse_e_field(),
            min_surv_frac: self.min_surv_frac(),
        }
    }
}

/// Monotonic curves of one simulation, sorted by frequency.
#[derive(Debug, Clone)]
pub struct SimCurveSet {
    curves: Vec<SimCurve>,
}

impl SimCurveSet {
    /// Keep the frequencies inside `range` and cut every curve at its π pulse.
    pub fn analyze(points: &[SimPoint], range: &ScanRange) -> Result<Self, AppError> {
        let mut by_freq: BTreeMap<i64, Vec<SimPoint>> = BTreeMap::new();
        for p in points.iter().filter(|p| range.contains(p.freq_mhz)) {
            by_freq.entry(freq_key(p.freq_mhz)).or_default().push(*p);
        }

        let mut curves = Vec::with_capacity(by_freq.len());
        for (khz, pts) in &by_freq {
            let freq_mhz = *khz as f64 / 1e3;
            match SimCurve::from_points(freq_mhz, pts) {
                Some(curve) => curves.push(curve),
                None => tracing::warn!(freq_mhz, points = pts.len(), "simulated curve has no decreasing segment"),
            }
        }
        if curves.is_empty() {
            return Err(AppError::no_data(format!(
                "No usable simulated quench curves in the {range} MHz range."
            )));
        }
        tracing::debug!(curves = curves.len(), "analyzed simulated quench curves");
        Ok(Self { curves })
    }

    pub fn curves(&self) -> &[SimCurve] {
        &self.curves
    }

    pub fn summaries(&self) -> Vec<SimCurveSummary> {
        self.curves.iter().map(SimCurve::summary).collect()
    }

    /// Neighbouring curves and the weight of the upper one.
    ///
    /// Frequencies outside the simulated range use the nearest curve.
    fn bracket(&self, freq_mhz: f64) -> (&SimCurve, &SimCurve, f64) {
        let i = self.curves.partition_point(|c| c.freq_mhz < freq_mhz);
        if i == 0 {
            let c = &self.curves[0];
            return (c, c, 0.0);
        }
        if i == self.curves.len() {
            let c = &self.curves[i - 1];
            return (c, c, 0.0);
        }
        let (lo, hi) = (&self.curves[i - 1], &self.curves[i]);
        let w = (freq_mhz - lo.freq_mhz) / (hi.freq_mhz - lo.freq_mhz);
        (lo, hi, w)
    }

    /// Field range over which `surv_frac` is defined at this frequency.
    pub fn field_range(&self, freq_mhz: f64) -> (f64, f64) {
        let (lo, hi, _) = self.bracket(freq_mhz);
        (
            lo.min_e_field().max(hi.min_e_field()),
            lo.pi_pulse_e_field().min(hi.pi_pulse_e_field()),
        )
    }

    /// Simulated surviving fraction at a frequency and field amplitude.
    pub fn surv_frac(&self, freq_mhz: f64, e_field: f64) -> Option<f64> {
        let (lo, hi, w) = self.bracket(freq_mhz);
        let s_lo = lo.surv_frac_at(e_field)?;
        let s_hi = hi.surv_frac_at(e_field)?;
        Some((1.0 - w) * s_lo + w * s_hi)
    }

    /// Field amplitude giving the surviving fraction `surv_frac`, if invertible.
    pub fn field_for_surv_frac(&self, freq_mhz: f64, surv_frac: f64) -> Option<f64> {
        let (e_lo, e_hi) = self.field_range(freq_mhz);
        if !(surv_frac.is_finite() && e_hi > e_lo) {
            return None;
        }
        bisect(
            |e| self.surv_frac(freq_mhz, e).map_or(f64::NAN, |s| s - surv_frac),
            e_lo,
            e_hi,
            BISECT_TOL,
        )
    }

    /// `ds/dE` at a frequency and field, by central difference inside the field range.
    pub fn slope(&self, freq_mhz: f64, e_field: f64) -> Option<f64> {
        let (e_lo, e_hi) = self.field_range(freq_mhz);
        let h = SLOPE_STEP * (e_hi - e_lo);
        if h <= 0.0 {
            return None;
        }
        let a = (e_field - h).max(e_lo);
        let b = (e_field + h).min(e_hi);
        if b <= a {
            return None;
        }
        let ds = self.surv_frac(freq_mhz, b)? - self.surv_frac(freq_mhz, a)?;
        Some(ds / (b - a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rabi-like curve with its first minimum at `e_pi`.
    fn model(e: f64, e_pi: f64) -> f64 {
        let x = std::f64::consts::FRAC_PI_2 * e / e_pi;
        1.0 - 0.9 * x.sin().powi(2)
    }

    fn points(freq_mhz: f64, e_pi: f64) -> Vec<SimPoint> {
        (0..=100)
            .map(|i| {
                let e = i as f64 * 0.5;
                SimPoint {
                    off_axis_mm: 1.8,
                    freq_mhz,
                    e_field: e,
                    surv_frac: model(e, e_pi),
                }
            })
            .collect()
    }

    fn range() -> ScanRange {
        "894-926".parse().unwrap()
    }

    #[test]
    fn curve_is_cut_at_first_minimum() {
        let curve = SimCurve::from_points(910.0, &points(910.0, 30.0)).unwrap();
        assert_eq!(curve.pi_pulse_e_field(), 30.0);
        assert!((curve.min_surv_frac() - 0.1).abs() < 1e-12);
        assert_eq!(curve.len(), 61);
    }

    #[test]
    fn rising_curve_is_rejected() {
        let pts: Vec<SimPoint> = (0..5)
            .map(|i| SimPoint {
                off_axis_mm: 0.0,
                freq_mhz: 910.0,
                e_field: i as f64,
                surv_frac: 0.5 + 0.1 * i as f64,
            })
            .collect();
        assert!(SimCurve::from_points(910.0, &pts).is_none());
    }

    #[test]
    fn frequencies_outside_range_are_dropped() {
        let mut pts = points(910.0, 30.0);
        pts.extend(points(950.0, 30.0));
        let set = SimCurveSet::analyze(&pts, &range()).unwrap();
        assert_eq!(set.curves().len(), 1);
        assert!(SimCurveSet::analyze(&points(950.0, 30.0), &range()).is_err());
    }

    #[test]
    fn interpolates_between_frequencies() {
        let mut pts = points(908.0, 30.0);
        pts.extend(points(912.0, 34.0));
        let set = SimCurveSet::analyze(&pts, &range()).unwrap();

        let s = set.surv_frac(910.0, 10.0).unwrap();
        let expected = 0.5 * model(10.0, 30.0) + 0.5 * model(10.0, 34.0);
        assert!((s - expected).abs() < 1e-12);
        assert_eq!(set.field_range(910.0), (0.0, 30.0));
        assert!(set.surv_frac(910.0, 31.0).is_none());
    }

    #[test]
    fn inversion_recovers_field() {
        let set = SimCurveSet::analyze(&points(910.0, 30.0), &range()).unwrap();
        for &e in &[2.0, 8.25, 17.0, 29.0] {
            let s = set.surv_frac(910.0, e).unwrap();
            let back = set.field_for_surv_frac(910.0, s).unwrap();
            assert!((back - e).abs() < 1e-6, "{e} -> {back}");
        }
        // Below the π-pulse minimum or above the unquenched fraction.
        assert!(set.field_for_surv_frac(910.0, 0.05).is_none());
        assert!(set.field_for_surv_frac(910.0, 1.05).is_none());
    }

    #[test]
    fn slope_is_negative_on_the_segment() {
        let set = SimCurveSet::analyze(&points(910.0, 30.0), &range()).unwrap();
        let slope = set.slope(910.0, 15.0).unwrap();
        assert!(slope < 0.0);
    }
}
