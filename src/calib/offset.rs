//! Fractional DC offset handling.
//!
//! Part of the detector signal does not respond to the waveguide quenching. As
//! a fraction `o` of the RF-off signal, the measured DC On/Off ratio is
//!
//! ```text
//! ratio = s · (1 - o) + o
//! ```
//!
//! with `s` the true surviving fraction. An offset above the smallest measured
//! ratio would make some corrected fractions negative, so that ratio is the
//! ceiling for any offset applied to the data.

use serde::{Deserialize, Serialize};

use crate::domain::SurvFracRecord;
use crate::error::AppError;

/// Offset actually used for a calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetDecision {
    pub requested: f64,
    pub value: f64,
    pub clamped: bool,
}

/// Largest admissible fractional DC offset: the minimum measured DC On/Off ratio.
///
/// A non-positive minimum (noise around a π pulse) floors the ceiling at 0.
pub fn offset_ceiling(records: &[SurvFracRecord]) -> Result<f64, AppError> {
    let lowest = records
        .iter()
        .filter(|r| r.dc_ratio.is_finite())
        .min_by(|a, b| a.dc_ratio.total_cmp(&b.dc_ratio))
        .ok_or_else(|| AppError::no_data("No DC On/Off ratios to derive the offset ceiling from."))?;
    if lowest.dc_ratio > 0.0 {
        return Ok(lowest.dc_ratio);
    }
    tracing::warn!(
        dataset = %lowest.dataset,
        channel = ?lowest.channel,
        freq_mhz = lowest.freq_mhz,
        power_setting = lowest.power_setting,
        dc_ratio = lowest.dc_ratio,
        "non-positive DC On/Off ratio; fractional DC offset ceiling set to 0"
    );
    Ok(0.0)
}

/// Return `candidate` if it does not exceed `ceiling`, otherwise warn and return `ceiling`.
pub fn check_fract_offset(candidate: f64, ceiling: f64) -> OffsetDecision {
    if candidate > ceiling {
        tracing::warn!(
            requested = candidate,
            ceiling,
            "fractional offset is larger than the maximum allowed fractional DC offset; using the maximum allowed offset"
        );
        OffsetDecision {
            requested: candidate,
            value: ceiling,
            clamped: true,
        }
    } else {
        OffsetDecision {
            requested: candidate,
            value: candidate,
            clamped: false,
        }
    }
}

/// Surviving fraction from a DC On/Off ratio.
pub fn correct_surv_frac(ratio: f64, offset: f64) -> f64 {
    (ratio - offset) / (1.0 - offset)
}

/// DC On/Off ratio expected for a surviving fraction.
pub fn expected_ratio(surv_frac: f64, offset: f64) -> f64 {
    surv_frac * (1.0 - offset) + offset
}
