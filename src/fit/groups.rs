//! Per quench-curve fitting across (channel, frequency) groups.
//!
//! Groups are independent, so they are fitted in parallel. Results keep the
//! input order, which keeps reports and persisted files deterministic.

use rayon::prelude::*;

use crate::domain::{GroupFit, GroupKey};
use crate::error::AppError;
use crate::fit::fitter::fit_polynomial;

/// Observations of one quench curve.
#[derive(Debug, Clone)]
pub struct GroupSeries {
    pub key: GroupKey,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

/// Fit every group; groups with fewer than two points are skipped.
pub fn fit_groups(series: &[GroupSeries], order: usize, boundary: Option<f64>) -> Result<Vec<GroupFit>, AppError> {
    let fits: Vec<Option<GroupFit>> = series
        .par_iter()
        .map(|s| {
            if s.xs.len() < 2 {
                tracing::warn!(
                    channel = %s.key.channel,
                    freq_mhz = s.key.freq_mhz(),
                    points = s.xs.len(),
                    "skipping quench curve with too few points"
                );
                return Ok(None);
            }
            let fit = fit_polynomial(&s.xs, &s.ys, order, boundary).map_err(|e| {
                AppError::new(
                    e.exit_code(),
                    format!("Channel {} at {:.3} MHz: {e}", s.key.channel, s.key.freq_mhz()),
                )
            })?;
            Ok(Some(GroupFit {
                channel: s.key.channel,
                freq_mhz: s.key.freq_mhz(),
                fit,
            }))
        })
        .collect::<Result<_, AppError>>()?;

    let fits: Vec<GroupFit> = fits.into_iter().flatten().collect();
    if fits.is_empty() {
        return Err(AppError::no_data("No quench curve could be fitted."));
    }
    Ok(fits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RfChannel;

    #[test]
    fn fits_keep_input_order_and_skip_short_groups() {
        let series = vec![
            GroupSeries {
                key: GroupKey::new(RfChannel::B, 910.0),
                xs: vec![1.0, 2.0, 3.0],
                ys: vec![2.0, 4.0, 6.0],
            },
            GroupSeries {
                key: GroupKey::new(RfChannel::A, 908.0),
                xs: vec![1.0],
                ys: vec![1.0],
            },
            GroupSeries {
                key: GroupKey::new(RfChannel::A, 912.0),
                xs: vec![1.0, 2.0, 3.0],
                ys: vec![3.0, 6.0, 9.0],
            },
        ];
        let fits = fit_groups(&series, 1, Some(0.0)).unwrap();
        assert_eq!(fits.len(), 2);
        assert_eq!(fits[0].channel, RfChannel::B);
        assert!((fits[1].fit.eval(2.0) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn all_short_groups_is_an_error() {
        let series = vec![GroupSeries {
            key: GroupKey::new(RfChannel::A, 908.0),
            xs: vec![1.0],
            ys: vec![1.0],
        }];
        assert_eq!(fit_groups(&series, 2, None).unwrap_err().exit_code(), 3);
    }
}
