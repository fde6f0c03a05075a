//! CSV exports of the sensitivity study.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::ErrorBucket;
use crate::error::AppError;
use crate::systematics::ComparisonRow;

/// Write the per-frequency variant comparison.
pub fn write_comparison_csv(path: &Path, rows: &[ComparisonRow]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create comparison CSV '{}': {e}", path.display())))?;

    writeln!(
        file,
        "channel,e_field_v_cm,freq_mhz,nominal_mw,half_mw,plus_half_mw,half_frac_dev,plus_half_frac_dev,half_diff_mw,plus_half_diff_mw"
    )
    .map_err(|e| AppError::input(format!("Failed to write comparison CSV header: {e}")))?;

    for r in rows {
        writeln!(
            file,
            "{},{},{:.3},{:.6},{},{},{},{},{},{}",
            r.channel,
            r.e_field,
            r.freq_mhz,
            r.nominal_mw,
            opt(r.half_mw),
            opt(r.plus_half_mw),
            opt(r.half_frac_dev),
            opt(r.plus_half_frac_dev),
            opt(r.half_diff_mw),
            opt(r.plus_half_diff_mw),
        )
        .map_err(|e| AppError::input(format!("Failed to write comparison CSV row: {e}")))?;
    }

    Ok(())
}

/// Write the aggregated RF power calibration error for the half and 1.5x offsets.
///
/// Rows are keyed by E²; a bucket present for only one offset leaves the other's cells empty.
pub fn write_error_csv(path: &Path, half: &[ErrorBucket], plus_half: &[ErrorBucket]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create error CSV '{}': {e}", path.display())))?;

    writeln!(
        file,
        "Proportional To RF Power [V^2/cm^2],Mean Fractional Error [%],Fractional Error STDOM [%],n,\
         Plus-Half Mean Fractional Error [%],Plus-Half Fractional Error STDOM [%],Plus-Half n"
    )
    .map_err(|e| AppError::input(format!("Failed to write error CSV header: {e}")))?;

    for (key, h, p) in join_buckets(half, plus_half) {
        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            key,
            opt(h.map(|b| b.mean_fractional_error_pct)),
            opt(h.and_then(|b| b.fractional_error_stdom_pct)),
            h.map(|b| b.n.to_string()).unwrap_or_default(),
            opt(p.map(|b| b.mean_fractional_error_pct)),
            opt(p.and_then(|b| b.fractional_error_stdom_pct)),
            p.map(|b| b.n.to_string()).unwrap_or_default(),
        )
        .map_err(|e| AppError::input(format!("Failed to write error CSV row: {e}")))?;
    }

    Ok(())
}

type JoinedBucket<'a> = (f64, Option<&'a ErrorBucket>, Option<&'a ErrorBucket>);

/// Merge two E²-ascending bucket lists on their key.
fn join_buckets<'a>(left: &'a [ErrorBucket], right: &'a [ErrorBucket]) -> Vec<JoinedBucket<'a>> {
    let mut out = Vec::with_capacity(left.len().max(right.len()));
    let (mut i, mut j) = (0, 0);
    while i < left.len() || j < right.len() {
        match (left.get(i), right.get(j)) {
            (Some(l), Some(r)) if (l.power_proportional - r.power_proportional).abs() <= KEY_TOL => {
                out.push((l.power_proportional, Some(l), Some(r)));
                i += 1;
                j += 1;
            }
            (Some(l), Some(r)) if l.power_proportional < r.power_proportional => {
                out.push((l.power_proportional, Some(l), None));
                i += 1;
            }
            (_, Some(r)) => {
                out.push((r.power_proportional, None, Some(r)));
                j += 1;
            }
            (Some(l), None) => {
                out.push((l.power_proportional, Some(l), None));
                i += 1;
            }
            (None, None) => break,
        }
    }
    out
}

const KEY_TOL: f64 = 1e-9;

fn opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.6}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn bucket(e2: f64, mean: f64, n: usize) -> ErrorBucket {
        ErrorBucket {
            power_proportional: e2,
            mean_fractional_error_pct: mean,
            fractional_error_stdom_pct: (n > 1).then_some(0.5),
            n,
        }
    }

    #[test]
    fn error_csv_carries_both_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.csv");
        let half = [bucket(25.0, 1.0, 2), bucket(64.0, 2.0, 1)];
        let plus_half = [bucket(25.0, -1.5, 2), bucket(100.0, -3.0, 2)];
        write_error_csv(&path, &half, &plus_half).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("Plus-Half Mean Fractional Error [%]"));
        assert_eq!(lines[1], "25,1.000000,0.500000,2,-1.500000,0.500000,2");
        assert_eq!(lines[2], "64,2.000000,,1,,,");
        assert_eq!(lines[3], "100,,,,-3.000000,0.500000,2");
    }
}
