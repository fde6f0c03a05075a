//! Sample statistics used by averaging and error aggregation.

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased sample standard deviation (`ddof = 1`); `None` for fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() as f64 - 1.0)).sqrt())
}

/// Standard error of the mean: `std(ddof=1) / sqrt(n)`.
pub fn stdom(values: &[f64]) -> Option<f64> {
    sample_std(values).map(|s| s / (values.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdom_matches_hand_computation() {
        let v = [0.05, 0.10, 0.00];
        assert!((mean(&v).unwrap() - 0.05).abs() < 1e-15);
        // std(ddof=1) = 0.05
        assert!((sample_std(&v).unwrap() - 0.05).abs() < 1e-15);
        assert!((stdom(&v).unwrap() - 0.05 / 3f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(mean(&[]), None);
        assert_eq!(sample_std(&[1.0]), None);
        assert_eq!(stdom(&[1.0]), None);
    }
}
