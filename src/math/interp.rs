//! Piecewise linear interpolation over sorted abscissae.

/// Interpolate `ys` at `x`; `xs` must be strictly increasing.
///
/// Returns `None` outside `[xs[0], xs[last]]`.
pub fn interp_linear(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    if xs.is_empty() || xs.len() != ys.len() || !x.is_finite() {
        return None;
    }
    let last = xs.len() - 1;
    if x < xs[0] || x > xs[last] {
        return None;
    }
    if xs.len() == 1 {
        return Some(ys[0]);
    }

    // First index with xs[i] >= x.
    let i = xs.partition_point(|&v| v < x).clamp(1, last);
    let (x0, x1) = (xs[i - 1], xs[i]);
    let (y0, y1) = (ys[i - 1], ys[i]);
    let u = (x - x0) / (x1 - x0);
    Some(y0 + u * (y1 - y0))
}

/// Like [`interp_linear`] but holds the end values outside the range.
pub fn interp_linear_clamped(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    let (first, last) = (*xs.first()?, *xs.last()?);
    interp_linear(xs, ys, x.clamp(first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_between_knots() {
        let xs = [0.0, 1.0, 3.0];
        let ys = [0.0, 10.0, 30.0];
        assert_eq!(interp_linear(&xs, &ys, 0.5), Some(5.0));
        assert_eq!(interp_linear(&xs, &ys, 2.0), Some(20.0));
        assert_eq!(interp_linear(&xs, &ys, 3.0), Some(30.0));
        assert_eq!(interp_linear(&xs, &ys, 3.5), None);
    }

    #[test]
    fn clamped_variant_holds_ends() {
        let xs = [1.0, 2.0];
        let ys = [5.0, 7.0];
        assert_eq!(interp_linear_clamped(&xs, &ys, -3.0), Some(5.0));
        assert_eq!(interp_linear_clamped(&xs, &ys, 9.0), Some(7.0));
    }
}
