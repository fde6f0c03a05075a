//! Polynomial model evaluation.
//!
//! The fitter relies on two primitive operations:
//! - build a design row for a given abscissa (for least squares)
//! - predict `y(x)` given coefficients (for residuals, root finding and plots)
//!
//! Abscissae are scaled by the caller (`u = x / x_scale`) so the columns
//! `u, u², …` stay of order one.

use crate::domain::PolyBasis;

/// Fill a design row for the given basis.
///
/// The row includes the constant term first when `basis.intercept` is set.
///
/// # Panics
/// Panics if `out` does not have length `basis.len()`.
pub fn fill_design_row(basis: PolyBasis, u: f64, out: &mut [f64]) {
    let mut col = 0;
    if basis.intercept {
        out[col] = 1.0;
        col += 1;
    }
    let mut p = u;
    for _ in 0..basis.order {
        out[col] = p;
        col += 1;
        p *= u;
    }
}

/// Evaluate `offset + Σ coeffs · row(u)`.
pub fn predict(basis: PolyBasis, u: f64, coeffs: &[f64], offset: f64) -> f64 {
    let mut y = offset;
    let mut idx = 0;
    if basis.intercept {
        y += coeffs[0];
        idx = 1;
    }
    let mut p = u;
    for c in &coeffs[idx..] {
        y += c * p;
        p *= u;
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn design_row_with_and_without_intercept() {
        let mut row = [0.0; 3];
        fill_design_row(PolyBasis { order: 2, intercept: true }, 2.0, &mut row);
        assert_eq!(row, [1.0, 2.0, 4.0]);

        let mut row = [0.0; 2];
        fill_design_row(PolyBasis { order: 2, intercept: false }, 2.0, &mut row);
        assert_eq!(row, [2.0, 4.0]);
    }

    #[test]
    fn predict_matches_design_row() {
        let basis = PolyBasis { order: 3, intercept: true };
        let coeffs = [1.0, -2.0, 0.5, 0.25];
        let mut row = [0.0; 4];
        fill_design_row(basis, 1.5, &mut row);
        let dot: f64 = row.iter().zip(&coeffs).map(|(a, b)| a * b).sum();
        assert!((predict(basis, 1.5, &coeffs, 0.0) - dot).abs() < 1e-12);
        assert!((predict(PolyBasis { order: 1, intercept: false }, 2.0, &[3.0], 1.0) - 7.0).abs() < 1e-12);
    }
}
