//! Least squares polynomial fits of a single quench curve.
//!
//! Given:
//! - abscissae `x_i` (detected RF power)
//! - observations `y_i` (E² or DC On/Off ratio)
//! - a polynomial order and an optional fixed value at `x = 0`
//!
//! we solve for the polynomial coefficients and report the resulting SSE.
//!
//! A fixed value at the origin (`boundary`) removes the intercept column and
//! moves the known constant to the left-hand side. This keeps the constraint
//! exact without injecting synthetic observations.

use nalgebra::{DMatrix, DVector};

use crate::domain::{FitQuality, PolyBasis, PolyFit};
use crate::error::AppError;
use crate::math::{first_root_in_range, solve_least_squares};
use crate::models::{fill_design_row, predict};

/// Sub-intervals scanned when inverting a fit.
const ROOT_SCAN_STEPS: usize = 400;

/// Fit `y(x)` with a polynomial of (at most) `order`.
///
/// The order is reduced when there are too few points to determine it.
pub fn fit_polynomial(xs: &[f64], ys: &[f64], order: usize, boundary: Option<f64>) -> Result<PolyFit, AppError> {
    if xs.len() != ys.len() {
        return Err(AppError::compute("Fit inputs have mismatched lengths."));
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(AppError::compute("Fit inputs contain non-finite values."));
    }

    let n = xs.len();
    let intercept = boundary.is_none();
    let max_order = n.saturating_sub(usize::from(intercept));
    if max_order == 0 || order == 0 {
        return Err(AppError::no_data(format!(
            "Not enough points to fit a polynomial (n={n}, order={order})."
        )));
    }
    let basis = PolyBasis {
        order: order.min(max_order),
        intercept,
    };
    let offset = boundary.unwrap_or(0.0);

    let x_scale = xs.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let x_scale = if x_scale > 0.0 { x_scale } else { 1.0 };

    let p = basis.len();
    let mut x = DMatrix::<f64>::zeros(n, p);
    let mut y = DVector::<f64>::zeros(n);
    let mut row = vec![0.0; p];
    for i in 0..n {
        fill_design_row(basis, xs[i] / x_scale, &mut row);
        for (j, v) in row.iter().enumerate() {
            x[(i, j)] = *v;
        }
        y[i] = ys[i] - offset;
    }

    let beta = solve_least_squares(&x, &y)
        .ok_or_else(|| AppError::compute("Polynomial least squares solve failed (ill-conditioned)."))?;
    let coeffs: Vec<f64> = beta.iter().copied().collect();

    let sse: f64 = xs
        .iter()
        .zip(ys)
        .map(|(&xi, &yi)| {
            let r = yi - predict(basis, xi / x_scale, &coeffs, offset);
            r * r
        })
        .sum();
    if !sse.is_finite() {
        return Err(AppError::compute("Non-finite SSE in polynomial fit."));
    }

    let x_min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(PolyFit {
        basis,
        coeffs,
        offset,
        x_scale,
        x_min,
        x_max,
        quality: FitQuality {
            sse,
            rmse: (sse / n as f64).sqrt(),
            n,
        },
    })
}

impl PolyFit {
    /// Evaluate the fitted polynomial.
    pub fn eval(&self, x: f64) -> f64 {
        predict(self.basis, x / self.x_scale, &self.coeffs, self.offset)
    }

    /// Smallest `x` with `eval(x) == target` inside the fitted range.
    ///
    /// A fit pinned at the origin is also trusted between `0` and the first point.
    pub fn solve_for(&self, target: f64) -> Option<f64> {
        let lo = if self.basis.intercept { self.x_min } else { 0.0 };
        first_root_in_range(|x| self.eval(x) - target, lo, self.x_max, ROOT_SCAN_STEPS)
    }
}
