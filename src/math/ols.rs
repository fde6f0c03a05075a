//! Least squares solver.
//!
//! Every fit in the calibration is a small linear regression
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! over a polynomial design matrix with at most a handful of columns and a few
//! dozen rows (one row per RF power setting of a quench curve).
//!
//! Implementation choices:
//! - SVD handles the tall design matrix directly.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Higher polynomial orders make the columns nearly collinear, so the solve
//!   retries with progressively looser singular value cut-offs.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
