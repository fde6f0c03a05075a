//! Scalar root finding on a bounded interval.
//!
//! Calibration inverts fitted curves (power -> E², power -> ratio) and
//! simulated quench curves (field -> surviving fraction). Each is continuous on
//! the interval of interest, so we scan for the first sign change and refine it
//! by bisection.

const BISECT_ITERS: usize = 200;

/// Bisection on `[lo, hi]`, which must bracket a root of `f`.
pub fn bisect<F>(f: F, mut lo: f64, mut hi: f64, tol: f64) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if !(f_lo.is_finite() && f_hi.is_finite()) {
        return None;
    }
    if f_lo == 0.0 {
        return Some(lo);
    }
    if f_hi == 0.0 {
        return Some(hi);
    }
    if f_lo.signum() == f_hi.signum() {
        return None;
    }

    for _ in 0..BISECT_ITERS {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if !f_mid.is_finite() {
            return None;
        }
        if f_mid == 0.0 || (hi - lo) < tol {
            return Some(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

/// Smallest root of `f` on `[lo, hi]`, found by scanning `steps` sub-intervals.
pub fn first_root_in_range<F>(f: F, lo: f64, hi: f64, steps: usize) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    if !(lo.is_finite() && hi.is_finite() && hi > lo) {
        return None;
    }
    let steps = steps.max(1);
    let width = (hi - lo) / steps as f64;
    let tol = (hi - lo) * 1e-12;

    let mut a = lo;
    for i in 1..=steps {
        let b = if i == steps { hi } else { lo + width * i as f64 };
        let (fa, fb) = (f(a), f(b));
        if fa.is_finite() && fb.is_finite() && (fa == 0.0 || fa.signum() != fb.signum()) {
            return bisect(&f, a, b, tol);
        }
        a = b;
    }
    None
}
