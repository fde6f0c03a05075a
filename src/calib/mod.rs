//! Waveguide power calibration.
//!
//! - `offset`: fractional DC offset ceiling and correction
//! - `sim_curves`: invertible segments of the simulated quench curves
//! - `extract`: measured fractions -> field amplitudes
//! - `power`: fits -> detected power per requested field
//! - `analysis`: the calibration object tying the steps together

pub mod analysis;
pub mod extract;
pub mod offset;
pub mod power;
pub mod sim_curves;

pub use analysis::*;
pub use offset::*;
pub use sim_curves::*;
