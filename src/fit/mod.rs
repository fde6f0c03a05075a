//! Quench-curve fitting.
//!
//! Responsibilities:
//!
//! - fit one curve with a (possibly origin-pinned) polynomial
//! - fit every (channel, frequency) curve of a data set (parallel)
//! - invert fits to find the power giving a target value

pub mod fitter;
pub mod groups;

pub use fitter::*;
pub use groups::*;
