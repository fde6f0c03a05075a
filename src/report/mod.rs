//! Formatted terminal output.
//!
//! Formatting lives in one place so the calibration code stays free of
//! presentation concerns.

pub mod format;

pub use format::*;
