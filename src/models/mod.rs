//! Polynomial model used for every quench-curve fit.
//!
//! Models are implemented as small, pure functions so that the fitting code can
//! stay generic.

pub mod poly;

pub use poly::*;
