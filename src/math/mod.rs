//! Mathematical utilities: least squares, statistics, root finding, interpolation.

pub mod interp;
pub mod ols;
pub mod roots;
pub mod stats;

pub use interp::*;
pub use ols::*;
pub use roots::*;
pub use stats::*;
