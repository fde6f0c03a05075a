//! Offset sensitivity study: variant comparison and error aggregation.

pub mod aggregate;
pub mod comparison;

pub use aggregate::*;
pub use comparison::*;
