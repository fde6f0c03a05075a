//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - measurement and simulation records (`SurvFracRecord`, `SimPoint`)
//! - calibration settings (`CalibParams`, `OffsetVariant`)
//! - calibration outputs (`CalibAverage`, `ErrorBucket`, `CalibrationFile`)

pub mod types;

pub use types::*;
