//! Input/output helpers.
//!
//! - path table (`paths`)
//! - data set loading + averaging (`dataset`, `detector`)
//! - simulation catalog and files (`simulation`)
//! - calibration JSON read/write (`calib_file`)
//! - CSV exports (`export`)

pub mod calib_file;
pub mod dataset;
pub mod detector;
pub mod export;
pub mod paths;
pub mod simulation;
pub mod table;

pub use calib_file::*;
pub use dataset::*;
pub use export::*;
pub use paths::*;
pub use simulation::*;
