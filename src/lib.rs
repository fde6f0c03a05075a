//! `wvg-calib` library crate.
//!
//! The binary (`wvg-calib`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the calibration can be driven from other tools (batch scripts, notebooks)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod calib;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod systematics;
