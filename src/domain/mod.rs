//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - real variables and their tuple specifications (`RealVar`, `VarSpec`)
//! - ordered parameter sets (`ParamSet`)
//! - run configuration built from the CLI (`FitConfig`, `PlotConfig`)

pub mod config;
pub mod params;
pub mod var;

pub use config::*;
pub use params::ParamSet;
pub use var::{DEFAULT_VAR_NAME, RealVar, VarSpec, create_named_var, create_real_var};
