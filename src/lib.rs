//! `minufit` library crate.
//!
//! Build probability density models over one observable, combine them into
//! extended mixtures, fit them to unbinned data and plot the result.
//!
//! The binary (`minufit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - models and fits are usable from other Rust code
//! - code stays easy to navigate as the project grows

pub mod app;
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
pub mod tui;
