//! Reporting: parameter tables, fit summaries and correlation matrices.

pub mod format;

pub use format::{fmt_sig, format_correlation, format_fit_summary, format_parameters};
