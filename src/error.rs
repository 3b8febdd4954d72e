//! Error types.
//!
//! The library reports failures through [`FitError`]. The binary wraps them
//! into [`AppError`], which carries the process exit code:
//!
//! - `2`: invalid input or configuration (model files, variable specs, CLI values)
//! - `3`: data problems (unreadable/empty data, no events in range)
//! - `4`: fit, render or internal failures

use std::path::PathBuf;

/// Library-level error.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("Invalid variable specification: {0}")]
    InvalidVarSpec(String),

    #[error("PDF with name {0} already exists")]
    DuplicatePdf(String),

    #[error("PDF '{0}' not found")]
    UnknownPdf(String),

    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid fit options: {0}")]
    InvalidOptions(String),

    #[error("No events to fit{}", in_range_hint(.dropped))]
    EmptyData { dropped: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Minimization failed: {0}")]
    Optimizer(String),

    #[error("Hesse failed: {0}")]
    Hesse(String),

    #[error("Unsupported plot format '{0}' (only .svg is supported)")]
    UnsupportedPlotFormat(String),

    #[error("Plot rendering failed: {0}")]
    Plot(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn in_range_hint(dropped: &usize) -> String {
    if *dropped > 0 {
        format!(" ({dropped} events outside the observable range were dropped)")
    } else {
        String::new()
    }
}

impl FitError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FitError::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code used by the binary when this error terminates a command.
    pub fn exit_code(&self) -> u8 {
        match self {
            FitError::InvalidVarSpec(_)
            | FitError::DuplicatePdf(_)
            | FitError::UnknownPdf(_)
            | FitError::UnknownParameter(_)
            | FitError::InvalidModel(_)
            | FitError::InvalidOptions(_)
            | FitError::UnsupportedPlotFormat(_)
            | FitError::Json(_) => 2,
            FitError::EmptyData { .. }
            | FitError::InvalidData(_)
            | FitError::Io { .. }
            | FitError::Csv(_) => 3,
            FitError::Optimizer(_) | FitError::Hesse(_) | FitError::Plot(_) => 4,
        }
    }
}

pub type Result<T, E = FitError> = std::result::Result<T, E>;

/// Error returned by the binary's command handlers.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
