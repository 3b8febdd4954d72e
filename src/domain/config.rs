//! Run configuration derived from CLI flags (plus defaults).

use std::path::PathBuf;

use crate::fit::FitOptions;

/// Default SVG size in pixels.
pub const DEFAULT_SVG_SIZE: (u32, u32) = (640, 640);
/// Default ASCII plot size in characters.
pub const DEFAULT_ASCII_SIZE: (usize, usize) = (72, 20);

/// Rendering settings shared by the plot backends.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotConfig {
    /// Histogram bins; `None` picks `floor(2 N^0.333)`.
    pub nbins: Option<usize>,
    /// Plot range; `None` uses the data range.
    pub xrange: Option<(f64, f64)>,
    pub svg_width: u32,
    pub svg_height: u32,
    pub ascii_width: usize,
    pub ascii_height: usize,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            nbins: None,
            xrange: None,
            svg_width: DEFAULT_SVG_SIZE.0,
            svg_height: DEFAULT_SVG_SIZE.1,
            ascii_width: DEFAULT_ASCII_SIZE.0,
            ascii_height: DEFAULT_ASCII_SIZE.1,
        }
    }
}

/// Configuration for the `fit` and `view` commands.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub model_path: PathBuf,
    pub data_path: PathBuf,
    /// CSV column holding the observable; defaults to the observable name.
    pub column: Option<String>,
    pub options: FitOptions,
    pub plot: PlotConfig,
    pub plot_path: Option<PathBuf>,
    pub ascii: bool,
    pub export_result: Option<PathBuf>,
}

/// Configuration for the `generate` command.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateConfig {
    pub model_path: PathBuf,
    /// Events to draw; ignored when `extended` is set.
    pub n_events: usize,
    pub seed: u64,
    /// Draw the event count from a Poisson distribution around the expected yield.
    pub extended: bool,
    pub out: PathBuf,
}
