//! Command-line parsing for the `minufit` binary.
//!
//! Argument parsing and command dispatch stay separate from the modeling code:
//! this module only describes the flags, [`crate::app`] turns them into
//! configuration and runs the commands.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::fit::{LineSearch, Strategy};
use crate::plot::PlotPart;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "minufit", version, about = "Unbinned maximum-likelihood fits of PDF models")]
pub struct Cli {
    /// More log output (repeat for debug/trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a model to data, print the result and optionally plot/export it.
    Fit(FitArgs),
    /// Generate a toy dataset from a model.
    Generate(GenerateArgs),
    /// Plot data with a model (optionally with stored fit results).
    Plot(PlotArgs),
    /// Print a stored fit result.
    Get(GetArgs),
    /// Interactive terminal viewer: fit on start, then explore the plot.
    View(ViewArgs),
}

/// Model and data inputs shared by the commands that read data.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// JSON model file.
    #[arg(short, long, value_name = "JSON")]
    pub model: PathBuf,

    /// Data file: CSV with a header, or one value per line.
    #[arg(short, long, value_name = "FILE")]
    pub data: PathBuf,

    /// CSV column holding the observable (default: the observable name).
    #[arg(long)]
    pub column: Option<String>,
}

/// Histogram settings.
#[derive(Debug, Args, Clone)]
pub struct BinningArgs {
    /// Number of histogram bins (default: floor(2 N^0.333)).
    #[arg(long)]
    pub nbins: Option<usize>,

    /// Lower end of the plot range (default: data minimum).
    #[arg(long, requires = "xmax", allow_hyphen_values = true)]
    pub xmin: Option<f64>,

    /// Upper end of the plot range (default: data maximum).
    #[arg(long, requires = "xmin", allow_hyphen_values = true)]
    pub xmax: Option<f64>,

    /// ASCII plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// ASCII plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

/// Minimizer settings.
#[derive(Debug, Args, Clone)]
pub struct SolverArgs {
    /// Minimization strategy.
    #[arg(long, value_enum, default_value_t = Strategy::Auto)]
    pub strategy: Strategy,

    /// Line search used by L-BFGS.
    #[arg(long, value_enum, default_value_t = LineSearch::MoreThuente)]
    pub line_search: LineSearch,

    /// Maximum number of iterations.
    #[arg(long, default_value_t = 1000)]
    pub max_iter: u64,

    /// Gradient-norm tolerance.
    #[arg(long, default_value_t = 1e-6)]
    pub tol_grad: f64,

    /// Cost-change tolerance.
    #[arg(long, default_value_t = 1e-10)]
    pub tol_cost: f64,

    /// L-BFGS history size.
    #[arg(long, default_value_t = 7)]
    pub lbfgs_mem: usize,

    /// Skip the error estimation from the Hessian.
    #[arg(long)]
    pub no_hesse: bool,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub solver: SolverArgs,

    #[command(flatten)]
    pub binning: BinningArgs,

    /// Write an SVG plot of the fit.
    #[arg(long, value_name = "SVG")]
    pub plot: Option<PathBuf>,

    /// Print an ASCII plot of the fit.
    #[arg(long)]
    pub ascii: bool,

    /// Export the fit result to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    /// JSON model file.
    #[arg(short, long, value_name = "JSON")]
    pub model: PathBuf,

    /// Number of events.
    #[arg(short = 'n', long, default_value_t = 1000)]
    pub events: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Draw the number of events from a Poisson around the model's expected yield.
    #[arg(long)]
    pub extended: bool,

    /// Output CSV file.
    #[arg(short, long, value_name = "CSV")]
    pub out: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub binning: BinningArgs,

    /// Fit result JSON whose parameter values are applied before plotting.
    #[arg(long, value_name = "JSON")]
    pub result: Option<PathBuf>,

    /// SVG output file.
    #[arg(short, long, value_name = "SVG")]
    pub out: Option<PathBuf>,

    /// Print an ASCII plot.
    #[arg(long)]
    pub ascii: bool,

    /// Parts to draw (default depends on the model).
    #[arg(long, value_enum, value_delimiter = ',')]
    pub parts: Vec<PlotPart>,
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    /// Fit result JSON produced by `minufit fit --export`.
    #[arg(short, long, value_name = "JSON")]
    pub result: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct ViewArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Initial number of histogram bins.
    #[arg(long)]
    pub nbins: Option<usize>,
}
