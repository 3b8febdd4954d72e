//! Fit options and their validation.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// Default L-BFGS history size.
pub const DEFAULT_LBFGS_MEM: usize = 7;

/// Which argmin solver runs the minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// L-BFGS, retried with Nelder-Mead when it fails or does not converge.
    Auto,
    /// L-BFGS with finite-difference gradients.
    Lbfgs,
    /// Nelder-Mead simplex (no gradients).
    Simplex,
}

impl Strategy {
    pub fn display_name(self) -> &'static str {
        match self {
            Strategy::Auto => "auto",
            Strategy::Lbfgs => "L-BFGS",
            Strategy::Simplex => "Nelder-Mead",
        }
    }
}

/// Line search used by L-BFGS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LineSearch {
    MoreThuente,
    HagerZhang,
}

/// Stopping criteria. At least one must be set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<u64>,
}

impl Tolerances {
    pub fn new(tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<u64>) -> Result<Self> {
        let tols = Self {
            tol_grad,
            tol_cost,
            max_iter,
        };
        tols.validate()?;
        Ok(tols)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tol_grad.is_none() && self.tol_cost.is_none() && self.max_iter.is_none() {
            return Err(FitError::InvalidOptions(
                "at least one of tol_grad, tol_cost or max_iter must be set".to_string(),
            ));
        }
        for (label, tol) in [("tol_grad", self.tol_grad), ("tol_cost", self.tol_cost)] {
            match tol {
                Some(t) if !(t.is_finite() && t > 0.0) => {
                    return Err(FitError::InvalidOptions(format!(
                        "{label} must be positive and finite, got {t}"
                    )));
                }
                _ => {}
            }
        }
        if self.max_iter == Some(0) {
            return Err(FitError::InvalidOptions("max_iter must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            tol_grad: Some(1e-6),
            tol_cost: Some(1e-10),
            max_iter: Some(1_000),
        }
    }
}

/// Options for [`crate::fit::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub strategy: Strategy,
    pub line_search: LineSearch,
    pub tolerances: Tolerances,
    pub lbfgs_mem: usize,
    /// Estimate errors from the Hessian after the minimization.
    pub hesse: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            line_search: LineSearch::MoreThuente,
            tolerances: Tolerances::default(),
            lbfgs_mem: DEFAULT_LBFGS_MEM,
            hesse: true,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<()> {
        self.tolerances.validate()?;
        if self.lbfgs_mem == 0 {
            return Err(FitError::InvalidOptions("lbfgs_mem must be > 0".to_string()));
        }
        Ok(())
    }
}
