//! Fit outputs.
//!
//! Results are serializable so they can be exported to JSON and applied to a
//! model again later (see [`crate::io::apply_result`]).

use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::RealVar;
use crate::fit::options::Strategy;
use crate::math::correlation;

/// Estimated value of one model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEstimate {
    pub name: String,
    pub value: f64,
    /// HESSE error; `None` for constants or when HESSE did not run.
    pub error: Option<f64>,
    pub lwb: Option<f64>,
    pub upb: Option<f64>,
    pub is_constant: bool,
}

impl From<&RealVar> for ParamEstimate {
    fn from(var: &RealVar) -> Self {
        Self {
            name: var.name.clone(),
            value: var.value,
            error: var.error,
            lwb: var.lwb,
            upb: var.upb,
            is_constant: var.is_constant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Name of the fitted model.
    pub model: String,
    /// Converged, and (when HESSE ran) a positive-definite Hessian with finite errors.
    pub valid: bool,
    /// Termination status reported by the solver.
    pub status: String,
    /// Solver that produced the result.
    pub strategy: Strategy,
    pub iterations: u64,
    /// Cost evaluations including finite-difference and HESSE evaluations.
    pub fn_evals: u64,
    /// NLL at the minimum (not divided by the number of events).
    pub nll: f64,
    pub n_events: usize,
    /// Events dropped because they were outside the observable range.
    pub n_dropped: usize,
    pub parameters: Vec<ParamEstimate>,
    /// Covariance of the free parameters, ordered like `covariance_names`.
    pub covariance: Option<Vec<Vec<f64>>>,
    pub covariance_names: Vec<String>,
    pub fitted_at: DateTime<Utc>,
}

impl FitResult {
    pub fn param(&self, name: &str) -> Option<&ParamEstimate> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn covariance_matrix(&self) -> Option<DMatrix<f64>> {
        let rows = self.covariance.as_ref()?;
        let n = rows.len();
        if rows.iter().any(|r| r.len() != n) {
            return None;
        }
        Some(DMatrix::from_fn(n, n, |i, j| rows[i][j]))
    }

    pub fn correlation_matrix(&self) -> Option<DMatrix<f64>> {
        self.covariance_matrix().map(|c| correlation(&c))
    }
}

pub(crate) fn matrix_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..m.nrows())
        .map(|i| (0..m.ncols()).map(|j| m[(i, j)]).collect())
        .collect()
}
