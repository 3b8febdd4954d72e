//! Mapping between bounded model parameters and the unbounded space the
//! minimizer works in.
//!
//! - two-sided limits: `ext = lo + (hi - lo) (sin(int) + 1) / 2`
//! - lower limit only: `ext = lo - 1 + sqrt(int² + 1)`
//! - upper limit only: `ext = hi + 1 - sqrt(int² + 1)`
//!
//! Constant parameters never reach the minimizer.

use std::collections::HashSet;

use crate::error::{FitError, Result};
use crate::models::Pdf;

/// Keeps `asin` off its flat end points.
const EDGE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Free,
    Double { lo: f64, hi: f64 },
    Lower { lo: f64 },
    Upper { hi: f64 },
}

impl Transform {
    pub fn from_limits(lwb: Option<f64>, upb: Option<f64>) -> Self {
        let lo = lwb.filter(|v| v.is_finite());
        let hi = upb.filter(|v| v.is_finite());
        match (lo, hi) {
            (Some(lo), Some(hi)) if lo < hi => Transform::Double { lo, hi },
            (Some(lo), None) => Transform::Lower { lo },
            (None, Some(hi)) => Transform::Upper { hi },
            _ => Transform::Free,
        }
    }

    pub fn to_external(self, int: f64) -> f64 {
        match self {
            Transform::Free => int,
            Transform::Double { lo, hi } => lo + 0.5 * (hi - lo) * (int.sin() + 1.0),
            Transform::Lower { lo } => lo - 1.0 + (int * int + 1.0).sqrt(),
            Transform::Upper { hi } => hi + 1.0 - (int * int + 1.0).sqrt(),
        }
    }

    /// Internal value of `ext`, clamped into the limits first.
    pub fn to_internal(self, ext: f64) -> f64 {
        match self {
            Transform::Free => ext,
            Transform::Double { lo, hi } => {
                let arg = 2.0 * (ext.clamp(lo, hi) - lo) / (hi - lo) - 1.0;
                arg.clamp(-1.0 + EDGE, 1.0 - EDGE).asin()
            }
            Transform::Lower { lo } => {
                let d = ext.max(lo) - lo + 1.0;
                (d * d - 1.0).max(0.0).sqrt()
            }
            Transform::Upper { hi } => {
                let d = hi - ext.min(hi) + 1.0;
                (d * d - 1.0).max(0.0).sqrt()
            }
        }
    }

    /// External limits (infinite where open).
    pub fn limits(self) -> (f64, f64) {
        match self {
            Transform::Free => (f64::NEG_INFINITY, f64::INFINITY),
            Transform::Double { lo, hi } => (lo, hi),
            Transform::Lower { lo } => (lo, f64::INFINITY),
            Transform::Upper { hi } => (f64::NEG_INFINITY, hi),
        }
    }

    pub fn is_bounded(self) -> bool {
        !matches!(self, Transform::Free)
    }
}

/// Which model parameters are free and how they are transformed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamLayout {
    names: Vec<String>,
    start: Vec<f64>,
    free: Vec<(usize, Transform)>,
}

impl ParamLayout {
    /// Layout of `pdf`'s parameters with initial values clamped into limits.
    ///
    /// Two parameters with the same name are rejected.
    pub fn from_pdf<P: Pdf + ?Sized>(pdf: &P) -> Result<Self> {
        let params = pdf.parameters();
        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(params.len());
        let mut start = Vec::with_capacity(params.len());
        let mut free = Vec::new();
        for (idx, p) in params.iter().enumerate() {
            if !seen.insert(p.name.as_str()) {
                return Err(FitError::InvalidModel(format!(
                    "parameter name '{}' is used twice in '{}'",
                    p.name,
                    pdf.name()
                )));
            }
            if !p.value.is_finite() {
                return Err(FitError::InvalidModel(format!(
                    "parameter '{}' has non-finite value {}",
                    p.name, p.value
                )));
            }
            names.push(p.name.clone());
            start.push(p.clamp(p.value));
            if !p.is_constant {
                free.push((idx, Transform::from_limits(p.lwb, p.upb)));
            }
        }
        Ok(Self { names, start, free })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Full parameter vector at the start point.
    pub fn start(&self) -> &[f64] {
        &self.start
    }

    pub fn n_free(&self) -> usize {
        self.free.len()
    }

    pub fn free_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.free.iter().map(|(i, _)| *i)
    }

    pub fn free_names(&self) -> Vec<String> {
        self.free_indices().map(|i| self.names[i].clone()).collect()
    }

    pub fn transforms(&self) -> impl Iterator<Item = Transform> + '_ {
        self.free.iter().map(|(_, t)| *t)
    }

    /// Internal coordinates of the start point.
    pub fn internal_start(&self) -> Vec<f64> {
        self.free
            .iter()
            .map(|(i, t)| t.to_internal(self.start[*i]))
            .collect()
    }

    /// Full external parameter vector from internal free coordinates.
    pub fn to_external(&self, internal: &[f64]) -> Vec<f64> {
        let mut out = self.start.clone();
        for ((i, t), v) in self.free.iter().zip(internal) {
            out[*i] = t.to_external(*v);
        }
        out
    }

    /// Full external vector from external values of the free parameters.
    pub fn with_free(&self, base: &[f64], free_values: &[f64]) -> Vec<f64> {
        let mut out = base.to_vec();
        for ((i, _), v) in self.free.iter().zip(free_values) {
            out[*i] = *v;
        }
        out
    }

    pub fn free_values(&self, full: &[f64]) -> Vec<f64> {
        self.free_indices().map(|i| full[i]).collect()
    }

    pub fn free_limits(&self) -> Vec<(f64, f64)> {
        self.transforms().map(Transform::limits).collect()
    }
}
