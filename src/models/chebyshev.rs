//! Chebyshev polynomial PDF on a bounded observable.

use crate::domain::{RealVar, VarSpec};
use crate::error::{FitError, Result};
use crate::math::{chebyshev_density, chebyshev_integral, chebyshev_shape, to_unit_interval};
use crate::models::{Pdf, PdfCore};

/// Construction settings for [`Chebyshev`].
///
/// When `coefficients` is empty, `order` coefficients with range
/// `(-1, 0, 1)` are created.
#[derive(Debug, Clone, PartialEq)]
pub struct ChebyshevConfig {
    pub name: Option<String>,
    pub title: Option<String>,
    pub order: usize,
    pub coefficients: Vec<VarSpec>,
}

impl Default for ChebyshevConfig {
    fn default() -> Self {
        Self {
            name: None,
            title: None,
            order: 1,
            coefficients: Vec::new(),
        }
    }
}

/// `f(x) ∝ 1 + Σ a_k T_k(x')` with coefficients `a1..aN`.
///
/// The normalization is the analytic integral of the polynomial over the
/// observable range. Where the polynomial is negative the density is clamped
/// to `0`, but that region still enters the integral, so coefficients that
/// make the shape negative somewhere leave the density integrating to more
/// than one. Keep the coefficient limits tight enough to avoid this.
#[derive(Debug, Clone, PartialEq)]
pub struct Chebyshev {
    core: PdfCore,
    lo: f64,
    hi: f64,
}

impl Chebyshev {
    pub const DEFAULT_NAME: &'static str = "chebyshev";

    pub fn new(observable: impl Into<VarSpec>, config: ChebyshevConfig) -> Result<Self> {
        let name = config.name.unwrap_or_else(|| Self::DEFAULT_NAME.to_string());
        let mut core = PdfCore::new(name, config.title, observable)?;
        let Some((lo, hi)) = core.observable.bounds() else {
            return Err(FitError::InvalidModel(format!(
                "Chebyshev '{}' needs a bounded observable, '{}' has no finite range",
                core.name, core.observable.name
            )));
        };
        if config.order == 0 {
            return Err(FitError::InvalidModel(format!(
                "Chebyshev '{}' order must be >= 1",
                core.name
            )));
        }

        let specs = if config.coefficients.is_empty() {
            vec![VarSpec::from((-1.0, 0.0, 1.0)); config.order]
        } else if config.coefficients.len() == config.order {
            config.coefficients
        } else {
            return Err(FitError::InvalidModel(format!(
                "Chebyshev '{}' of order {} got {} coefficients",
                core.name,
                config.order,
                config.coefficients.len()
            )));
        };
        for (k, spec) in specs.into_iter().enumerate() {
            core.add_parameter(spec, &format!("a{}", k + 1))?;
        }
        Ok(Self { core, lo, hi })
    }

    /// First-order polynomial with default coefficient range.
    pub fn linear(observable: impl Into<VarSpec>) -> Result<Self> {
        Self::new(observable, ChebyshevConfig::default())
    }

    pub fn order(&self) -> usize {
        self.core.params.len()
    }

    pub fn coefficients(&self) -> Vec<&RealVar> {
        self.core.parameters()
    }
}

impl Pdf for Chebyshev {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn title(&self) -> &str {
        &self.core.title
    }

    fn observable(&self) -> &RealVar {
        &self.core.observable
    }

    fn parameters(&self) -> Vec<&RealVar> {
        self.core.parameters()
    }

    fn parameters_mut(&mut self) -> Vec<&mut RealVar> {
        self.core.parameters_mut()
    }

    fn n_params(&self) -> usize {
        self.core.params.len()
    }

    fn density(&self, x: f64, values: &[f64]) -> f64 {
        chebyshev_density(x, values, self.lo, self.hi)
    }

    fn densities(&self, xs: &[f64], values: &[f64], out: &mut [f64]) {
        let norm = chebyshev_integral(values, self.lo, self.hi);
        for (o, &x) in out.iter_mut().zip(xs) {
            *o = if norm > 0.0 && norm.is_finite() && (self.lo..=self.hi).contains(&x) {
                let f = chebyshev_shape(to_unit_interval(x, self.lo, self.hi), values);
                if f > 0.0 { f / norm } else { 0.0 }
            } else {
                0.0
            };
        }
    }

    fn clone_box(&self) -> Box<dyn Pdf> {
        Box::new(self.clone())
    }
}
