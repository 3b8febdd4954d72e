//! The `Pdf` trait and shared bookkeeping for concrete models.

use std::fmt;
use std::path::Path;

use log::warn;
use rand::RngCore;

use crate::data::sample::accept_reject;
use crate::domain::{ParamSet, RealVar, VarSpec, create_named_var, create_real_var};
use crate::error::Result;
use crate::fit::{FitOptions, FitResult};

/// A normalized probability density over one observable.
///
/// Parameter values are passed explicitly to [`Pdf::density`] so that the
/// fitter can evaluate trial points without touching the model. The order of
/// `values` is the order of [`Pdf::parameters`].
pub trait Pdf: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn title(&self) -> &str;

    fn observable(&self) -> &RealVar;

    /// All parameters in fit order.
    fn parameters(&self) -> Vec<&RealVar>;

    fn parameters_mut(&mut self) -> Vec<&mut RealVar>;

    /// Number of entries of [`Pdf::parameters`].
    fn n_params(&self) -> usize {
        self.parameters().len()
    }

    /// Density at `x`, normalized on the observable range.
    fn density(&self, x: f64, values: &[f64]) -> f64;

    /// Densities for a batch of points.
    ///
    /// Implementations override this to compute normalizations once per call.
    fn densities(&self, xs: &[f64], values: &[f64], out: &mut [f64]) {
        for (o, &x) in out.iter_mut().zip(xs) {
            *o = self.density(x, values);
        }
    }

    /// Expected number of events for extended models.
    fn expected_events(&self, _values: &[f64]) -> Option<f64> {
        None
    }

    /// Sub-PDFs with their yield fractions (empty for simple models).
    fn components(&self) -> Vec<PdfComponent<'_>> {
        Vec::new()
    }

    /// Current parameter values, in fit order.
    fn values(&self) -> Vec<f64> {
        self.parameters().iter().map(|p| p.value).collect()
    }

    /// Density at `x` for the current parameter values.
    fn evaluate(&self, x: f64) -> f64 {
        self.density(x, &self.values())
    }

    /// Draw `n` events at the current parameter values.
    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Result<Vec<f64>> {
        accept_reject(self, n, rng)
    }

    fn clone_box(&self) -> Box<dyn Pdf>;
}

impl Clone for Box<dyn Pdf> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A weighted sub-PDF of a composite model.
#[derive(Debug, Clone, Copy)]
pub struct PdfComponent<'a> {
    pub title: &'a str,
    /// Yield fraction `n_k / Σ n`.
    pub fraction: f64,
    pub pdf: &'a dyn Pdf,
}

/// Name, title, observable and parameters of a simple model.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfCore {
    pub name: String,
    pub title: String,
    pub observable: RealVar,
    pub params: ParamSet,
}

impl PdfCore {
    pub fn new(name: impl Into<String>, title: Option<String>, observable: impl Into<VarSpec>) -> Result<Self> {
        let name = name.into();
        let title = title.unwrap_or_else(|| name.clone());
        Ok(Self {
            observable: Self::add_observable(observable)?,
            name,
            title,
            params: ParamSet::new(),
        })
    }

    /// Build the observable, warning when it has to be named automatically.
    pub fn add_observable(spec: impl Into<VarSpec>) -> Result<RealVar> {
        let spec = spec.into();
        let unnamed = spec.name().is_none();
        let var = create_real_var(spec)?;
        if unnamed {
            warn!("Choosing automatic variable name '{}'", var.name);
        }
        Ok(var)
    }

    /// Register a parameter named `<pdf name>_<key>`.
    pub fn add_parameter(&mut self, spec: impl Into<VarSpec>, key: &str) -> Result<()> {
        let var = create_named_var(spec, &format!("{}_{key}", self.name))?;
        self.params.insert(key, var)
    }

    pub fn parameters(&self) -> Vec<&RealVar> {
        self.params.vars().collect()
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut RealVar> {
        self.params.vars_mut().collect()
    }
}

/// Fitting, plotting and reporting shortcuts available on every model.
pub trait PdfExt: Pdf {
    /// Fit to `data` with default options.
    fn fit(&mut self, data: &[f64]) -> Result<FitResult> {
        self.fit_with(data, &FitOptions::default())
    }

    fn fit_with(&mut self, data: &[f64], options: &FitOptions) -> Result<FitResult> {
        crate::fit::fit(self, data, options)
    }

    /// Render data and model to an SVG file with default settings.
    fn plot(&self, data: &[f64], path: &Path) -> Result<()> {
        let config = crate::domain::PlotConfig::default();
        let plotter = crate::plot::Plotter::new(self, data, &config)?;
        crate::plot::svg::render_svg(&plotter, path, &config)
    }

    /// Parameter table for the current values.
    fn get(&self) -> String {
        crate::report::format_parameters(self)
    }
}

impl<P: Pdf + ?Sized> PdfExt for P {}
