//! Gaussian PDF.

use rand::RngCore;
use rand_distr::{Distribution, Normal as NormalDist};

use crate::data::sample::accept_reject;
use crate::domain::{RealVar, VarSpec};
use crate::error::{FitError, Result};
use crate::math::{normal_pdf, std_normal_cdf, truncated_normal_pdf};
use crate::models::{Pdf, PdfCore};

/// Below this probability mass inside the range, sampling switches from
/// rejecting normal draws to accept-reject on the density.
const MIN_REJECTION_MASS: f64 = 1e-3;

/// Construction settings for [`Gauss`].
#[derive(Debug, Clone, PartialEq)]
pub struct GaussConfig {
    pub name: Option<String>,
    pub title: Option<String>,
    pub mean: VarSpec,
    pub sigma: VarSpec,
}

impl Default for GaussConfig {
    fn default() -> Self {
        Self {
            name: None,
            title: None,
            mean: (-1.0, 0.0, 1.0).into(),
            sigma: (0.0, 1.0).into(),
        }
    }
}

/// Normal distribution with parameters `mean` and `sigma`.
///
/// On a bounded observable the density is normalized on the range.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauss {
    core: PdfCore,
}

/// Alias kept for users who think of the model as a normal distribution.
pub type Normal = Gauss;

impl Gauss {
    pub const DEFAULT_NAME: &'static str = "gauss";

    pub fn new(observable: impl Into<VarSpec>, config: GaussConfig) -> Result<Self> {
        let name = config.name.unwrap_or_else(|| Self::DEFAULT_NAME.to_string());
        let mut core = PdfCore::new(name, config.title, observable)?;
        core.add_parameter(config.mean, "mean")?;
        core.add_parameter(config.sigma, "sigma")?;
        Ok(Self { core })
    }

    /// Gaussian with the default parameter ranges.
    pub fn with_defaults(observable: impl Into<VarSpec>) -> Result<Self> {
        Self::new(observable, GaussConfig::default())
    }

    pub fn mean(&self) -> &RealVar {
        &self.core.params["mean"]
    }

    pub fn sigma(&self) -> &RealVar {
        &self.core.params["sigma"]
    }

    fn normalization(&self, mean: f64, sigma: f64) -> Option<f64> {
        let (lo, hi) = self.core.observable.bounds()?;
        Some(std_normal_cdf((hi - mean) / sigma) - std_normal_cdf((lo - mean) / sigma))
    }
}

impl Pdf for Gauss {
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
        2
    }

    fn density(&self, x: f64, values: &[f64]) -> f64 {
        truncated_normal_pdf(x, values[0], values[1], self.core.observable.bounds())
    }

    fn densities(&self, xs: &[f64], values: &[f64], out: &mut [f64]) {
        let (mean, sigma) = (values[0], values[1]);
        let obs = &self.core.observable;
        let mass = if sigma > 0.0 {
            self.normalization(mean, sigma).unwrap_or(1.0)
        } else {
            0.0
        };
        for (o, &x) in out.iter_mut().zip(xs) {
            *o = if mass > 0.0 && obs.contains(x) {
                normal_pdf(x, mean, sigma) / mass
            } else {
                0.0
            };
        }
    }

    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Result<Vec<f64>> {
        let (mean, sigma) = (self.mean().value, self.sigma().value);
        let dist = NormalDist::new(mean, sigma)
            .map_err(|e| FitError::InvalidModel(format!("cannot sample {}: {e}", self.core.name)))?;
        let mass = if sigma > 0.0 {
            self.normalization(mean, sigma).unwrap_or(1.0)
        } else {
            0.0
        };
        if mass < MIN_REJECTION_MASS {
            return accept_reject(self, n, rng);
        }
        let obs = &self.core.observable;
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let x = dist.sample(rng);
            if obs.contains(x) {
                out.push(x);
            }
        }
        Ok(out)
    }

    fn clone_box(&self) -> Box<dyn Pdf> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn defaults_follow_the_documented_ranges() {
        let g = Gauss::with_defaults(("x", -3.0, 3.0)).unwrap();
        assert_eq!(g.name(), "gauss");
        assert_eq!(g.title(), "gauss");
        let names: Vec<&str> = g.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["gauss_mean", "gauss_sigma"]);
        assert_eq!(g.mean().value, 0.0);
        assert_eq!((g.mean().lwb, g.mean().upb), (Some(-1.0), Some(1.0)));
        assert_eq!(g.sigma().value, 0.5);
        assert_eq!((g.sigma().lwb, g.sigma().upb), (Some(0.0), Some(1.0)));
    }

    #[test]
    fn custom_name_qualifies_parameters() {
        let cfg = GaussConfig {
            name: Some("sig".to_string()),
            mean: (745.0, 755.0).into(),
            sigma: (0.1, 1.0, 2.0).into(),
            ..GaussConfig::default()
        };
        let g = Gauss::new(("mass", 740.0, 760.0), cfg).unwrap();
        assert_eq!(g.mean().name, "sig_mean");
        assert_eq!(g.mean().value, 750.0);
        assert_eq!(g.sigma().name, "sig_sigma");
        assert_eq!(g.sigma().value, 1.0);
    }

    #[test]
    fn explicit_parameter_var_keeps_its_name() {
        let shared = RealVar::new("width", 2.0).with_limits(0.5, 5.0);
        let cfg = GaussConfig {
            sigma: shared.clone().into(),
            ..GaussConfig::default()
        };
        let g = Gauss::new(("x", -10.0, 10.0), cfg).unwrap();
        assert_eq!(g.sigma(), &shared);
    }

    #[test]
    fn batch_and_pointwise_densities_agree() {
        let g = Gauss::with_defaults(("x", -1.0, 2.0)).unwrap();
        let values = [0.2, 0.7];
        let xs = [-1.5, -1.0, 0.0, 0.9, 2.0];
        let mut out = [0.0; 5];
        g.densities(&xs, &values, &mut out);
        for (x, d) in xs.iter().zip(out) {
            assert!((g.density(*x, &values) - d).abs() < 1e-14);
        }
        assert_eq!(out[0], 0.0);
        assert_eq!(g.density(0.0, &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn samples_stay_in_range() {
        let g = Gauss::with_defaults(("x", -0.5, 3.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let xs = g.sample(2_000, &mut rng).unwrap();
        assert_eq!(xs.len(), 2_000);
        assert!(xs.iter().all(|x| (-0.5..=3.0).contains(x)));
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        assert!(mean > 0.0 && mean < 0.5, "mean={mean}");
    }
}
