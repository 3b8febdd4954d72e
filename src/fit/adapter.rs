//! Adapter that exposes a model NLL as an `argmin` problem.
//!
//! The minimizer works on the internal (unbounded) coordinates of the free
//! parameters. Each cost evaluation maps them back to the full external
//! parameter vector and returns the NLL per event. Gradients are central
//! finite differences of that cost, with a forward-difference retry when the
//! central estimate is not finite.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;

use crate::fit::nll::Nll;
use crate::fit::transform::ParamLayout;
use crate::models::Pdf;

/// Cost and gradient evaluation counters shared with the caller.
#[derive(Debug, Default)]
pub struct EvalCounts {
    cost: AtomicU64,
    grad: AtomicU64,
}

impl EvalCounts {
    pub fn cost(&self) -> u64 {
        self.cost.load(Ordering::Relaxed)
    }

    pub fn grad(&self) -> u64 {
        self.grad.load(Ordering::Relaxed)
    }
}

pub struct NllProblem<'a, P: Pdf + ?Sized> {
    nll: &'a Nll<'a, P>,
    layout: &'a ParamLayout,
    counts: Arc<EvalCounts>,
}

impl<'a, P: Pdf + ?Sized> NllProblem<'a, P> {
    pub fn new(nll: &'a Nll<'a, P>, layout: &'a ParamLayout, counts: Arc<EvalCounts>) -> Self {
        Self { nll, layout, counts }
    }

    fn eval(&self, internal: &[f64]) -> f64 {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        self.nll.mean_value(&self.layout.to_external(internal))
    }
}

impl<P: Pdf + ?Sized> CostFunction for NllProblem<'_, P> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, internal: &Self::Param) -> Result<Self::Output, Error> {
        let value = self.eval(internal);
        if !value.is_finite() {
            return Err(Error::msg(format!("non-finite NLL {value}")));
        }
        Ok(value)
    }
}

impl<P: Pdf + ?Sized> Gradient for NllProblem<'_, P> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, internal: &Self::Param) -> Result<Self::Gradient, Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        let cost = |p: &Vec<f64>| self.eval(p);
        let grad = internal.central_diff(&cost);
        if grad.iter().all(|g| g.is_finite()) {
            return Ok(grad);
        }
        let grad = internal.forward_diff(&cost);
        if grad.iter().all(|g| g.is_finite()) {
            Ok(grad)
        } else {
            Err(Error::msg("non-finite finite-difference gradient"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gauss;

    #[test]
    fn gradient_vanishes_at_the_sample_mean() {
        // no limits on the mean, sigma fixed: minimum at the sample mean
        let cfg = crate::models::GaussConfig {
            mean: 0.0.into(),
            sigma: crate::domain::RealVar::constant("gauss_sigma", 1.0).into(),
            ..Default::default()
        };
        let g = Gauss::new(0.0, cfg).unwrap();
        let data = [-0.5, 0.1, 0.3, 1.1];
        let nll = Nll::new(&g, &data);
        let layout = ParamLayout::from_pdf(&g).unwrap();
        let counts = Arc::new(EvalCounts::default());
        let problem = NllProblem::new(&nll, &layout, Arc::clone(&counts));

        let grad = problem.gradient(&vec![0.25]).unwrap();
        assert!(grad[0].abs() < 1e-6, "grad={grad:?}");
        let off = problem.gradient(&vec![1.25]).unwrap();
        // d(mean NLL)/dmu = (mu - xbar) / sigma^2
        assert!((off[0] - 1.0).abs() < 1e-5, "grad={off:?}");
        assert_eq!(counts.grad(), 2);
        assert!(counts.cost() >= 4);
        assert!(problem.cost(&vec![0.25]).unwrap().is_finite());
    }
}
