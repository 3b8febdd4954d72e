//! Maximum-likelihood fits of PDF models.
//!
//! The minimization itself is done by `argmin`. This module:
//!
//! - drops events outside the observable range
//! - builds the (extended) unbinned NLL of the model
//! - maps bounded parameters to an unbounded space for the solver
//! - runs L-BFGS and/or Nelder-Mead
//! - estimates errors from the Hessian (HESSE) and writes the results back
//!   into the model

pub mod adapter;
pub mod minimizer;
pub mod nll;
pub mod options;
pub mod result;
pub mod transform;

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};

use crate::error::{FitError, Result};
use crate::math::{covariance_from_hessian, errors_from_covariance, hessian};
use crate::models::Pdf;

pub use adapter::{EvalCounts, NllProblem};
pub use minimizer::MinimizerOutcome;
pub use nll::Nll;
pub use options::{FitOptions, LineSearch, Strategy, Tolerances};
pub use result::{FitResult, ParamEstimate};
pub use transform::{ParamLayout, Transform};

/// Events of `data` inside the observable range, and the number dropped.
pub fn select_in_range<P: Pdf + ?Sized>(pdf: &P, data: &[f64]) -> (Vec<f64>, usize) {
    let obs = pdf.observable();
    let kept: Vec<f64> = data
        .iter()
        .copied()
        .filter(|x| x.is_finite() && obs.contains(*x))
        .collect();
    let dropped = data.len() - kept.len();
    (kept, dropped)
}

/// Errors and covariance of the free parameters.
struct Hesse {
    errors: Vec<Option<f64>>,
    covariance: Vec<Vec<f64>>,
    valid: bool,
    evals: u64,
}

fn run_hesse<P: Pdf + ?Sized>(nll: &Nll<'_, P>, layout: &ParamLayout, best: &[f64]) -> Result<Hesse> {
    let f = |free: &[f64]| nll.value(&layout.with_free(best, free));
    let (hess, evals) = hessian(f, &layout.free_values(best), &layout.free_limits())?;
    let (cov, pos_def) = covariance_from_hessian(&hess)?;
    let errors = errors_from_covariance(&cov);
    let finite = errors.iter().all(Option::is_some);
    if !pos_def {
        warn!("Hessian is not positive definite, errors are unreliable");
    }
    Ok(Hesse {
        errors,
        covariance: result::matrix_rows(&cov),
        valid: pos_def && finite,
        evals: evals as u64,
    })
}

/// Fit `pdf` to `data` and write the estimates back into the model.
pub fn fit<P: Pdf + ?Sized>(pdf: &mut P, data: &[f64], options: &FitOptions) -> Result<FitResult> {
    options.validate()?;
    let (events, n_dropped) = select_in_range(pdf, data);
    if n_dropped > 0 {
        warn!(
            "Dropped {n_dropped} of {} events outside the range of '{}'",
            data.len(),
            pdf.observable().name
        );
    }
    if events.is_empty() {
        return Err(FitError::EmptyData { dropped: n_dropped });
    }

    let layout = ParamLayout::from_pdf(pdf)?;
    debug!(
        "Fitting '{}' to {} events: {} free of {} parameters, strategy {:?}",
        pdf.name(),
        events.len(),
        layout.n_free(),
        layout.names().len(),
        options.strategy
    );

    let (best, outcome, hesse, nll_value, fn_evals) = {
        let target: &P = pdf;
        let nll = Nll::new(target, &events);
        let counts = Arc::new(EvalCounts::default());

        let outcome = if layout.n_free() == 0 {
            MinimizerOutcome {
                x: Vec::new(),
                cost: nll.mean_value(layout.start()),
                converged: true,
                status: "no free parameters".to_string(),
                iterations: 0,
                strategy: options.strategy,
            }
        } else {
            minimizer::minimize(
                || NllProblem::new(&nll, &layout, Arc::clone(&counts)),
                &layout,
                options,
            )?
        };
        let best = layout.to_external(&outcome.x);
        let nll_value = nll.value(&best);
        if !nll_value.is_finite() {
            return Err(FitError::Optimizer(format!("NLL is not finite at the minimum: {nll_value}")));
        }

        let hesse = if options.hesse && layout.n_free() > 0 {
            match run_hesse(&nll, &layout, &best) {
                Ok(h) => Some(h),
                Err(e) => {
                    warn!("{e}");
                    None
                }
            }
        } else {
            None
        };
        let fn_evals = counts.cost() + hesse.as_ref().map_or(0, |h| h.evals);
        (best, outcome, hesse, nll_value, fn_evals)
    };

    let free: Vec<usize> = layout.free_indices().collect();
    for (idx, (param, value)) in pdf.parameters_mut().into_iter().zip(&best).enumerate() {
        param.value = *value;
        param.error = match (&hesse, free.iter().position(|i| *i == idx)) {
            (Some(h), Some(k)) => h.errors[k],
            _ => None,
        };
    }

    let hesse_ok = match (&hesse, options.hesse && layout.n_free() > 0) {
        (Some(h), _) => h.valid,
        (None, requested) => !requested,
    };
    let result = FitResult {
        model: pdf.name().to_string(),
        valid: outcome.converged && hesse_ok,
        status: outcome.status,
        strategy: outcome.strategy,
        iterations: outcome.iterations,
        fn_evals,
        nll: nll_value,
        n_events: events.len(),
        n_dropped,
        parameters: pdf.parameters().into_iter().map(ParamEstimate::from).collect(),
        covariance: hesse.map(|h| h.covariance),
        covariance_names: layout.free_names(),
        fitted_at: Utc::now(),
    };
    info!(
        "Fit of '{}' finished: valid={}, NLL={:.4}, {} iterations ({})",
        result.model, result.valid, result.nll, result.iterations, result.status
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_sample;
    use crate::domain::RealVar;
    use crate::models::{Chebyshev, ChebyshevConfig, Gauss, GaussConfig, PdfExt};
    use test_log::test;

    fn gauss(mean: f64, sigma: f64) -> Gauss {
        Gauss::new(
            ("x", -5.0, 5.0),
            GaussConfig {
                mean: (-2.0, mean, 2.0).into(),
                sigma: (0.1, sigma, 3.0).into(),
                ..GaussConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn recovers_gauss_parameters() {
        let truth = gauss(0.5, 1.2);
        let data = generate_sample(&truth, 5_000, 1).unwrap();

        let mut model = gauss(0.0, 0.5);
        let result = model.fit(&data).unwrap();
        assert!(result.valid, "status: {}", result.status);
        assert_eq!(result.n_events, 5_000);
        let mean = model.mean();
        let sigma = model.sigma();
        let mean_err = mean.error.unwrap();
        // expected errors: sigma / sqrt(N) and sigma / sqrt(2N)
        assert!((mean_err - 1.2 / 5_000f64.sqrt()).abs() < 0.2 * mean_err, "err={mean_err}");
        assert!((mean.value - 0.5).abs() < 5.0 * mean_err, "mean={}", mean.value);
        assert!((sigma.value - 1.2).abs() < 5.0 * sigma.error.unwrap(), "sigma={}", sigma.value);
        assert_eq!(result.covariance_names, vec!["gauss_mean", "gauss_sigma"]);
        assert!(result.covariance.is_some());
    }

    #[test]
    fn simplex_and_lbfgs_agree() {
        let truth = gauss(-0.3, 0.8);
        let data = generate_sample(&truth, 2_000, 5).unwrap();
        let mut fits = Vec::new();
        for strategy in [Strategy::Lbfgs, Strategy::Simplex] {
            let mut model = gauss(0.0, 1.0);
            let opts = FitOptions {
                strategy,
                hesse: false,
                ..FitOptions::default()
            };
            let result = model.fit_with(&data, &opts).unwrap();
            assert_eq!(result.strategy, strategy);
            assert!(result.covariance.is_none());
            assert!(model.mean().error.is_none());
            fits.push(model.mean().value);
        }
        assert!((fits[0] - fits[1]).abs() < 1e-3, "{fits:?}");
    }

    #[test]
    fn events_outside_range_are_dropped() {
        let mut model = gauss(0.0, 1.0);
        let mut data = generate_sample(&model, 500, 2).unwrap();
        data.extend([7.0, -9.0, f64::NAN]);
        let result = model.fit(&data).unwrap();
        assert_eq!(result.n_events, 500);
        assert_eq!(result.n_dropped, 3);
    }

    #[test]
    fn empty_data_is_an_error() {
        let mut model = gauss(0.0, 1.0);
        let err = model.fit(&[10.0, 11.0]).unwrap_err();
        assert!(matches!(err, FitError::EmptyData { dropped: 2 }));
        assert!(matches!(model.fit(&[]), Err(FitError::EmptyData { dropped: 0 })));
    }

    #[test]
    fn constants_stay_fixed() {
        let mut model = Gauss::new(
            ("x", -5.0, 5.0),
            GaussConfig {
                sigma: RealVar::constant("gauss_sigma", 1.0).into(),
                ..GaussConfig::default()
            },
        )
        .unwrap();
        let data = generate_sample(&gauss(0.3, 1.0), 1_000, 8).unwrap();
        let result = model.fit(&data).unwrap();
        assert_eq!(model.sigma().value, 1.0);
        assert!(model.sigma().error.is_none());
        assert_eq!(result.covariance_names, vec!["gauss_mean"]);
    }

    #[test]
    fn extended_fit_recovers_yields() {
        let obs = ("x", 0.0, 10.0);
        let build = || {
            let sig = Gauss::new(
                obs,
                GaussConfig {
                    name: Some("sig".to_string()),
                    mean: (3.0, 7.0).into(),
                    sigma: (0.2, 1.0, 2.0).into(),
                    ..GaussConfig::default()
                },
            )
            .unwrap();
            let bkg = Chebyshev::new(
                obs,
                ChebyshevConfig {
                    name: Some("bkg".to_string()),
                    ..ChebyshevConfig::default()
                },
            )
            .unwrap();
            (sig + bkg).unwrap()
        };
        let mut truth = build();
        for p in truth.parameters_mut() {
            match p.name.as_str() {
                "n_sig" => p.value = 600.0,
                "n_bkg" => p.value = 1_400.0,
                _ => {}
            }
        }
        let data = generate_sample(&truth, 2_000, 21).unwrap();

        let mut model = build();
        let result = model.fit(&data).unwrap();
        let n_sig = result.param("n_sig").unwrap();
        let n_bkg = result.param("n_bkg").unwrap();
        // yields sum to N at the extended-likelihood minimum
        assert!((n_sig.value + n_bkg.value - 2_000.0).abs() < 1.0, "{} + {}", n_sig.value, n_bkg.value);
        assert!((n_sig.value - 600.0).abs() < 5.0 * n_sig.error.unwrap_or(40.0));
    }

    #[test]
    fn yield_at_its_limit_gets_finite_errors() {
        let obs = ("x", 0.0, 10.0);
        let sig = Gauss::new(
            obs,
            GaussConfig {
                name: Some("sig".to_string()),
                mean: (3.0, 5.0, 7.0).into(),
                sigma: (0.2, 1.0, 2.0).into(),
                ..GaussConfig::default()
            },
        )
        .unwrap();
        let data = generate_sample(&sig, 1_000, 13).unwrap();
        let bkg = Chebyshev::new(
            obs,
            ChebyshevConfig {
                name: Some("bkg".to_string()),
                ..ChebyshevConfig::default()
            },
        )
        .unwrap();
        let mut model = (sig + bkg).unwrap();

        // no background in the data: n_bkg ends on (or next to) its lower limit
        let result = model.fit(&data).unwrap();
        assert!(result.param("n_bkg").unwrap().value < 30.0);
        let n_sig = result.param("n_sig").unwrap();
        assert!((n_sig.value - 1_000.0).abs() < 40.0, "n_sig={}", n_sig.value);
        let err = n_sig.error.unwrap();
        assert!(err > 10.0 && err < 100.0, "err={err}");

        for p in &result.parameters {
            assert!(p.error.is_none_or(|e| e.is_finite() && e >= 0.0), "{}: {:?}", p.name, p.error);
        }
        for p in model.parameters() {
            assert!(p.error.is_none_or(f64::is_finite), "{}: {:?}", p.name, p.error);
        }
        assert!(!crate::report::format_fit_summary(&result).contains("NaN"));
    }
}
