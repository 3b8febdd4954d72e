//! Toy data generation from PDF models.

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Poisson};

use crate::error::{FitError, Result};
use crate::models::Pdf;

/// Grid points used to estimate the accept-reject envelope.
const ENVELOPE_GRID: usize = 2_000;
/// Safety factor applied to the grid maximum.
const ENVELOPE_MARGIN: f64 = 1.2;
/// Trials per requested event before giving up.
const MAX_TRIALS_PER_EVENT: usize = 100_000;

/// Draw `n` events from `pdf` by accept-reject on its bounded observable.
pub fn accept_reject<P: Pdf + ?Sized>(pdf: &P, n: usize, rng: &mut dyn RngCore) -> Result<Vec<f64>> {
    let obs = pdf.observable();
    let Some((lo, hi)) = obs.bounds() else {
        return Err(FitError::InvalidModel(format!(
            "cannot sample '{}': observable '{}' is unbounded",
            pdf.name(),
            obs.name
        )));
    };
    let values = pdf.values();
    let step = (hi - lo) / (ENVELOPE_GRID - 1) as f64;
    let grid: Vec<f64> = (0..ENVELOPE_GRID).map(|i| lo + i as f64 * step).collect();
    let mut dens = vec![0.0; grid.len()];
    pdf.densities(&grid, &values, &mut dens);
    let fmax = dens.iter().copied().fold(0.0, f64::max) * ENVELOPE_MARGIN;
    if !(fmax > 0.0) || !fmax.is_finite() {
        return Err(FitError::InvalidModel(format!(
            "cannot sample '{}': density vanishes on [{lo}, {hi}]",
            pdf.name()
        )));
    }

    let mut out = Vec::with_capacity(n);
    let max_trials = n.saturating_mul(MAX_TRIALS_PER_EVENT).max(MAX_TRIALS_PER_EVENT);
    let mut trials = 0usize;
    while out.len() < n {
        trials += 1;
        if trials > max_trials {
            return Err(FitError::InvalidModel(format!(
                "cannot sample '{}': acceptance too low",
                pdf.name()
            )));
        }
        let x = rng.gen_range(lo..=hi);
        let u = rng.gen_range(0.0..fmax);
        if u < pdf.density(x, &values) {
            out.push(x);
        }
    }
    Ok(out)
}

/// `n` events from `pdf` using a seeded generator.
pub fn generate_sample<P: Pdf + ?Sized>(pdf: &P, n: usize, seed: u64) -> Result<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = pdf.sample(n, &mut rng)?;
    info!("Generated {} events from '{}' (seed {seed})", data.len(), pdf.name());
    Ok(data)
}

/// Poisson-fluctuated sample of an extended model: `N ~ Poisson(ν)`.
pub fn generate_extended<P: Pdf + ?Sized>(pdf: &P, seed: u64) -> Result<Vec<f64>> {
    let expected = pdf.expected_events(&pdf.values()).ok_or_else(|| {
        FitError::InvalidModel(format!("'{}' is not an extended model", pdf.name()))
    })?;
    let mut rng = StdRng::seed_from_u64(seed);
    let poisson = Poisson::new(expected).map_err(|e| {
        FitError::InvalidModel(format!("invalid expected events {expected} for '{}': {e}", pdf.name()))
    })?;
    let n = poisson.sample(&mut rng) as usize;
    let data = pdf.sample(n, &mut rng)?;
    info!(
        "Generated {} events from '{}' (expected {expected:.1}, seed {seed})",
        data.len(),
        pdf.name()
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddPdf, Chebyshev, ChebyshevConfig, Gauss};

    #[test]
    fn accept_reject_follows_linear_shape() {
        let mut cheb = Chebyshev::linear(("x", 0.0, 1.0)).unwrap();
        cheb.parameters_mut()[0].value = 0.8;
        let xs = generate_sample(&cheb, 20_000, 3).unwrap();
        assert!(xs.iter().all(|x| (0.0..=1.0).contains(x)));
        // f ∝ 1 + 0.8 (2x - 1) has mean 1/2 + 0.8/6
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        assert!((mean - (0.5 + 0.8 / 6.0)).abs() < 0.01, "mean={mean}");
    }

    #[test]
    fn same_seed_gives_same_sample() {
        let g = Gauss::with_defaults(("x", -2.0, 2.0)).unwrap();
        assert_eq!(
            generate_sample(&g, 100, 42).unwrap(),
            generate_sample(&g, 100, 42).unwrap()
        );
    }

    #[test]
    fn unbounded_observable_without_sampler_fails() {
        let g = Gauss::with_defaults(0.0).unwrap();
        assert!(matches!(accept_reject(&g, 10, &mut StdRng::seed_from_u64(1)), Err(FitError::InvalidModel(_))));
    }

    #[test]
    fn extended_sample_size_fluctuates_around_yield() {
        let obs = ("x", -1.0, 1.0);
        let sig = Gauss::with_defaults(obs).unwrap();
        let bkg = Chebyshev::new(
            obs,
            ChebyshevConfig {
                name: Some("bkg".to_string()),
                ..ChebyshevConfig::default()
            },
        )
        .unwrap();
        let mut model: AddPdf = (sig + bkg).unwrap();
        for p in model.parameters_mut() {
            if p.name.starts_with("n_") {
                p.value = 500.0;
            }
        }
        let data = generate_extended(&model, 9).unwrap();
        // 1000 ± 5σ
        assert!((data.len() as f64 - 1000.0).abs() < 160.0, "n={}", data.len());

        let g = Gauss::with_defaults(obs).unwrap();
        assert!(generate_extended(&g, 9).is_err());
    }
}
