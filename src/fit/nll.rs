//! Unbinned negative log-likelihood.

use rayon::prelude::*;

use crate::models::Pdf;

/// Densities below this are treated as this value, so `ln` stays finite.
pub const DENSITY_FLOOR: f64 = 1e-300;
/// Events per batch handed to [`Pdf::densities`].
const CHUNK: usize = 1_024;
/// From this many events on, batches are evaluated in parallel.
const PARALLEL_THRESHOLD: usize = 4_096;

/// `-Σ ln f(x_i)`, plus `ν - N ln ν` for extended models.
#[derive(Debug)]
pub struct Nll<'a, P: Pdf + ?Sized> {
    pdf: &'a P,
    data: &'a [f64],
    extended: bool,
}

impl<'a, P: Pdf + ?Sized> Nll<'a, P> {
    pub fn new(pdf: &'a P, data: &'a [f64]) -> Self {
        let extended = pdf.expected_events(&pdf.values()).is_some();
        Self { pdf, data, extended }
    }

    pub fn n_events(&self) -> usize {
        self.data.len()
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    fn chunk_sum(&self, chunk: &[f64], values: &[f64]) -> f64 {
        let mut dens = vec![0.0; chunk.len()];
        self.pdf.densities(chunk, values, &mut dens);
        dens.iter().map(|d| d.max(DENSITY_FLOOR).ln()).sum()
    }

    /// Full negative log-likelihood at `values`.
    pub fn value(&self, values: &[f64]) -> f64 {
        let log_sum: f64 = if self.data.len() >= PARALLEL_THRESHOLD {
            self.data
                .par_chunks(CHUNK)
                .map(|chunk| self.chunk_sum(chunk, values))
                .sum()
        } else {
            self.data
                .chunks(CHUNK)
                .map(|chunk| self.chunk_sum(chunk, values))
                .sum()
        };
        let mut nll = -log_sum;
        if self.extended {
            let nu = self
                .pdf
                .expected_events(values)
                .unwrap_or(0.0)
                .max(DENSITY_FLOOR);
            nll += nu - self.data.len() as f64 * nu.ln();
        }
        nll
    }

    /// NLL per event; this is what the minimizer sees.
    pub fn mean_value(&self, values: &[f64]) -> f64 {
        self.value(values) / self.data.len().max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::truncated_normal_pdf;
    use crate::models::{AddPdf, Chebyshev, Gauss};

    #[test]
    fn matches_direct_sum() {
        let g = Gauss::with_defaults(("x", -2.0, 2.0)).unwrap();
        let data: Vec<f64> = (0..50).map(|i| -1.9 + 0.076 * i as f64).collect();
        let nll = Nll::new(&g, &data);
        assert!(!nll.is_extended());
        let values = [0.1, 0.6];
        let want: f64 = -data
            .iter()
            .map(|x| truncated_normal_pdf(*x, 0.1, 0.6, Some((-2.0, 2.0))).ln())
            .sum::<f64>();
        assert!((nll.value(&values) - want).abs() < 1e-9);
        assert!((nll.mean_value(&values) - want / 50.0).abs() < 1e-11);
    }

    #[test]
    fn zero_density_is_floored() {
        let g = Gauss::with_defaults(("x", -2.0, 2.0)).unwrap();
        let data = [0.0, 1.0];
        let nll = Nll::new(&g, &data);
        let v = nll.value(&[0.0, 0.0]);
        assert!(v.is_finite());
        assert!((v - 2.0 * -DENSITY_FLOOR.ln()).abs() < 1e-6);
    }

    #[test]
    fn extended_term_is_added_and_parallel_path_agrees() {
        let obs = ("x", 0.0, 1.0);
        let model: AddPdf = (Gauss::with_defaults(obs).unwrap() + Chebyshev::linear(obs).unwrap()).unwrap();
        let data: Vec<f64> = (0..10_000).map(|i| (i as f64 + 0.5) / 10_000.0).collect();
        let nll = Nll::new(&model, &data);
        assert!(nll.is_extended());
        let values = [6_000.0, 0.5, 0.2, 4_000.0, 0.1];

        let mut dens = vec![0.0; data.len()];
        model.densities(&data, &values, &mut dens);
        let nu: f64 = 10_000.0;
        let want = -dens.iter().map(|d| d.ln()).sum::<f64>() + nu - 10_000.0 * nu.ln();
        assert!((nll.value(&values) - want).abs() < 1e-6 * want.abs());
    }
}
