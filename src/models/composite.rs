//! Extended sums of PDFs.
//!
//! `sig + bkg` builds an [`AddPdf`] with one yield parameter `n_<pdf>` per
//! component. The model density is `Σ n_k f_k(x) / Σ n_k` and the expected
//! number of events is `Σ n_k`.

use std::ops::Add;

use log::debug;
use rand::RngCore;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;

use crate::domain::RealVar;
use crate::error::{FitError, Result};
use crate::models::{Chebyshev, Gauss, Pdf, PdfComponent};

/// Initial value of a component yield.
pub const DEFAULT_NORM: f64 = 10.0;
/// Upper limit of a component yield.
pub const MAX_NORM: f64 = 1e8;

#[derive(Debug, Clone)]
struct AddComponent {
    norm: RealVar,
    pdf: Box<dyn Pdf>,
}

/// Sum of component PDFs with free yields.
#[derive(Debug, Clone)]
pub struct AddPdf {
    name: String,
    title: Option<String>,
    auto_name: bool,
    observable: RealVar,
    components: Vec<AddComponent>,
}

/// `<a>_plus_<b>_plus_...`, or `"AddPdf"` without components.
pub fn default_add_name<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let joined = names.into_iter().collect::<Vec<_>>().join("_plus_");
    if joined.is_empty() { "AddPdf".to_string() } else { joined }
}

impl AddPdf {
    /// Composite of `pdfs`; the first one fixes the observable.
    pub fn new(pdfs: Vec<Box<dyn Pdf>>) -> Result<Self> {
        let mut iter = pdfs.into_iter();
        let Some(first) = iter.next() else {
            return Err(FitError::InvalidModel("AddPdf needs at least one component".to_string()));
        };
        let mut out = Self {
            name: default_add_name([first.name()]),
            title: None,
            auto_name: true,
            observable: first.observable().clone(),
            components: Vec::new(),
        };
        out.push(first)?;
        for pdf in iter {
            out.push(pdf)?;
        }
        Ok(out)
    }

    /// Like [`AddPdf::new`] with a fixed name.
    pub fn named(name: impl Into<String>, pdfs: Vec<Box<dyn Pdf>>) -> Result<Self> {
        let mut out = Self::new(pdfs)?;
        out.name = name.into();
        out.auto_name = false;
        Ok(out)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append a component.
    pub fn add_pdf<P: Pdf + 'static>(&mut self, pdf: P) -> Result<()> {
        self.push(Box::new(pdf))
    }

    /// Append a boxed component.
    pub fn push(&mut self, pdf: Box<dyn Pdf>) -> Result<()> {
        if self.components.iter().any(|c| c.pdf.name() == pdf.name()) {
            return Err(FitError::DuplicatePdf(pdf.name().to_string()));
        }
        if pdf.observable().name != self.observable.name {
            return Err(FitError::InvalidModel(format!(
                "observable '{}' of '{}' does not match '{}'",
                pdf.observable().name,
                pdf.name(),
                self.observable.name
            )));
        }
        let norm = RealVar::new(format!("n_{}", pdf.name()), DEFAULT_NORM).with_limits(0.0, MAX_NORM);
        debug!("Adding '{}' to '{}' with yield '{}'", pdf.name(), self.name, norm.name);
        self.components.push(AddComponent { norm, pdf });
        if self.auto_name {
            self.name = default_add_name(self.components.iter().map(|c| c.pdf.name()));
        }
        Ok(())
    }

    /// Replace the yield of component `pdf_name` by `norm`.
    pub fn constrain_norm(&mut self, pdf_name: &str, norm: RealVar) -> Result<()> {
        let comp = self
            .components
            .iter_mut()
            .find(|c| c.pdf.name() == pdf_name)
            .ok_or_else(|| FitError::UnknownPdf(pdf_name.to_string()))?;
        comp.norm = norm;
        Ok(())
    }

    /// [`AddPdf::constrain_norm`] for the component named like `pdf`.
    pub fn constrain_norm_of<P: Pdf + ?Sized>(&mut self, pdf: &P, norm: RealVar) -> Result<()> {
        self.constrain_norm(pdf.name(), norm)
    }

    pub fn norm(&self, pdf_name: &str) -> Option<&RealVar> {
        self.components
            .iter()
            .find(|c| c.pdf.name() == pdf_name)
            .map(|c| &c.norm)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Yields and per-component parameter slices of `values`.
    fn split<'v>(&self, values: &'v [f64]) -> Vec<(f64, &'v [f64])> {
        let mut out = Vec::with_capacity(self.components.len());
        let mut offset = 0;
        for comp in &self.components {
            let n = comp.pdf.n_params();
            out.push((values[offset], &values[offset + 1..offset + 1 + n]));
            offset += 1 + n;
        }
        out
    }

    fn fractions(&self) -> Vec<f64> {
        let norms: Vec<f64> = self.components.iter().map(|c| c.norm.value).collect();
        let total: f64 = norms.iter().sum();
        norms
            .into_iter()
            .map(|n| if total > 0.0 { n / total } else { 0.0 })
            .collect()
    }
}

impl Pdf for AddPdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    fn observable(&self) -> &RealVar {
        &self.observable
    }

    fn parameters(&self) -> Vec<&RealVar> {
        let mut out = Vec::new();
        for comp in &self.components {
            out.push(&comp.norm);
            out.extend(comp.pdf.parameters());
        }
        out
    }

    fn parameters_mut(&mut self) -> Vec<&mut RealVar> {
        let mut out = Vec::new();
        for comp in &mut self.components {
            out.push(&mut comp.norm);
            out.extend(comp.pdf.parameters_mut());
        }
        out
    }

    fn n_params(&self) -> usize {
        self.components.iter().map(|c| 1 + c.pdf.n_params()).sum()
    }

    fn density(&self, x: f64, values: &[f64]) -> f64 {
        let parts = self.split(values);
        let total: f64 = parts.iter().map(|(n, _)| n).sum();
        if !(total > 0.0) {
            return 0.0;
        }
        let sum: f64 = self
            .components
            .iter()
            .zip(&parts)
            .map(|(c, (n, v))| n * c.pdf.density(x, v))
            .sum();
        sum / total
    }

    fn densities(&self, xs: &[f64], values: &[f64], out: &mut [f64]) {
        out.iter_mut().for_each(|o| *o = 0.0);
        let parts = self.split(values);
        let total: f64 = parts.iter().map(|(n, _)| n).sum();
        if !(total > 0.0) {
            return;
        }
        let mut buf = vec![0.0; xs.len()];
        for (comp, (n, v)) in self.components.iter().zip(&parts) {
            comp.pdf.densities(xs, v, &mut buf);
            let w = n / total;
            for (o, d) in out.iter_mut().zip(&buf) {
                *o += w * d;
            }
        }
    }

    fn expected_events(&self, values: &[f64]) -> Option<f64> {
        Some(self.split(values).iter().map(|(n, _)| n).sum())
    }

    fn components(&self) -> Vec<PdfComponent<'_>> {
        self.components
            .iter()
            .zip(self.fractions())
            .map(|(c, fraction)| PdfComponent {
                title: c.pdf.title(),
                fraction,
                pdf: c.pdf.as_ref(),
            })
            .collect()
    }

    /// Each event picks its component with probability `n_k / Σ n`.
    fn sample(&self, n: usize, rng: &mut dyn RngCore) -> Result<Vec<f64>> {
        let weights: Vec<f64> = self.components.iter().map(|c| c.norm.value.max(0.0)).collect();
        let picker = WeightedIndex::new(&weights)
            .map_err(|e| FitError::InvalidModel(format!("cannot sample '{}': {e}", self.name)))?;
        let mut counts = vec![0usize; self.components.len()];
        for _ in 0..n {
            counts[picker.sample(rng)] += 1;
        }
        let mut out = Vec::with_capacity(n);
        for (comp, count) in self.components.iter().zip(counts) {
            if count > 0 {
                out.extend(comp.pdf.sample(count, rng)?);
            }
        }
        out.shuffle(rng);
        Ok(out)
    }

    fn clone_box(&self) -> Box<dyn Pdf> {
        Box::new(self.clone())
    }
}

macro_rules! impl_add_for_pdf {
    ($($ty:ty),*) => {$(
        impl<R: Pdf + 'static> Add<R> for $ty {
            type Output = Result<AddPdf>;

            fn add(self, rhs: R) -> Result<AddPdf> {
                AddPdf::new(vec![Box::new(self), Box::new(rhs)])
            }
        }
    )*};
}

impl_add_for_pdf!(Gauss, Chebyshev);

impl<R: Pdf + 'static> Add<R> for AddPdf {
    type Output = Result<AddPdf>;

    fn add(mut self, rhs: R) -> Result<AddPdf> {
        self.add_pdf(rhs)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChebyshevConfig, GaussConfig};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn mass_model() -> AddPdf {
        let obs = ("mass", 740.0, 760.0);
        let sig = Gauss::new(
            obs,
            GaussConfig {
                name: Some("sig".to_string()),
                mean: (745.0, 755.0).into(),
                sigma: (0.1, 1.0, 2.0).into(),
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
    }

    #[test]
    fn sum_names_and_orders_parameters() {
        let model = mass_model();
        assert_eq!(model.name(), "sig_plus_bkg");
        let names: Vec<&str> = model.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["n_sig", "sig_mean", "sig_sigma", "n_bkg", "bkg_a1"]
        );
        assert_eq!(model.n_params(), 5);
        let n_sig = model.norm("sig").unwrap();
        assert_eq!(n_sig.value, DEFAULT_NORM);
        assert_eq!(n_sig.bounds(), Some((0.0, MAX_NORM)));
    }

    #[test]
    fn appending_keeps_auto_name_in_sync() {
        let model = mass_model();
        let extra = Gauss::new(
            ("mass", 740.0, 760.0),
            GaussConfig {
                name: Some("peak2".to_string()),
                ..GaussConfig::default()
            },
        )
        .unwrap();
        let model = (model + extra).unwrap();
        assert_eq!(model.name(), "sig_plus_bkg_plus_peak2");
        assert_eq!(model.len(), 3);
    }

    #[test]
    fn duplicate_and_mismatched_components_are_rejected() {
        let a = Gauss::with_defaults(("x", -5.0, 5.0)).unwrap();
        let b = Gauss::with_defaults(("x", -5.0, 5.0)).unwrap();
        let err = (a + b).unwrap_err();
        assert_eq!(err.to_string(), "PDF with name gauss already exists");

        let a = Gauss::with_defaults(("x", -5.0, 5.0)).unwrap();
        let other = Chebyshev::linear(("y", 0.0, 1.0)).unwrap();
        assert!(matches!(a + other, Err(FitError::InvalidModel(_))));

        assert!(AddPdf::new(Vec::new()).is_err());
        assert_eq!(default_add_name(std::iter::empty()), "AddPdf");
    }

    #[test]
    fn density_is_yield_weighted() {
        let model = mass_model();
        let values = [30.0, 750.0, 1.0, 10.0, 0.0];
        let x = 750.5;
        let parts = model.components();
        let sig = parts[0].pdf.density(x, &values[1..3]);
        let bkg = parts[1].pdf.density(x, &values[4..5]);
        let want = (30.0 * sig + 10.0 * bkg) / 40.0;
        assert!((model.density(x, &values) - want).abs() < 1e-14);
        assert_eq!(model.expected_events(&values), Some(40.0));

        let xs = [741.0, x, 759.0];
        let mut out = [0.0; 3];
        model.densities(&xs, &values, &mut out);
        assert!((out[1] - want).abs() < 1e-14);
    }

    #[test]
    fn constrain_norm_replaces_yield() {
        let mut model = mass_model();
        model
            .constrain_norm("bkg", RealVar::constant("n_bkg_fixed", 500.0))
            .unwrap();
        let norm = model.norm("bkg").unwrap();
        assert!(norm.is_constant);
        assert_eq!(norm.value, 500.0);
        assert!(matches!(
            model.constrain_norm("nope", RealVar::new("n", 1.0)),
            Err(FitError::UnknownPdf(_))
        ));
    }

    #[test]
    fn constrain_norm_accepts_a_pdf() {
        let mut model = mass_model();
        let sig = Gauss::new(
            ("mass", 740.0, 760.0),
            GaussConfig {
                name: Some("sig".to_string()),
                ..GaussConfig::default()
            },
        )
        .unwrap();
        model.constrain_norm_of(&sig, RealVar::new("n_sig", 250.0).with_limits(0.0, 1000.0)).unwrap();
        assert_eq!(model.norm("sig").map(|n| n.value), Some(250.0));

        let other = Gauss::with_defaults(("mass", 740.0, 760.0)).unwrap();
        assert!(matches!(
            model.constrain_norm_of(&other, RealVar::new("n", 1.0)),
            Err(FitError::UnknownPdf(name)) if name == "gauss"
        ));
    }

    #[test]
    fn components_report_fractions() {
        let mut model = mass_model();
        for p in model.parameters_mut() {
            if p.name == "n_sig" {
                p.value = 30.0;
            }
        }
        let parts = model.components();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].title, "sig");
        assert!((parts[0].fraction - 0.75).abs() < 1e-15);
        assert!((parts[1].fraction - 0.25).abs() < 1e-15);
    }

    #[test]
    fn sampling_follows_fractions() {
        let mut model = mass_model();
        for p in model.parameters_mut() {
            match p.name.as_str() {
                "n_sig" => p.value = 900.0,
                "n_bkg" => p.value = 100.0,
                _ => {}
            }
        }
        let mut rng = StdRng::seed_from_u64(11);
        let xs = model.sample(4_000, &mut rng).unwrap();
        assert_eq!(xs.len(), 4_000);
        let near_peak = xs.iter().filter(|x| (747.0..=753.0).contains(*x)).count() as f64;
        // signal (≈100% within ±3σ) plus 30% of the flat background
        let want = 4_000.0 * (0.9 + 0.1 * 0.3);
        assert!((near_peak - want).abs() < 0.05 * 4_000.0, "near_peak={near_peak}");
    }
}
