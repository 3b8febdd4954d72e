//! JSON model descriptions.
//!
//! ```json
//! {
//!   "observable": ["mass", 740, 760],
//!   "unit": "GeV",
//!   "components": [
//!     {"type": "gauss", "name": "sig", "mean": [745, 755], "sigma": [0.1, 1, 2]},
//!     {"type": "chebyshev", "name": "bkg", "order": 1}
//!   ],
//!   "norms": {"bkg": {"spec": [0, 500, 1000]}}
//! }
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::{RealVar, VarSpec, create_named_var};
use crate::error::{FitError, Result};
use crate::models::{AddPdf, Chebyshev, ChebyshevConfig, Gauss, GaussConfig, Pdf, PdfCore};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub observable: VarSpec,
    #[serde(default)]
    pub unit: Option<String>,
    pub components: Vec<ComponentSpec>,
    #[serde(default)]
    pub norms: BTreeMap<String, NormSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ComponentSpec {
    #[serde(alias = "normal")]
    Gauss(GaussSpec),
    Chebyshev(ChebyshevSpec),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GaussSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub mean: Option<VarSpec>,
    #[serde(default)]
    pub sigma: Option<VarSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChebyshevSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub order: Option<usize>,
    #[serde(default)]
    pub coefficients: Vec<VarSpec>,
}

/// External yield for one component of a sum.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormSpec {
    pub spec: VarSpec,
    #[serde(default)]
    pub constant: bool,
}

impl ComponentSpec {
    fn build(self, observable: &RealVar) -> Result<Box<dyn Pdf>> {
        match self {
            ComponentSpec::Gauss(g) => {
                let defaults = GaussConfig::default();
                let cfg = GaussConfig {
                    name: g.name,
                    title: g.title,
                    mean: g.mean.unwrap_or(defaults.mean),
                    sigma: g.sigma.unwrap_or(defaults.sigma),
                };
                Ok(Box::new(Gauss::new(observable, cfg)?))
            }
            ComponentSpec::Chebyshev(c) => {
                let order = c.order.unwrap_or(c.coefficients.len().max(1));
                let cfg = ChebyshevConfig {
                    name: c.name,
                    title: c.title,
                    order,
                    coefficients: c.coefficients,
                };
                Ok(Box::new(Chebyshev::new(observable, cfg)?))
            }
        }
    }
}

impl ModelSpec {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the model: one component gives that PDF, more give an [`AddPdf`].
    pub fn build(self) -> Result<Box<dyn Pdf>> {
        let mut observable = PdfCore::add_observable(self.observable)?;
        if let Some(unit) = self.unit {
            observable.unit = unit;
        }
        let mut pdfs = self
            .components
            .into_iter()
            .map(|c| c.build(&observable))
            .collect::<Result<Vec<_>>>()?;

        match pdfs.len() {
            0 => Err(FitError::InvalidModel("model has no components".to_string())),
            1 if self.norms.is_empty() && self.name.is_none() => Ok(pdfs.remove(0)),
            1 if !self.norms.is_empty() => Err(FitError::InvalidModel(
                "norms need a model with more than one component".to_string(),
            )),
            _ => {
                let mut sum = match self.name {
                    Some(name) => AddPdf::named(name, pdfs)?,
                    None => AddPdf::new(pdfs)?,
                };
                if let Some(title) = self.title {
                    sum = sum.with_title(title);
                }
                for (pdf, norm) in self.norms {
                    let mut var = create_named_var(norm.spec, &format!("n_{pdf}"))?;
                    var.set_constant(norm.constant);
                    sum.constrain_norm(&pdf, var)?;
                }
                Ok(Box::new(sum))
            }
        }
    }
}
