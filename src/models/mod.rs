//! PDF models.
//!
//! Simple models (`Gauss`, `Chebyshev`) own their observable and parameters
//! through [`PdfCore`]. Composite models are built with `+` (see
//! [`AddPdf`]). JSON model files are parsed by [`spec`].

pub mod chebyshev;
pub mod composite;
pub mod gauss;
pub mod pdf;
pub mod spec;

pub use chebyshev::{Chebyshev, ChebyshevConfig};
pub use composite::{AddPdf, default_add_name};
pub use gauss::{Gauss, GaussConfig, Normal};
pub use pdf::{Pdf, PdfComponent, PdfCore, PdfExt};
pub use spec::ModelSpec;
