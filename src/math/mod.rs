//! Mathematical utilities: densities, Chebyshev series and numerical
//! Hessians.

pub mod chebyshev;
pub mod hessian;
pub mod normal;

pub use chebyshev::*;
pub use hessian::*;
pub use normal::*;
