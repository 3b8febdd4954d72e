//! Normal and truncated-normal densities.

use statrs::function::erf::erfc;

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal CDF.
///
/// Uses `erfc` so that the lower tail keeps its relative precision.
pub fn std_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Normal density, `0` for `sigma <= 0`.
pub fn normal_pdf(x: f64, mean: f64, sigma: f64) -> f64 {
    if !(sigma > 0.0) || !sigma.is_finite() {
        return 0.0;
    }
    let z = (x - mean) / sigma;
    INV_SQRT_2PI / sigma * (-0.5 * z * z).exp()
}

/// Normal density normalized on `[lo, hi]` (plain normal when `bounds` is `None`).
///
/// Outside the bounds, or when the interval carries no probability mass,
/// the density is `0`.
pub fn truncated_normal_pdf(x: f64, mean: f64, sigma: f64, bounds: Option<(f64, f64)>) -> f64 {
    let Some((lo, hi)) = bounds else {
        return normal_pdf(x, mean, sigma);
    };
    if x < lo || x > hi {
        return 0.0;
    }
    let raw = normal_pdf(x, mean, sigma);
    if raw == 0.0 {
        return 0.0;
    }
    let mass = std_normal_cdf((hi - mean) / sigma) - std_normal_cdf((lo - mean) / sigma);
    if !(mass > 0.0) {
        return 0.0;
    }
    raw / mass
}
