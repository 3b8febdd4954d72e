//! Chebyshev series on a bounded interval.
//!
//! The unnormalized shape is `f(x) = 1 + Σ_{k=1..m} a_k T_k(x')` where
//! `x' = (2x - (lo + hi)) / (hi - lo)` maps `[lo, hi]` onto `[-1, 1]`.

/// Map `x` from `[lo, hi]` to `[-1, 1]`, clamped.
#[inline]
pub fn to_unit_interval(x: f64, lo: f64, hi: f64) -> f64 {
    ((2.0 * x - (lo + hi)) / (hi - lo)).clamp(-1.0, 1.0)
}

/// `1 + Σ a_k T_k(xp)` with `coefficients[k-1] = a_k`.
pub fn chebyshev_shape(xp: f64, coefficients: &[f64]) -> f64 {
    let mut sum = 1.0;
    // T_{k+1} = 2x T_k - T_{k-1}
    let mut t_prev = 1.0;
    let mut t_cur = xp;
    for (i, a) in coefficients.iter().enumerate() {
        if i > 0 {
            let t_next = 2.0 * xp * t_cur - t_prev;
            t_prev = t_cur;
            t_cur = t_next;
        }
        sum += a * t_cur;
    }
    sum
}

/// `∫_lo^hi f(x) dx = w (1 + Σ_{k even} a_k / (1 - k²))` with `w = hi - lo`.
pub fn chebyshev_integral(coefficients: &[f64], lo: f64, hi: f64) -> f64 {
    let w = hi - lo;
    let even: f64 = coefficients
        .iter()
        .enumerate()
        .map(|(i, a)| (i + 1, a))
        .filter(|(k, _)| k % 2 == 0)
        .map(|(k, a)| {
            let k = k as f64;
            a / (1.0 - k * k)
        })
        .sum();
    w * (1.0 + even)
}

/// Normalized density on `[lo, hi]`.
///
/// Points outside the interval, non-positive shape values and non-positive
/// integrals all evaluate to `0`.
pub fn chebyshev_density(x: f64, coefficients: &[f64], lo: f64, hi: f64) -> f64 {
    if x < lo || x > hi {
        return 0.0;
    }
    let f = chebyshev_shape(to_unit_interval(x, lo, hi), coefficients);
    if !(f > 0.0) || !f.is_finite() {
        return 0.0;
    }
    let norm = chebyshev_integral(coefficients, lo, hi);
    if !(norm > 0.0) || !norm.is_finite() {
        return 0.0;
    }
    f / norm
}
