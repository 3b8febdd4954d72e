//! Numerical Hessian and covariance estimation.
//!
//! The Hessian is taken by finite differences with per-parameter steps.
//! A first diagonal pass with a small relative step estimates the curvature
//! `H_ii`; the final step is then `0.1 / sqrt(H_ii)`, i.e. a tenth of the
//! expected one-sigma width for a likelihood. Steps never cross the given
//! limits: a coordinate without room on one side is differenced one-sided,
//! away from the limit.

use nalgebra::DMatrix;

use crate::error::{FitError, Result};

/// Relative step used for the first curvature estimate.
const PILOT_STEP: f64 = 1e-4;
/// Fraction of the estimated one-sigma width used as final step.
const SIGMA_FRACTION: f64 = 0.1;
/// Eigenvalues below this fraction of the largest are dropped when the
/// Hessian has to be pseudo-inverted.
const EIGEN_CUTOFF: f64 = 1e-12;

fn pilot_step(x: f64) -> f64 {
    PILOT_STEP * x.abs().max(1.0)
}

/// Step along one coordinate: central (`dir == 0`) or one-sided towards `dir`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Stencil {
    h: f64,
    dir: f64,
}

/// Pick a stencil for step `h` at `x` that stays inside `[lo, hi]`.
fn stencil(h: f64, x: f64, (lo, hi): (f64, f64)) -> Result<Stencil> {
    let below = x - lo;
    let above = hi - x;
    if below >= h && above >= h {
        return Ok(Stencil { h, dir: 0.0 });
    }
    // one-sided stencils reach x ± 2h
    let (room, dir) = if above >= below { (above, 1.0) } else { (below, -1.0) };
    if !(room > 0.0) {
        return Err(FitError::Hesse(format!("no room between limits [{lo}, {hi}]")));
    }
    Ok(Stencil {
        h: h.min(0.5 * room),
        dir,
    })
}

fn eval_at<F: Fn(&[f64]) -> f64>(f: &F, x: &mut [f64], shifts: &[(usize, f64)]) -> f64 {
    let orig: Vec<f64> = shifts.iter().map(|&(i, _)| x[i]).collect();
    for &(i, d) in shifts {
        x[i] += d;
    }
    let v = f(x);
    for (&(i, _), o) in shifts.iter().zip(orig) {
        x[i] = o;
    }
    v
}

/// `d²f/dx_i²`; two evaluations either way.
fn second_diff<F: Fn(&[f64]) -> f64>(f: &F, x: &mut [f64], i: usize, s: Stencil, f0: f64) -> f64 {
    let h = s.h;
    if s.dir == 0.0 {
        let fp = eval_at(f, x, &[(i, h)]);
        let fm = eval_at(f, x, &[(i, -h)]);
        (fp - 2.0 * f0 + fm) / (h * h)
    } else {
        let f1 = eval_at(f, x, &[(i, s.dir * h)]);
        let f2 = eval_at(f, x, &[(i, 2.0 * s.dir * h)]);
        (f2 - 2.0 * f1 + f0) / (h * h)
    }
}

/// `d²f/dx_i dx_j` and the number of evaluations used.
fn mixed_diff<F: Fn(&[f64]) -> f64>(
    f: &F,
    x: &mut [f64],
    (i, si): (usize, Stencil),
    (j, sj): (usize, Stencil),
    f0: f64,
) -> (f64, usize) {
    let (hi, hj) = (si.h, sj.h);
    if si.dir == 0.0 && sj.dir == 0.0 {
        let fpp = eval_at(f, x, &[(i, hi), (j, hj)]);
        let fpm = eval_at(f, x, &[(i, hi), (j, -hj)]);
        let fmp = eval_at(f, x, &[(i, -hi), (j, hj)]);
        let fmm = eval_at(f, x, &[(i, -hi), (j, -hj)]);
        return ((fpp - fpm - fmp + fmm) / (4.0 * hi * hj), 4);
    }
    // Central coordinates have room on both sides, so step them forward.
    let di = if si.dir == 0.0 { hi } else { si.dir * hi };
    let dj = if sj.dir == 0.0 { hj } else { sj.dir * hj };
    let fij = eval_at(f, x, &[(i, di), (j, dj)]);
    let fi = eval_at(f, x, &[(i, di)]);
    let fj = eval_at(f, x, &[(j, dj)]);
    ((fij - fi - fj + f0) / (di * dj), 3)
}

/// Hessian of `f` at `x`.
///
/// `limits[i]` are the (possibly infinite) limits of coordinate `i`; `f` is
/// never evaluated outside them.
/// Returns the matrix and the number of function evaluations.
pub fn hessian<F: Fn(&[f64]) -> f64>(
    f: F,
    x: &[f64],
    limits: &[(f64, f64)],
) -> Result<(DMatrix<f64>, usize)> {
    let n = x.len();
    if limits.len() != n {
        return Err(FitError::Hesse(format!(
            "expected {n} limits, got {}",
            limits.len()
        )));
    }
    let mut buf = x.to_vec();
    let f0 = f(&buf);
    if !f0.is_finite() {
        return Err(FitError::Hesse("function is not finite at the minimum".to_string()));
    }
    let mut evals = 1;

    let mut stencils = Vec::with_capacity(n);
    for i in 0..n {
        let pilot = stencil(pilot_step(x[i]), x[i], limits[i])?;
        let curvature = second_diff(&f, &mut buf, i, pilot, f0);
        evals += 2;
        let h = if curvature.is_finite() && curvature > 0.0 {
            SIGMA_FRACTION / curvature.sqrt()
        } else {
            pilot.h
        };
        stencils.push(stencil(h.max(1e-8 * x[i].abs().max(1.0)), x[i], limits[i])?);
    }

    let mut hess = DMatrix::zeros(n, n);
    for i in 0..n {
        hess[(i, i)] = second_diff(&f, &mut buf, i, stencils[i], f0);
        evals += 2;
        for j in (i + 1)..n {
            let (val, used) = mixed_diff(&f, &mut buf, (i, stencils[i]), (j, stencils[j]), f0);
            evals += used;
            hess[(i, j)] = val;
            hess[(j, i)] = val;
        }
    }

    if hess.iter().any(|v| !v.is_finite()) {
        return Err(FitError::Hesse("non-finite second derivative".to_string()));
    }
    Ok((hess, evals))
}

/// Inverse of a Hessian as covariance matrix.
///
/// Returns the covariance and whether the Hessian was positive definite.
/// Otherwise the covariance is built from the positive eigenvalues only, so
/// its diagonal is never negative.
pub fn covariance_from_hessian(hess: &DMatrix<f64>) -> Result<(DMatrix<f64>, bool)> {
    let sym = (hess + hess.transpose()) * 0.5;
    if let Some(chol) = sym.clone().cholesky() {
        let cov = chol.inverse();
        if cov.iter().all(|v| v.is_finite()) {
            return Ok((cov, true));
        }
    }
    let n = sym.nrows();
    let eig = sym.symmetric_eigen();
    let largest = eig.eigenvalues.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if !(largest > 0.0) || !largest.is_finite() {
        return Err(FitError::Hesse("Hessian has no usable curvature".to_string()));
    }
    let mut cov = DMatrix::zeros(n, n);
    for (k, &lambda) in eig.eigenvalues.iter().enumerate() {
        if lambda > EIGEN_CUTOFF * largest {
            let v = eig.eigenvectors.column(k);
            cov += (v * v.transpose()) / lambda;
        }
    }
    Ok((cov, false))
}

/// One-sigma errors from a covariance diagonal; `None` where the variance is
/// not a finite non-negative number.
pub fn errors_from_covariance(cov: &DMatrix<f64>) -> Vec<Option<f64>> {
    (0..cov.nrows())
        .map(|i| {
            let var = cov[(i, i)];
            (var.is_finite() && var >= 0.0).then(|| var.sqrt())
        })
        .collect()
}

/// Correlation matrix from a covariance matrix (zero rows for zero variance).
pub fn correlation(cov: &DMatrix<f64>) -> DMatrix<f64> {
    let n = cov.nrows();
    DMatrix::from_fn(n, n, |i, j| {
        let denom = (cov[(i, i)] * cov[(j, j)]).sqrt();
        if denom > 0.0 && denom.is_finite() {
            cov[(i, j)] / denom
        } else {
            0.0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: (f64, f64) = (f64::NEG_INFINITY, f64::INFINITY);

    #[test]
    fn recovers_quadratic_covariance() {
        // NLL of a correlated 2D gaussian: 0.5 * x^T C^-1 x
        let c = DMatrix::from_row_slice(2, 2, &[4.0, 0.6, 0.6, 0.25]);
        let cinv = c.clone().try_inverse().unwrap();
        let f = |p: &[f64]| {
            let dx = [p[0] - 1.0, p[1] + 2.0];
            0.5 * (0..2)
                .flat_map(|i| (0..2).map(move |j| (i, j)))
                .map(|(i, j)| dx[i] * cinv[(i, j)] * dx[j])
                .sum::<f64>()
        };
        let (hess, evals) = hessian(f, &[1.0, -2.0], &[OPEN, OPEN]).unwrap();
        assert_eq!(evals, 1 + 4 + 4 + 4);
        let (cov, pos_def) = covariance_from_hessian(&hess).unwrap();
        assert!(pos_def);
        for i in 0..2 {
            for j in 0..2 {
                assert!((cov[(i, j)] - c[(i, j)]).abs() < 1e-6, "cov[{i},{j}]={}", cov[(i, j)]);
            }
        }
        let corr = correlation(&cov);
        assert!((corr[(0, 1)] - 0.6).abs() < 1e-6);
        assert!((corr[(0, 0)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn steps_stay_inside_limits() {
        // undefined below the lower limit
        let f = |p: &[f64]| {
            if p[0] <= 0.0 {
                f64::NAN
            } else {
                (p[0] - 0.05).powi(2) / (2.0 * 0.01 * 0.01)
            }
        };
        let (hess, _) = hessian(f, &[0.05], &[(0.0, 1.0)]).unwrap();
        assert!((hess[(0, 0)] - 1.0e4).abs() < 1e-3);
    }

    #[test]
    fn indefinite_hessian_keeps_positive_directions_only() {
        let hess = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, -1.0]);
        let (cov, pos_def) = covariance_from_hessian(&hess).unwrap();
        assert!(!pos_def);
        assert!((cov[(0, 0)] - 0.25).abs() < 1e-12);
        assert!(cov[(1, 1)].abs() < 1e-12);
        let errors = errors_from_covariance(&cov);
        assert!(errors[0].is_some_and(|e| (e - 0.5).abs() < 1e-12));
        assert!(errors[1].is_some_and(|e| e < 1e-6));

        let bad = DMatrix::from_row_slice(1, 1, &[f64::NAN]);
        assert_eq!(errors_from_covariance(&bad), vec![None]);
    }

    #[test]
    fn minimum_on_a_limit_is_differenced_one_sided() {
        // undefined below zero, minimum at the limit, H = [[1e4, 50], [50, 2]]
        let f = |p: &[f64]| {
            if p[0] < 0.0 {
                f64::NAN
            } else {
                3.0 * p[0] + 5000.0 * p[0] * p[0] + 50.0 * p[0] * p[1] + p[1] * p[1]
            }
        };
        let (hess, evals) = hessian(f, &[0.0, 0.0], &[(0.0, 1e8), OPEN]).unwrap();
        assert_eq!(evals, 1 + 4 + 4 + 3);
        assert!((hess[(0, 0)] - 1.0e4).abs() < 1e-3, "{hess}");
        assert!((hess[(1, 1)] - 2.0).abs() < 1e-6, "{hess}");
        assert!((hess[(0, 1)] - 50.0).abs() < 1e-6, "{hess}");
    }

    #[test]
    fn degenerate_limits_are_an_error() {
        let f = |p: &[f64]| p[0] * p[0];
        assert!(matches!(hessian(f, &[1.0], &[(1.0, 1.0)]), Err(FitError::Hesse(_))));
    }
}
