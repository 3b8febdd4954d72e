//! Solver construction and execution.
//!
//! L-BFGS is built with either line search and the configured tolerances;
//! Nelder-Mead starts from a simplex around the initial point. Both run
//! through `argmin`'s `Executor` and are reduced to a [`MinimizerOutcome`].

use argmin::core::{
    CostFunction, Executor, Gradient, IterState, Solver, State, TerminationReason,
    TerminationStatus,
};
use argmin::solver::linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch};
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;
use log::{debug, warn};

use crate::error::{FitError, Result};
use crate::fit::options::{FitOptions, LineSearch, Strategy};
use crate::fit::transform::{ParamLayout, Transform};

type LbfgsState = IterState<Vec<f64>, Vec<f64>, (), (), (), f64>;
type SimplexState = IterState<Vec<f64>, (), (), (), (), f64>;

/// Initial simplex edge in internal coordinates for bounded parameters.
const SIMPLEX_STEP_BOUNDED: f64 = 0.1;
/// Relative simplex edge for unbounded parameters.
const SIMPLEX_STEP_RELATIVE: f64 = 0.1;

/// Best point found by one solver run.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizerOutcome {
    /// Internal coordinates of the best point.
    pub x: Vec<f64>,
    /// Best cost (NLL per event).
    pub cost: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: u64,
    pub strategy: Strategy,
}

fn optimizer_error(e: argmin::core::Error) -> FitError {
    FitError::Optimizer(e.to_string())
}

fn is_converged(status: &TerminationStatus) -> bool {
    matches!(
        status,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
            | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
    )
}

type LbfgsMoreThuente = LBFGS<MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64>, Vec<f64>, Vec<f64>, f64>;
type LbfgsHagerZhang = LBFGS<HagerZhangLineSearch<Vec<f64>, Vec<f64>, f64>, Vec<f64>, Vec<f64>, f64>;

/// Apply the optional gradient and cost tolerances.
fn configure_lbfgs<L>(
    mut lbfgs: LBFGS<L, Vec<f64>, Vec<f64>, f64>,
    opts: &FitOptions,
) -> Result<LBFGS<L, Vec<f64>, Vec<f64>, f64>> {
    if let Some(tol) = opts.tolerances.tol_grad {
        lbfgs = lbfgs.with_tolerance_grad(tol).map_err(optimizer_error)?;
    }
    if let Some(tol) = opts.tolerances.tol_cost {
        lbfgs = lbfgs.with_tolerance_cost(tol).map_err(optimizer_error)?;
    }
    Ok(lbfgs)
}

fn build_more_thuente(opts: &FitOptions) -> Result<LbfgsMoreThuente> {
    configure_lbfgs(LBFGS::new(MoreThuenteLineSearch::new(), opts.lbfgs_mem), opts)
}

fn build_hager_zhang(opts: &FitOptions) -> Result<LbfgsHagerZhang> {
    configure_lbfgs(LBFGS::new(HagerZhangLineSearch::new(), opts.lbfgs_mem), opts)
}

fn run_lbfgs_solver<O, S>(problem: O, solver: S, x0: Vec<f64>, opts: &FitOptions) -> Result<MinimizerOutcome>
where
    S: Solver<O, LbfgsState> + Send + 'static,
{
    let mut executor = Executor::new(problem, solver).configure(|state: LbfgsState| state.param(x0));
    if let Some(max_iter) = opts.tolerances.max_iter {
        executor = executor.configure(|state: LbfgsState| state.max_iters(max_iter));
    }
    let result = executor.run().map_err(optimizer_error)?;
    let state = result.state();
    let x = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| FitError::Optimizer("L-BFGS returned no parameters".to_string()))?;
    let status = state.get_termination_status();
    Ok(MinimizerOutcome {
        x,
        cost: state.get_best_cost(),
        converged: is_converged(status),
        status: status.to_string(),
        iterations: state.get_iter(),
        strategy: Strategy::Lbfgs,
    })
}

/// L-BFGS with the configured line search.
pub fn run_lbfgs<O>(problem: O, x0: Vec<f64>, opts: &FitOptions) -> Result<MinimizerOutcome>
where
    O: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
{
    match opts.line_search {
        LineSearch::MoreThuente => run_lbfgs_solver(problem, build_more_thuente(opts)?, x0, opts),
        LineSearch::HagerZhang => run_lbfgs_solver(problem, build_hager_zhang(opts)?, x0, opts),
    }
}

/// Starting simplex: `x0` plus one vertex per coordinate.
fn initial_simplex(x0: &[f64], transforms: &[Transform]) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(x0.len() + 1);
    vertices.push(x0.to_vec());
    for (i, t) in transforms.iter().enumerate() {
        let step = if t.is_bounded() {
            SIMPLEX_STEP_BOUNDED
        } else {
            SIMPLEX_STEP_RELATIVE * x0[i].abs().max(1.0)
        };
        let mut v = x0.to_vec();
        v[i] += step;
        vertices.push(v);
    }
    vertices
}

/// Nelder-Mead from a simplex around `x0`.
pub fn run_simplex<O>(
    problem: O,
    x0: Vec<f64>,
    transforms: &[Transform],
    opts: &FitOptions,
) -> Result<MinimizerOutcome>
where
    O: CostFunction<Param = Vec<f64>, Output = f64>,
{
    let mut solver = NelderMead::new(initial_simplex(&x0, transforms));
    if let Some(tol) = opts.tolerances.tol_cost {
        solver = solver.with_sd_tolerance(tol).map_err(optimizer_error)?;
    }
    // Nelder-Mead needs more iterations than L-BFGS for the same problem.
    let max_iter = opts.tolerances.max_iter.map(|m| m.saturating_mul(10));
    let mut executor = Executor::new(problem, solver);
    if let Some(max_iter) = max_iter {
        executor = executor.configure(|state: SimplexState| state.max_iters(max_iter));
    }
    let result = executor.run().map_err(optimizer_error)?;
    let state = result.state();
    let x = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| FitError::Optimizer("Nelder-Mead returned no parameters".to_string()))?;
    let status = state.get_termination_status();
    Ok(MinimizerOutcome {
        x,
        cost: state.get_best_cost(),
        converged: is_converged(status),
        status: status.to_string(),
        iterations: state.get_iter(),
        strategy: Strategy::Simplex,
    })
}

/// Run the configured strategy. `make_problem` builds a fresh problem per run.
pub fn minimize<O, F>(make_problem: F, layout: &ParamLayout, opts: &FitOptions) -> Result<MinimizerOutcome>
where
    O: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
    F: Fn() -> O,
{
    let x0 = layout.internal_start();
    let transforms: Vec<Transform> = layout.transforms().collect();
    match opts.strategy {
        Strategy::Lbfgs => run_lbfgs(make_problem(), x0, opts),
        Strategy::Simplex => run_simplex(make_problem(), x0, &transforms, opts),
        Strategy::Auto => {
            let start = match run_lbfgs(make_problem(), x0.clone(), opts) {
                Ok(out) if out.converged => return Ok(out),
                Ok(out) => {
                    warn!(
                        "L-BFGS did not converge ({}), continuing with Nelder-Mead",
                        out.status
                    );
                    if out.cost.is_finite() { out.x } else { x0 }
                }
                Err(e) => {
                    warn!("L-BFGS failed ({e}), retrying with Nelder-Mead");
                    x0
                }
            };
            let out = run_simplex(make_problem(), start, &transforms, opts)?;
            debug!("Nelder-Mead finished: {} after {} iterations", out.status, out.iterations);
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RealVar;
    use crate::fit::options::Tolerances;
    use crate::models::{Gauss, GaussConfig};
    use argmin::core::Error;

    /// (x - 2)² + 10 (y + 1)²
    struct Bowl;

    impl CostFunction for Bowl {
        type Param = Vec<f64>;
        type Output = f64;

        fn cost(&self, p: &Vec<f64>) -> std::result::Result<f64, Error> {
            Ok((p[0] - 2.0).powi(2) + 10.0 * (p[1] + 1.0).powi(2))
        }
    }

    impl Gradient for Bowl {
        type Param = Vec<f64>;
        type Gradient = Vec<f64>;

        fn gradient(&self, p: &Vec<f64>) -> std::result::Result<Vec<f64>, Error> {
            Ok(vec![2.0 * (p[0] - 2.0), 20.0 * (p[1] + 1.0)])
        }
    }

    #[test]
    fn both_line_searches_find_the_minimum() {
        for line_search in [LineSearch::MoreThuente, LineSearch::HagerZhang] {
            let opts = FitOptions {
                line_search,
                ..FitOptions::default()
            };
            let out = run_lbfgs(Bowl, vec![0.0, 0.0], &opts).unwrap();
            assert!(out.converged, "{line_search:?}: {}", out.status);
            assert!((out.x[0] - 2.0).abs() < 1e-4);
            assert!((out.x[1] + 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn simplex_finds_the_minimum() {
        let simplex = initial_simplex(&[0.0, 5.0], &[Transform::Free, Transform::Double { lo: -1.0, hi: 1.0 }]);
        assert_eq!(simplex.len(), 3);
        assert_eq!(simplex[1], vec![0.1, 5.0]);
        assert_eq!(simplex[2], vec![0.0, 5.1]);

        let opts = FitOptions {
            strategy: Strategy::Simplex,
            tolerances: Tolerances::new(None, Some(1e-12), Some(500)).unwrap(),
            ..FitOptions::default()
        };
        let out = run_simplex(Bowl, vec![0.0, 0.0], &[Transform::Free, Transform::Free], &opts).unwrap();
        assert!(out.converged, "{}", out.status);
        assert_eq!(out.strategy, Strategy::Simplex);
        assert!((out.x[0] - 2.0).abs() < 1e-3);
        assert!((out.x[1] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn max_iters_is_not_convergence() {
        let opts = FitOptions {
            tolerances: Tolerances::new(None, None, Some(1)).unwrap(),
            ..FitOptions::default()
        };
        let out = run_lbfgs(Bowl, vec![10.0, 10.0], &opts).unwrap();
        assert!(!out.converged);
        assert_eq!(out.iterations, 1);
    }

    /// Bowl whose gradient always fails.
    struct NoGradient;

    impl CostFunction for NoGradient {
        type Param = Vec<f64>;
        type Output = f64;

        fn cost(&self, p: &Vec<f64>) -> std::result::Result<f64, Error> {
            Bowl.cost(p)
        }
    }

    impl Gradient for NoGradient {
        type Param = Vec<f64>;
        type Gradient = Vec<f64>;

        fn gradient(&self, _p: &Vec<f64>) -> std::result::Result<Vec<f64>, Error> {
            Err(Error::msg("gradient unavailable"))
        }
    }

    /// (1 - x)² + 100 (y - x²)²
    struct Rosenbrock;

    impl CostFunction for Rosenbrock {
        type Param = Vec<f64>;
        type Output = f64;

        fn cost(&self, p: &Vec<f64>) -> std::result::Result<f64, Error> {
            Ok((1.0 - p[0]).powi(2) + 100.0 * (p[1] - p[0] * p[0]).powi(2))
        }
    }

    impl Gradient for Rosenbrock {
        type Param = Vec<f64>;
        type Gradient = Vec<f64>;

        fn gradient(&self, p: &Vec<f64>) -> std::result::Result<Vec<f64>, Error> {
            let (x, y) = (p[0], p[1]);
            Ok(vec![-2.0 * (1.0 - x) - 400.0 * x * (y - x * x), 200.0 * (y - x * x)])
        }
    }

    /// Two free, unbounded parameters starting at `(a, b)`.
    fn free_layout(a: f64, b: f64) -> ParamLayout {
        let g = Gauss::new(
            ("x", -3.0, 3.0),
            GaussConfig {
                mean: RealVar::new("a", a).into(),
                sigma: RealVar::new("b", b).into(),
                ..GaussConfig::default()
            },
        )
        .unwrap();
        ParamLayout::from_pdf(&g).unwrap()
    }

    #[test]
    fn auto_falls_back_to_simplex_when_lbfgs_fails() {
        let layout = free_layout(0.0, 0.0);
        assert!(run_lbfgs(NoGradient, layout.internal_start(), &FitOptions::default()).is_err());

        let out = minimize(|| NoGradient, &layout, &FitOptions::default()).unwrap();
        assert_eq!(out.strategy, Strategy::Simplex);
        assert!(out.converged, "{}", out.status);
        assert!((out.x[0] - 2.0).abs() < 1e-3, "{:?}", out.x);
        assert!((out.x[1] + 1.0).abs() < 1e-3, "{:?}", out.x);
    }

    #[test]
    fn auto_continues_from_an_unconverged_lbfgs_point() {
        let layout = free_layout(-1.2, 1.0);
        let opts = FitOptions {
            tolerances: Tolerances::new(Some(1e-10), Some(1e-12), Some(3)).unwrap(),
            ..FitOptions::default()
        };
        let lbfgs = run_lbfgs(Rosenbrock, layout.internal_start(), &opts).unwrap();
        assert!(!lbfgs.converged);
        let start_cost = Rosenbrock.cost(&layout.internal_start()).unwrap();
        assert!(lbfgs.cost < start_cost);

        let out = minimize(|| Rosenbrock, &layout, &opts).unwrap();
        assert_eq!(out.strategy, Strategy::Simplex);
        // the simplex starts at the L-BFGS point and never gets worse
        assert!(out.cost <= lbfgs.cost, "{} > {}", out.cost, lbfgs.cost);
    }
}
