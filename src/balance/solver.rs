use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

use super::qp::{self, ConstraintKind, LinearConstraint, QpSettings, QuadraticProgram};
use super::{
    BalanceError, BalanceResult, BalanceSolver, GlobalTestSettings, Reconciliation, SolverSettings,
};
use crate::domain::{Bounds, Network};

/// Reconciliation through the in-process Goldfarb–Idnani QP solver
#[derive(Debug, Clone, Default)]
pub struct GoldfarbIdnaniSolver {
    settings: SolverSettings,
    tests: GlobalTestSettings,
}

impl GoldfarbIdnaniSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            settings,
            tests: GlobalTestSettings::default(),
        }
    }

    pub fn with_test_settings(mut self, tests: GlobalTestSettings) -> Self {
        self.tests = tests;
        self
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Bounded weighted-least-squares program for `network`
    ///
    /// The quadratic term is `diag(measurability / tolerance²)`, so unmeasured
    /// flows carry no penalty. Unmeasured entries get a small multiple of the
    /// largest weight (pulling them towards `x0`) so the term stays positive
    /// definite; measured entries keep their exact weight.
    pub fn formulate(&self, network: &Network, bounds: &Bounds) -> QuadraticProgram {
        let n = network.flow_count();
        let weights: Vec<f64> = (0..n)
            .map(|i| network.measurability[i] / network.tolerance[i].powi(2))
            .collect();
        let max_weight = weights.iter().cloned().fold(0.0_f64, f64::max);
        let reg = self.settings.regularization * if max_weight > 0.0 { max_weight } else { 1.0 };
        let diagonal: Vec<f64> = weights
            .iter()
            .map(|&w| if w == 0.0 { reg } else { w })
            .collect();

        let hessian = DMatrix::from_fn(n, n, |r, c| if r == c { diagonal[r] } else { 0.0 });
        let linear = DVector::from_fn(n, |i, _| -diagonal[i] * network.x0[i]);

        let mut constraints = Vec::with_capacity(2 * n + network.node_count());
        let threshold = self.settings.coefficient_threshold;
        for row in 0..network.node_count() {
            let (indices, coefficients): (Vec<usize>, Vec<f64>) = (0..n)
                .filter_map(|k| {
                    let coef = network.a[(row, k)];
                    (coef.abs() > threshold).then_some((k, coef))
                })
                .unzip();
            constraints.push(LinearConstraint::new(
                indices,
                coefficients,
                ConstraintKind::EqualTo,
                network.b[row],
            ));
        }
        for i in 0..n {
            if bounds.lower[i].is_finite() {
                constraints.push(LinearConstraint::bound(
                    i,
                    ConstraintKind::GreaterThanOrEqualTo,
                    bounds.lower[i],
                ));
            }
            if bounds.upper[i].is_finite() {
                constraints.push(LinearConstraint::bound(
                    i,
                    ConstraintKind::LesserThanOrEqualTo,
                    bounds.upper[i],
                ));
            }
        }

        QuadraticProgram {
            hessian,
            linear,
            constraints,
        }
    }
}

/// Argument checks performed before any arithmetic
pub fn validate_problem(network: &Network, bounds: &Bounds) -> BalanceResult<()> {
    network.validate()?;
    let n = network.flow_count();
    if bounds.lower.len() != n {
        return Err(BalanceError::length_mismatch("lower", n, bounds.lower.len()));
    }
    if bounds.upper.len() != n {
        return Err(BalanceError::length_mismatch("upper", n, bounds.upper.len()));
    }
    if let Some(i) = network.x0.iter().position(|v| !v.is_finite()) {
        return Err(BalanceError::validation("x0", format!("value at {i} is not finite")));
    }
    if let Some(i) = network.tolerance.iter().position(|t| !(*t > 0.0 && t.is_finite())) {
        return Err(BalanceError::validation(
            "tolerance",
            format!("value at {i} must be positive and finite"),
        ));
    }
    if let Some(i) = (0..n).find(|&i| bounds.lower[i] > bounds.upper[i]) {
        return Err(BalanceError::validation(
            "lower",
            format!(
                "lower bound {} exceeds upper bound {} at {i}",
                bounds.lower[i], bounds.upper[i]
            ),
        ));
    }
    Ok(())
}

impl BalanceSolver for GoldfarbIdnaniSolver {
    fn name(&self) -> &'static str {
        "goldfarb-idnani"
    }

    fn test_settings(&self) -> GlobalTestSettings {
        self.tests
    }

    fn solve(&self, network: &Network, bounds: &Bounds) -> BalanceResult<Reconciliation> {
        validate_problem(network, bounds)?;

        let started = Instant::now();
        let program = self.formulate(network, bounds);
        debug!(
            flows = network.flow_count(),
            nodes = network.node_count(),
            constraints = program.constraints.len(),
            "solving balance task"
        );

        let settings = QpSettings {
            max_iterations: self.settings.max_iterations,
            feasibility_tolerance: self.settings.feasibility_tolerance,
        };
        let solution =
            qp::minimize(&program, settings).map_err(|e| BalanceError::SolveFailed(e.to_string()))?;

        let x: Vec<f64> = solution.x.iter().copied().collect();
        let reconciliation = Reconciliation {
            disbalance_original: network.disbalance(&network.x0),
            disbalance: network.disbalance(&x),
            x,
            iterations: solution.iterations,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        };
        info!(
            disbalance_original = reconciliation.disbalance_original,
            disbalance = reconciliation.disbalance,
            iterations = reconciliation.iterations,
            "balance task solved"
        );
        Ok(reconciliation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 → 1 → 2 metered, 0 → 2 unmetered
    fn triangle() -> (Network, Bounds) {
        let network = Network::from_rows(
            vec![10.0, 10.0, 0.0],
            &[
                vec![-1.0, 0.0, -1.0],
                vec![1.0, -1.0, 0.0],
                vec![0.0, 1.0, 1.0],
            ],
            vec![0.0; 3],
            vec![1.0, 1.0, 0.0],
            vec![1.0, 1.0, 1e6],
        )
        .unwrap();
        (network, Bounds::new(vec![-100.0; 3], vec![100.0; 3]))
    }

    #[test]
    fn test_triangle_reconciles() {
        let (network, bounds) = triangle();
        let result = GoldfarbIdnaniSolver::default().solve(&network, &bounds).unwrap();
        assert!((result.x[0] - 10.0).abs() < 1e-6);
        assert!((result.x[1] - 10.0).abs() < 1e-6);
        assert!((result.x[1] + result.x[2]).abs() < 1e-6);
        assert!(result.disbalance < 1e-6);
        assert!((result.disbalance_original - 200f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_spread_tolerances_keep_exact_weights() {
        // 0 → out twice; the tightest meter all but fixes the feed
        let network = Network::from_rows(
            vec![100.0, 50.0, 40.0],
            &[vec![1.0, -1.0, -1.0]],
            vec![0.0],
            vec![1.0, 1.0, 1.0],
            vec![1e-3, 1e2, 1e3],
        )
        .unwrap();
        let bounds = Bounds::unbounded(3);
        let result = GoldfarbIdnaniSolver::default().solve(&network, &bounds).unwrap();

        // x_i = x0_i - a_i σ_i² r / Σσ² with r = 10
        let total = 1e-6 + 1e4 + 1e6;
        let lambda = 10.0 / total;
        assert!((result.x[0] - (100.0 - lambda * 1e-6)).abs() < 1e-6);
        assert!((result.x[1] - (50.0 + lambda * 1e4)).abs() < 1e-4);
        assert!((result.x[2] - (40.0 + lambda * 1e6)).abs() < 1e-4);
        assert!(result.disbalance < 1e-6);
    }

    #[test]
    fn test_measured_flows_split_the_correction() {
        // 0 → 1 measured at 10, 1 → out measured at 12; node 1 must balance
        let network = Network::from_rows(
            vec![10.0, 12.0],
            &[vec![1.0, -1.0]],
            vec![0.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
        )
        .unwrap();
        let result = GoldfarbIdnaniSolver::default()
            .solve(&network, &Bounds::unbounded(2))
            .unwrap();
        assert!((result.x[0] - 11.0).abs() < 1e-6);
        assert!((result.x[1] - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_tighter_tolerance_moves_less() {
        let network = Network::from_rows(
            vec![10.0, 12.0],
            &[vec![1.0, -1.0]],
            vec![0.0],
            vec![1.0, 1.0],
            vec![0.1, 1.0],
        )
        .unwrap();
        let result = GoldfarbIdnaniSolver::default()
            .solve(&network, &Bounds::unbounded(2))
            .unwrap();
        // weights 100 and 1: x = (100·10 + 12) / 101
        let expected = 1012.0 / 101.0;
        assert!((result.x[0] - expected).abs() < 1e-5);
        assert!((result.x[1] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_binding_upper_bound() {
        let network = Network::from_rows(
            vec![10.0, 12.0],
            &[vec![1.0, -1.0]],
            vec![0.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
        )
        .unwrap();
        let bounds = Bounds::new(vec![0.0, 0.0], vec![10.5, 100.0]);
        let result = GoldfarbIdnaniSolver::default().solve(&network, &bounds).unwrap();
        assert!((result.x[0] - 10.5).abs() < 1e-6);
        assert!((result.x[1] - 10.5).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_bounds_fail_to_solve() {
        let network = Network::from_rows(
            vec![10.0, 12.0],
            &[vec![1.0, -1.0]],
            vec![0.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
        )
        .unwrap();
        let bounds = Bounds::new(vec![0.0, 20.0], vec![5.0, 30.0]);
        let err = GoldfarbIdnaniSolver::default().solve(&network, &bounds).unwrap_err();
        assert!(matches!(err, BalanceError::SolveFailed(_)));
    }

    #[test]
    fn test_mismatched_upper_rejected() {
        let (network, mut bounds) = triangle();
        bounds.upper.pop();
        let err = GoldfarbIdnaniSolver::default().solve(&network, &bounds).unwrap_err();
        assert_eq!(err.argument(), Some("upper"));
    }

    #[test]
    fn test_zero_tolerance_rejected() {
        let (mut network, bounds) = triangle();
        network.tolerance[2] = 0.0;
        let err = GoldfarbIdnaniSolver::default().solve(&network, &bounds).unwrap_err();
        assert_eq!(err.argument(), Some("tolerance"));
    }

    #[test]
    fn test_crossed_bounds_rejected() {
        let (network, mut bounds) = triangle();
        bounds.lower[1] = 200.0;
        let err = GoldfarbIdnaniSolver::default().solve(&network, &bounds).unwrap_err();
        assert_eq!(err.argument(), Some("lower"));
    }

    #[test]
    fn test_near_zero_coefficients_dropped() {
        let (mut network, bounds) = triangle();
        network.a[(1, 2)] = 1e-9;
        let program = GoldfarbIdnaniSolver::default().formulate(&network, &bounds);
        assert_eq!(program.constraints[1].indices, vec![0, 1]);
    }

    #[test]
    fn test_infinite_bounds_skipped() {
        let (network, _) = triangle();
        let program = GoldfarbIdnaniSolver::default().formulate(&network, &Bounds::unbounded(3));
        assert_eq!(program.constraints.len(), 3);
    }
}
