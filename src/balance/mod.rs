//! Reconciliation engine
//!
//! Weighted-least-squares balance solver, the Global Test, GLR scoring and
//! flow extraction. Every function here is a pure function of its arguments.

pub mod error;
pub mod flows;
pub mod glr;
pub mod qp;
pub mod solver;

pub use error::{BalanceError, BalanceResult};
pub use flows::{get_flows, Flow};
pub use global_test::global_test;
pub use glr::{arg_max, glr_table};
pub use solver::GoldfarbIdnaniSolver;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::{Bounds, Network};

/// Reconciled flows and balance diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub x: Vec<f64>,
    /// `‖A·x0 − b‖₂`
    pub disbalance_original: f64,
    /// `‖A·x* − b‖₂`
    pub disbalance: f64,
    pub iterations: usize,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    pub max_iterations: usize,
    /// Incidence entries at or below this magnitude are left out of balance rows
    pub coefficient_threshold: f64,
    /// Diagonal regularization relative to the largest measurement weight
    pub regularization: f64,
    pub feasibility_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            coefficient_threshold: 1e-7,
            regularization: 1e-9,
            feasibility_tolerance: 1e-7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalTestSettings {
    /// Confidence level of the chi-squared critical value
    pub confidence: f64,
    /// Unmeasured flows get `unmeasured_std_factor · max(x0)` as standard deviation
    pub unmeasured_std_factor: f64,
}

impl Default for GlobalTestSettings {
    fn default() -> Self {
        Self {
            confidence: 0.95,
            unmeasured_std_factor: 100.0,
        }
    }
}

/// Balance backend
///
/// Only `solve` depends on the backend; the statistical tests are shared.
pub trait BalanceSolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, network: &Network, bounds: &Bounds) -> BalanceResult<Reconciliation>;

    fn test_settings(&self) -> GlobalTestSettings {
        GlobalTestSettings::default()
    }

    fn global_test(&self, network: &Network) -> BalanceResult<f64> {
        global_test::global_test(
            &network.x0,
            &network.a,
            &network.measurability,
            &network.tolerance,
            &self.test_settings(),
        )
    }

    fn glr_table(
        &self,
        network: &Network,
        candidates: Option<&[Flow]>,
        baseline: f64,
    ) -> BalanceResult<DMatrix<f64>> {
        glr::glr_table(network, candidates, baseline, &self.test_settings())
    }

    fn get_flows(&self, a: &DMatrix<f64>) -> Vec<Flow> {
        flows::get_flows(a)
    }
}
