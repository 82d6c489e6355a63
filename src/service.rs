use std::sync::Arc;

use thiserror::Error;
use tokio::task::{self, JoinError};
use tracing::{info, warn};

use crate::balance::{BalanceError, BalanceResult, BalanceSolver, GoldfarbIdnaniSolver, Reconciliation};
use crate::config::Config;
use crate::domain::{BalanceInput, BoundSet, Hypothesis, Network};
use crate::search::{self, SearchSettings};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error("balance worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// Async facade over the balance engine
///
/// Each call runs to completion on tokio's blocking pool so the numeric work
/// never stalls the I/O threads.
#[derive(Clone)]
pub struct BalanceService {
    solver: Arc<dyn BalanceSolver>,
    search: SearchSettings,
    default_bounds: BoundSet,
}

impl BalanceService {
    pub fn new(solver: Arc<dyn BalanceSolver>, search: SearchSettings, default_bounds: BoundSet) -> Self {
        Self {
            solver,
            search,
            default_bounds,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let solver = GoldfarbIdnaniSolver::new(cfg.solver).with_test_settings(cfg.global_test);
        Self::new(Arc::new(solver), cfg.search, cfg.bounds.default_set)
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    pub fn search_settings(&self) -> SearchSettings {
        self.search
    }

    pub async fn reconcile(&self, input: BalanceInput) -> Result<Reconciliation, ServiceError> {
        let solver = Arc::clone(&self.solver);
        let set = input.bound_set(self.default_bounds);
        run_blocking(move || {
            let (network, bounds) = input.problem(set)?;
            info!(solver = solver.name(), bounds = %set, flows = network.flow_count(), "reconcile");
            solver.solve(&network, &bounds)
        })
        .await
    }

    pub async fn global_test(&self, input: BalanceInput) -> Result<f64, ServiceError> {
        let solver = Arc::clone(&self.solver);
        run_blocking(move || {
            let network = input.network()?;
            warn_on_target(&network);
            solver.global_test(&network)
        })
        .await
    }

    /// Ranked hypotheses; `settings` falls back to the configured limits
    pub async fn glr(
        &self,
        input: BalanceInput,
        settings: Option<SearchSettings>,
    ) -> Result<Vec<Hypothesis>, ServiceError> {
        let solver = Arc::clone(&self.solver);
        let settings = settings.unwrap_or(self.search);
        run_blocking(move || {
            let network = input.network()?;
            warn_on_target(&network);
            let catalog = input.catalog(&network)?;
            let ranges = input.ranges(network.flow_count())?;
            let ranked = search::rank_hypotheses(solver.as_ref(), &network, &catalog, &ranges, settings)?;
            info!(
                hypotheses = ranked.len(),
                max_branching = settings.max_branching,
                max_depth = settings.max_depth,
                "glr search"
            );
            Ok(ranked)
        })
        .await
    }

    /// Single greedy chain of the configured depth
    pub async fn glr_best(&self, input: BalanceInput) -> Result<Vec<Hypothesis>, ServiceError> {
        self.glr(input, Some(self.search.best())).await
    }
}

fn warn_on_target(network: &Network) {
    if network.b.iter().any(|v| *v != 0.0) {
        warn!("global test assumes a zero right-hand side; b is ignored");
    }
}

async fn run_blocking<T, F>(job: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> BalanceResult<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(task::spawn_blocking(job).await??)
}
