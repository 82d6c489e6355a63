//! Hypothesis tree search for gross-error isolation
//!
//! A bounded depth-first walk over combinations of candidate flows, scored by
//! the GLR table and the Global Test of the augmented network.

pub mod engine;
pub mod report;
pub mod tree;

pub use engine::{CandidateSet, HypothesisSearch, SearchSettings};
pub use report::hypotheses;
pub use tree::{HypothesisNode, HypothesisTree, NodeId};

use crate::balance::{BalanceResult, BalanceSolver};
use crate::domain::{FlowCatalog, FlowRanges, Hypothesis, Network};

/// Run the search and describe every resulting leaf
pub fn rank_hypotheses(
    solver: &dyn BalanceSolver,
    network: &Network,
    catalog: &FlowCatalog,
    ranges: &FlowRanges,
    settings: SearchSettings,
) -> BalanceResult<Vec<Hypothesis>> {
    let tree = HypothesisSearch::new(solver, settings).run(network)?;
    let existing = solver.get_flows(&network.a);
    Ok(hypotheses(&tree, network, &existing, catalog, ranges))
}
