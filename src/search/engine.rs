use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info};

use super::tree::{HypothesisTree, NodeId, ROOT};
use crate::balance::{arg_max, BalanceError, BalanceResult, BalanceSolver, Flow};
use crate::domain::Network;

/// Nodes whose Global Test falls below this are consistent and not expanded
const SIGNIFICANCE: f64 = 1.0;

/// Which pairs the GLR table scores at every visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CandidateSet {
    /// Endpoints of the physical flows found in the incidence matrix
    #[default]
    Existing,
    /// Every node pair `i < j`
    AllPairs,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub max_branching: usize,
    pub max_depth: usize,
    #[serde(default)]
    pub candidates: CandidateSet,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_branching: 3,
            max_depth: 5,
            candidates: CandidateSet::Existing,
        }
    }
}

impl SearchSettings {
    pub fn validate(&self) -> BalanceResult<()> {
        if self.max_branching == 0 {
            return Err(BalanceError::validation("max_branching", "must be at least 1"));
        }
        if self.max_depth == 0 {
            return Err(BalanceError::validation("max_depth", "must be at least 1"));
        }
        Ok(())
    }

    /// Single greedy chain
    pub fn best(self) -> Self {
        Self {
            max_branching: 1,
            ..self
        }
    }
}

/// Depth-first hypothesis search with backtracking
pub struct HypothesisSearch<'a> {
    solver: &'a dyn BalanceSolver,
    settings: SearchSettings,
}

impl<'a> HypothesisSearch<'a> {
    pub fn new(solver: &'a dyn BalanceSolver, settings: SearchSettings) -> Self {
        Self { solver, settings }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Candidate flows scored at every visit
    pub fn candidates(&self, network: &Network) -> Option<Vec<Flow>> {
        match self.settings.candidates {
            CandidateSet::Existing => Some(self.solver.get_flows(&network.a)),
            CandidateSet::AllPairs => None,
        }
    }

    /// Grow the hypothesis tree for `network`
    ///
    /// Each visit re-tests the network augmented with the node's flows and
    /// either descends into the next-best unused candidate or ascends. The walk
    /// ends once it ascends past the root.
    pub fn run(&self, network: &Network) -> BalanceResult<HypothesisTree> {
        self.settings.validate()?;
        network.validate()?;

        let candidates = self.candidates(network);
        let mut tree = HypothesisTree::new(0.0);
        let mut current: Option<NodeId> = Some(ROOT);
        let mut visits = 0usize;

        while let Some(id) = current {
            visits += 1;
            let (flows, children, depth) = match tree.node(id) {
                Some(node) => (node.flows.clone(), node.children.len(), node.depth),
                None => break,
            };

            let augmented = network.with_extra_flows(&flows);
            let g = self.solver.global_test(&augmented)?;
            if id == ROOT {
                tree.set_test_value(ROOT, g);
            }
            let mut table = self.solver.glr_table(&augmented, candidates.as_deref(), g)?;

            // (children + 1)-th best cell; earlier maxima belong to existing siblings
            let mut best = (0, 0);
            for k in 0..=children {
                best = arg_max(&table);
                if table[best] <= 0.0 {
                    break;
                }
                if k != children {
                    table[best] = 0.0;
                }
            }
            let score = table[best];

            let expand = children < self.settings.max_branching
                && depth < self.settings.max_depth
                && score > 0.0
                && g >= SIGNIFICANCE;
            if expand {
                debug!(node = id, depth, flow = ?best, g, score, "expanding hypothesis");
                current = tree.add_child(id, best, g - score);
            } else {
                current = tree.parent(id);
            }
        }

        info!(
            nodes = tree.node_count(),
            visits,
            max_branching = self.settings.max_branching,
            max_depth = self.settings.max_depth,
            "hypothesis search finished"
        );
        Ok(tree)
    }
}
