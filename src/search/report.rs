use uuid::Uuid;

use super::tree::{HypothesisNode, HypothesisTree};
use crate::balance::Flow;
use crate::domain::{
    Bounds, FlowCatalog, FlowRanges, FlowRecommendation, Hypothesis, HypothesisFlow, Network, Range,
};

const NEW_FLOW_NAME: &str = "New flow";
const FLOW_VAR_TYPE: &str = "FLOW";

/// Operator-facing view of every leaf, most consistent first
pub fn hypotheses(
    tree: &HypothesisTree,
    network: &Network,
    existing: &[Flow],
    catalog: &FlowCatalog,
    ranges: &FlowRanges,
) -> Vec<Hypothesis> {
    tree.leaves()
        .into_iter()
        .map(|leaf| describe(leaf, network, existing, catalog, ranges))
        .collect()
}

fn describe(
    leaf: &HypothesisNode,
    network: &Network,
    existing: &[Flow],
    catalog: &FlowCatalog,
    ranges: &FlowRanges,
) -> Hypothesis {
    let mut flows_info = Vec::with_capacity(leaf.flows.len());
    let mut flows_to_add = Vec::new();

    for &(i, j) in &leaf.flows {
        let info = format!("{i} -> {j}");
        match matching_flow(existing, i, j) {
            Some(flow) => {
                let k = flow.column;
                flows_info.push(HypothesisFlow {
                    id: catalog.flow_id(k),
                    name: catalog.flow_name(k),
                    number: Some(k),
                    info,
                });
                flows_to_add.push(recommendation(flow, network, catalog, ranges));
            }
            None => flows_info.push(HypothesisFlow {
                id: derived_id(&format!("new:{i}->{j}")),
                name: NEW_FLOW_NAME.to_string(),
                number: None,
                info,
            }),
        }
    }

    Hypothesis {
        flows_info,
        flows_to_add,
        test_value: leaf.test_value,
    }
}

/// Existing flow spanning `i` and `j`
///
/// A candidate pair carries no direction, so a flow running `j -> i` matches
/// when no flow runs `i -> j`.
fn matching_flow(existing: &[Flow], i: usize, j: usize) -> Option<&Flow> {
    existing
        .iter()
        .find(|f| f.endpoints() == (i, j))
        .or_else(|| existing.iter().find(|f| f.endpoints() == (j, i)))
}

fn recommendation(
    flow: &Flow,
    network: &Network,
    catalog: &FlowCatalog,
    ranges: &FlowRanges,
) -> FlowRecommendation {
    let (i, j) = flow.endpoints();
    let k = flow.column;
    let x0 = network.x0[k];
    FlowRecommendation {
        id: derived_id(&format!("additional:{}:{i}->{j}", catalog.flow_id(k))),
        source_id: catalog.node_id(i),
        destination_id: catalog.node_id(j),
        name: format!("{} (additional)", catalog.flow_name(k)),
        metrologic_range: recentered(&ranges.metrologic, k, x0),
        technologic_range: recentered(&ranges.technologic, k, x0),
        tolerance: network.tolerance[k],
        is_measured: true,
        var_type: FLOW_VAR_TYPE.to_string(),
    }
}

fn recentered(bounds: &Bounds, k: usize, x0: f64) -> Range {
    Range {
        min: bounds.lower[k] - x0,
        max: bounds.upper[k] - x0,
    }
}

fn derived_id(name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}
