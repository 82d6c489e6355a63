use itertools::Itertools;
use nalgebra::DMatrix;

use super::global_test::global_test;
use super::{BalanceError, BalanceResult, Flow, GlobalTestSettings};
use crate::domain::Network;

/// GLR score table over node pairs
///
/// Cell `(i, j)` holds `baseline − globalTest(network + flow(i, j))`, where the
/// extra flow is an unmeasured column with `+1` at row `i` and `-1` at row `j`.
/// Only the `candidates` cells are scored when a list is given; otherwise every
/// pair `i < j`. Unscored cells stay 0.
pub fn glr_table(
    network: &Network,
    candidates: Option<&[Flow]>,
    baseline: f64,
    settings: &GlobalTestSettings,
) -> BalanceResult<DMatrix<f64>> {
    let nodes = network.node_count();
    let pairs: Vec<(usize, usize)> = match candidates {
        Some(flows) => {
            if let Some(bad) = flows.iter().find(|f| f.source >= nodes || f.destination >= nodes) {
                return Err(BalanceError::validation(
                    "flows",
                    format!(
                        "candidate {} -> {} is outside the {nodes} balance rows",
                        bad.source, bad.destination
                    ),
                ));
            }
            flows.iter().map(Flow::endpoints).collect()
        }
        None => (0..nodes).tuple_combinations().collect(),
    };

    let mut table = DMatrix::zeros(nodes, nodes);
    for (i, j) in pairs {
        let augmented = network.with_extra_flows(&[(i, j)]);
        let value = global_test(
            &augmented.x0,
            &augmented.a,
            &augmented.measurability,
            &augmented.tolerance,
            settings,
        )?;
        table[(i, j)] = baseline - value;
    }
    Ok(table)
}

/// Row-major position of the first largest cell
pub fn arg_max(table: &DMatrix<f64>) -> (usize, usize) {
    let mut best = (0, 0);
    let mut best_value = f64::NEG_INFINITY;
    for i in 0..table.nrows() {
        for j in 0..table.ncols() {
            if table[(i, j)] > best_value {
                best_value = table[(i, j)];
                best = (i, j);
            }
        }
    }
    best
}
