use serde::{Deserialize, Serialize};

use super::{BoundSet, Bounds, Network};
use crate::balance::{BalanceError, BalanceResult};

/// Request body shared by every balance endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceInput {
    pub x0: Option<Vec<f64>>,
    /// Incidence matrix, row-major (one row per node)
    pub a: Option<Vec<Vec<f64>>>,
    pub b: Option<Vec<f64>>,
    pub measurability: Option<Vec<f64>>,
    pub tolerance: Option<Vec<f64>>,
    pub lower_metrologic: Option<Vec<f64>>,
    pub upper_metrologic: Option<Vec<f64>>,
    pub lower_technologic: Option<Vec<f64>>,
    pub upper_technologic: Option<Vec<f64>>,
    /// Overrides the configured bound set when present
    pub use_technologic: Option<bool>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub guids: Vec<String>,
    #[serde(default)]
    pub nodes_guids: Vec<String>,
}

/// Human-facing identities of flows and nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowCatalog {
    pub names: Vec<String>,
    pub guids: Vec<String>,
    pub node_guids: Vec<String>,
}

impl FlowCatalog {
    pub fn flow_name(&self, flow: usize) -> String {
        self.names
            .get(flow)
            .cloned()
            .unwrap_or_else(|| format!("Flow {flow}"))
    }

    pub fn flow_id(&self, flow: usize) -> String {
        self.guids
            .get(flow)
            .cloned()
            .unwrap_or_else(|| flow.to_string())
    }

    pub fn node_id(&self, node: usize) -> String {
        self.node_guids
            .get(node)
            .cloned()
            .unwrap_or_else(|| node.to_string())
    }

    fn validate(&self, flows: usize, nodes: usize) -> BalanceResult<()> {
        if !self.names.is_empty() && self.names.len() != flows {
            return Err(BalanceError::length_mismatch("names", flows, self.names.len()));
        }
        if !self.guids.is_empty() && self.guids.len() != flows {
            return Err(BalanceError::length_mismatch("guids", flows, self.guids.len()));
        }
        if !self.node_guids.is_empty() && self.node_guids.len() != nodes {
            return Err(BalanceError::length_mismatch("nodes_guids", nodes, self.node_guids.len()));
        }
        Ok(())
    }
}

/// Both bound sets of every flow
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRanges {
    pub metrologic: Bounds,
    pub technologic: Bounds,
}

impl FlowRanges {
    pub fn select(&self, set: BoundSet) -> &Bounds {
        match set {
            BoundSet::Metrologic => &self.metrologic,
            BoundSet::Technologic => &self.technologic,
        }
    }
}

fn required<T: Clone>(value: &Option<T>, argument: &'static str) -> BalanceResult<T> {
    value
        .clone()
        .ok_or_else(|| BalanceError::validation(argument, "argument is required"))
}

fn bounds_or_unbounded(
    lower: &Option<Vec<f64>>,
    upper: &Option<Vec<f64>>,
    n: usize,
) -> BalanceResult<Bounds> {
    let lower = sized(lower, "lower", n)?.unwrap_or_else(|| vec![f64::NEG_INFINITY; n]);
    let upper = sized(upper, "upper", n)?.unwrap_or_else(|| vec![f64::INFINITY; n]);
    Ok(Bounds::new(lower, upper))
}

fn sized(values: &Option<Vec<f64>>, argument: &'static str, n: usize) -> BalanceResult<Option<Vec<f64>>> {
    match values {
        Some(v) if v.len() != n => Err(BalanceError::length_mismatch(argument, n, v.len())),
        other => Ok(other.clone()),
    }
}

impl BalanceInput {
    pub fn bound_set(&self, default_set: BoundSet) -> BoundSet {
        match self.use_technologic {
            Some(true) => BoundSet::Technologic,
            Some(false) => BoundSet::Metrologic,
            None => default_set,
        }
    }

    /// Network without the bound vectors, for the statistical tests
    pub fn network(&self) -> BalanceResult<Network> {
        let x0 = required(&self.x0, "x0")?;
        let rows = required(&self.a, "a")?;
        let b = match &self.b {
            Some(b) => b.clone(),
            None => vec![0.0; rows.len()],
        };
        let measurability = required(&self.measurability, "measurability")?;
        let tolerance = required(&self.tolerance, "tolerance")?;
        let network = Network::from_rows(x0, &rows, b, measurability, tolerance)?;
        network.validate()?;
        Ok(network)
    }

    /// Network plus the bounds the solver needs; the selected bound set is required
    pub fn problem(&self, set: BoundSet) -> BalanceResult<(Network, Bounds)> {
        required(&self.x0, "x0")?;
        required(&self.a, "a")?;
        required(&self.b, "b")?;
        required(&self.measurability, "measurability")?;
        required(&self.tolerance, "tolerance")?;
        let (lower, upper) = match set {
            BoundSet::Metrologic => (
                required(&self.lower_metrologic, "lower")?,
                required(&self.upper_metrologic, "upper")?,
            ),
            BoundSet::Technologic => (
                required(&self.lower_technologic, "lower")?,
                required(&self.upper_technologic, "upper")?,
            ),
        };
        let network = self.network()?;
        Ok((network, Bounds::new(lower, upper)))
    }

    /// Both bound sets; absent vectors never bind, supplied ones must cover every flow
    pub fn ranges(&self, n: usize) -> BalanceResult<FlowRanges> {
        Ok(FlowRanges {
            metrologic: bounds_or_unbounded(&self.lower_metrologic, &self.upper_metrologic, n)?,
            technologic: bounds_or_unbounded(&self.lower_technologic, &self.upper_technologic, n)?,
        })
    }

    pub fn catalog(&self, network: &Network) -> BalanceResult<FlowCatalog> {
        let catalog = FlowCatalog {
            names: self.names.clone(),
            guids: self.guids.clone(),
            node_guids: self.nodes_guids.clone(),
        };
        catalog.validate(network.flow_count(), network.node_count())?;
        Ok(catalog)
    }
}
