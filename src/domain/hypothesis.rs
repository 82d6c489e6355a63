use serde::{Deserialize, Serialize};

/// Closed interval of admissible values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

/// One flow of a hypothesis as shown to the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisFlow {
    pub id: String,
    pub name: String,
    /// Column index of the matching physical flow, if any
    pub number: Option<usize>,
    /// Endpoints as `"i -> j"`
    pub info: String,
}

/// Additional flow the operator may add to the model to explain the imbalance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRecommendation {
    pub id: String,
    pub source_id: String,
    pub destination_id: String,
    pub name: String,
    pub metrologic_range: Range,
    pub technologic_range: Range,
    pub tolerance: f64,
    pub is_measured: bool,
    pub var_type: String,
}

/// Ranked explanation of a gross error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hypothesis {
    pub flows_info: Vec<HypothesisFlow>,
    pub flows_to_add: Vec<FlowRecommendation>,
    /// Global Test after accounting for the hypothesis; lower is more consistent
    pub test_value: f64,
}
