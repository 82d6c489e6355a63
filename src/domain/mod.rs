pub mod hypothesis;
pub mod input;
pub mod network;

pub use hypothesis::{FlowRecommendation, Hypothesis, HypothesisFlow, Range};
pub use input::{BalanceInput, FlowCatalog, FlowRanges};
pub use network::{incidence_from_rows, BoundSet, Bounds, Network};
