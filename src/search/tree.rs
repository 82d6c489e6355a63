use serde::Serialize;

pub type NodeId = usize;

pub const ROOT: NodeId = 0;

/// One hypothesis: the flows added along the path from the root
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// `(i, j)` pairs: `+1` at row `i`, `-1` at row `j`
    pub flows: Vec<(usize, usize)>,
    pub test_value: f64,
    pub depth: usize,
}

impl HypothesisNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena of hypothesis nodes addressed by id; the root is always id 0
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypothesisTree {
    nodes: Vec<HypothesisNode>,
}

impl HypothesisTree {
    pub fn new(root_test_value: f64) -> Self {
        Self {
            nodes: vec![HypothesisNode {
                id: ROOT,
                parent: None,
                children: Vec::new(),
                flows: Vec::new(),
                test_value: root_test_value,
                depth: 0,
            }],
        }
    }

    /// Nodes including the root, so never zero
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> &HypothesisNode {
        &self.nodes[ROOT]
    }

    pub fn node(&self, id: NodeId) -> Option<&HypothesisNode> {
        self.nodes.get(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub(crate) fn set_test_value(&mut self, id: NodeId, value: f64) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.test_value = value;
        }
    }

    /// Append a child of `parent` whose path extends the parent's by `flow`.
    /// Returns `None` when `parent` does not exist.
    pub fn add_child(&mut self, parent: NodeId, flow: (usize, usize), test_value: f64) -> Option<NodeId> {
        let (mut flows, depth) = {
            let p = self.nodes.get(parent)?;
            (p.flows.clone(), p.depth + 1)
        };
        flows.push(flow);
        let id = self.nodes.len();
        self.nodes.push(HypothesisNode {
            id,
            parent: Some(parent),
            children: Vec::new(),
            flows,
            test_value,
            depth,
        });
        self.nodes[parent].children.push(id);
        Some(id)
    }

    /// Leaf nodes, lowest `test_value` first; ties keep creation order
    pub fn leaves(&self) -> Vec<&HypothesisNode> {
        let mut leaves: Vec<&HypothesisNode> = self.nodes.iter().filter(|n| n.is_leaf()).collect();
        leaves.sort_by(|a, b| a.test_value.total_cmp(&b.test_value));
        leaves
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tree_root_is_leaf() {
        let tree = HypothesisTree::new(4.0);
        assert_eq!(tree.node_count(), 1);
        assert!(tree.root().is_leaf());
        assert_eq!(tree.leaves().len(), 1);
        assert_eq!(tree.parent(ROOT), None);
    }

    #[test]
    fn test_child_extends_parent_path() {
        let mut tree = HypothesisTree::new(4.0);
        let a = tree.add_child(ROOT, (1, 2), 2.0).unwrap();
        let b = tree.add_child(a, (0, 1), 0.5).unwrap();
        let node = tree.node(b).unwrap();
        assert_eq!(node.flows, vec![(1, 2), (0, 1)]);
        assert_eq!(node.depth, 2);
        assert_eq!(tree.parent(b), Some(a));
        assert_eq!(tree.root().children, vec![a]);
    }

    #[test]
    fn test_missing_parent_rejected() {
        let mut tree = HypothesisTree::new(1.0);
        assert_eq!(tree.add_child(5, (0, 1), 0.0), None);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_leaves_sorted_ascending() {
        let mut tree = HypothesisTree::new(9.0);
        tree.add_child(ROOT, (0, 1), 3.0);
        tree.add_child(ROOT, (1, 2), 1.0);
        tree.add_child(ROOT, (0, 2), 2.0);
        let values: Vec<f64> = tree.leaves().iter().map(|n| n.test_value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }
}
