use std::collections::{HashMap, HashSet};

use super::node::{DialogNode, NodeId};

/// All nodes read from one definition, addressed by [`NodeId`].
#[derive(Debug)]
pub struct DialogGraph {
    namespace: String,
    pub(crate) nodes: Vec<DialogNode>,
    ids: HashMap<String, NodeId>,
    root: Option<NodeId>,
}

impl DialogGraph {
    pub(crate) fn new(namespace: String, nodes: Vec<DialogNode>, root: Option<NodeId>) -> Self {
        let ids = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id().to_string(), NodeId::new(i)))
            .collect();
        Self {
            namespace,
            nodes,
            ids,
            root,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Entry point of the dialog, if the definition had a `root` node.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root_node(&self) -> Option<&DialogNode> {
        self.root.and_then(|id| self.node(id))
    }

    pub fn node(&self, id: NodeId) -> Option<&DialogNode> {
        self.nodes.get(id.index())
    }

    /// Look a node up by its local id.
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&DialogNode> {
        self.find(id).and_then(|id| self.node(id))
    }

    pub fn by_global_id(&self, global_id: &str) -> Option<&DialogNode> {
        self.nodes.iter().find(|n| n.global_id() == global_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &DialogNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId::new(i), node))
    }

    /// Number of nodes on the longest cycle-free path from the root.
    pub fn longest_path(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let mut on_path = HashSet::new();
        self.longest_from(root, &mut on_path)
    }

    fn longest_from(&self, id: NodeId, on_path: &mut HashSet<NodeId>) -> usize {
        let Some(node) = self.node(id) else {
            return 0;
        };
        if !on_path.insert(id) {
            return 0;
        }
        let max_child = node
            .next()
            .into_iter()
            .flatten()
            .map(|next| self.longest_from(next, on_path))
            .max()
            .unwrap_or(0);
        on_path.remove(&id);
        1 + max_child
    }
}
