//! Path-keyed node storage with lazy ancestor creation.
//!
//! All nodes live in one arena owned by the registry; parents refer to
//! children by [`NodeId`], and the key index maps each [`ResponsePath::key`]
//! to its node. The root is registered under the empty key at construction.

use super::node::{FinalizedNode, NodeId, NodeKey, TraceNode};
use crate::path::ResponsePath;
use std::collections::HashMap;

/// Mapping from path keys to trace nodes.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Vec<TraceNode>,
    by_key: HashMap<String, NodeId>,
}

impl NodeRegistry {
    /// Creates a registry holding only the root.
    #[must_use]
    pub fn new() -> Self {
        let mut by_key = HashMap::new();
        by_key.insert(String::new(), NodeId::ROOT);
        Self {
            nodes: vec![TraceNode::new(NodeKey::Root)],
            by_key,
        }
    }

    /// Returns the node at `path`, creating it and any missing ancestors.
    ///
    /// A new node is appended to its parent's children, so sibling order is
    /// the order in which positions were first referenced.
    pub fn ensure(&mut self, path: &ResponsePath) -> NodeId {
        let key = path.key();
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }
        // The root is always registered, so a miss has a parent and a last segment.
        let (Some(parent_path), Some(segment)) = (path.parent(), path.last()) else {
            return NodeId::ROOT;
        };
        let parent = self.ensure(&parent_path);

        let id = NodeId(self.nodes.len());
        self.nodes.push(TraceNode::new(NodeKey::from_segment(segment)));
        self.nodes[parent.0].children.push(id);
        self.by_key.insert(key, id);
        id
    }

    /// Returns the node at `path` without creating anything.
    #[must_use]
    pub fn lookup(&self, path: &ResponsePath) -> Option<NodeId> {
        self.by_key.get(&path.key()).copied()
    }

    /// Borrows a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&TraceNode> {
        self.nodes.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut TraceNode> {
        self.nodes.get_mut(id.0)
    }

    /// Number of nodes, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: the root is present from construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Copies the subtree rooted at `id` into an owned, immutable tree.
    pub(crate) fn snapshot(&self, id: NodeId) -> FinalizedNode {
        let node = &self.nodes[id.0];
        FinalizedNode {
            key: node.key.clone(),
            original_field_name: node.original_field_name.clone(),
            type_name: node.type_name.clone(),
            parent_type_name: node.parent_type_name.clone(),
            start_offset_nanos: node.start_offset_nanos,
            end_offset_nanos: node.end_offset_nanos,
            children: node.children.iter().map(|&child| self.snapshot(child)).collect(),
            errors: node.errors.clone(),
        }
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
