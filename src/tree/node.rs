//! Trace tree vertices.

use crate::error_record::ErrorRecord;
use crate::path::PathSegment;
use core::fmt;

/// Index of a node in its tree's arena.
///
/// Ids are only meaningful for the tree that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The root node, present in every tree.
    pub const ROOT: Self = Self(0);

    /// Position in the arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A node's identity within its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    /// The trace root.
    Root,
    /// A field, by response key.
    Field(String),
    /// A list item, by position.
    Index(usize),
}

impl NodeKey {
    /// Key for the node addressed by `segment`.
    #[must_use]
    pub fn from_segment(segment: &PathSegment) -> Self {
        match segment {
            PathSegment::Name(name) => Self::Field(name.clone()),
            PathSegment::Index(index) => Self::Index(*index),
        }
    }

    /// Returns `true` if this key addresses `segment`.
    #[must_use]
    pub fn matches(&self, segment: &PathSegment) -> bool {
        match (self, segment) {
            (Self::Field(name), PathSegment::Name(other)) => name == other,
            (Self::Index(index), PathSegment::Index(other)) => index == other,
            _ => false,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("<root>"),
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A mutable node while the trace is being assembled.
///
/// Nodes created only as ancestors of another node keep their type and
/// timing fields unset until (and unless) they are opened themselves.
#[derive(Debug, Clone)]
pub struct TraceNode {
    pub(crate) key: NodeKey,
    pub(crate) original_field_name: Option<String>,
    pub(crate) type_name: Option<String>,
    pub(crate) parent_type_name: Option<String>,
    pub(crate) start_offset_nanos: Option<i64>,
    pub(crate) end_offset_nanos: Option<i64>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) errors: Vec<ErrorRecord>,
}

impl TraceNode {
    pub(crate) const fn new(key: NodeKey) -> Self {
        Self {
            key,
            original_field_name: None,
            type_name: None,
            parent_type_name: None,
            start_offset_nanos: None,
            end_offset_nanos: None,
            children: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Identity within the parent.
    #[must_use]
    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    /// Child ids in first-seen order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Errors attributed to this node.
    #[must_use]
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Returns `true` if the node was opened (not just created as an ancestor).
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.start_offset_nanos.is_some()
    }
}

/// An immutable node in a finalized trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedNode {
    /// Identity within the parent.
    pub key: NodeKey,
    /// Underlying field name, set only when the response key is an alias.
    pub original_field_name: Option<String>,
    /// Declared return type.
    pub type_name: Option<String>,
    /// Type declaring the field.
    pub parent_type_name: Option<String>,
    /// Start offset from trace start.
    pub start_offset_nanos: Option<i64>,
    /// End offset from trace start.
    pub end_offset_nanos: Option<i64>,
    /// Children in first-seen order.
    pub children: Vec<FinalizedNode>,
    /// Errors attributed to this node.
    pub errors: Vec<ErrorRecord>,
}

impl FinalizedNode {
    /// Finds the direct child addressed by `segment`.
    #[must_use]
    pub fn child(&self, segment: &PathSegment) -> Option<&Self> {
        self.children.iter().find(|child| child.key.matches(segment))
    }

    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Self::subtree_len).sum::<usize>()
    }

    /// Time between start and end, if both were recorded.
    #[must_use]
    pub fn duration_nanos(&self) -> Option<i64> {
        Some(self.end_offset_nanos? - self.start_offset_nanos?)
    }
}
