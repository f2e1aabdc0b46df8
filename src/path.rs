//! Response paths and their canonical string keys.
//!
//! A [`ResponsePath`] locates a field inside the response shape as an ordered
//! chain of segments from the root: field names (response keys) and list
//! indices. Its [`key`](ResponsePath::key) is the dotted join of the segments
//! and identifies the trace node for that position; the root is the empty
//! chain with the empty key.
//!
//! Segments are joined without escaping. Response keys are GraphQL names:
//! they can never contain the separator, and they are never empty. An empty
//! name would share the root's key, so builders reject one in debug builds
//! and the trace tree ignores a non-root path whose key is empty.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Separator placed between segments in a path key.
pub const KEY_SEPARATOR: char = '.';

/// One step of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A field, addressed by its response key (alias or field name).
    Name(String),
    /// A position inside a list.
    Index(usize),
}

impl PathSegment {
    /// Returns the response key if this is a field segment.
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Index(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An ordered chain of segments from the response root to a field.
///
/// Serializes as a plain JSON array (`["user", "friends", 0]`), matching the
/// `path` entry of a GraphQL error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponsePath {
    segments: Vec<PathSegment>,
}

impl ResponsePath {
    /// The empty path, addressing the root node.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Returns this path extended with a field segment.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.push(PathSegment::Name(name.into()));
        self
    }

    /// Returns this path extended with a list index segment.
    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(PathSegment::Index(index));
        self
    }

    /// Appends a segment in place.
    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        let segment = segment.into();
        debug_assert!(
            segment.as_name() != Some(""),
            "response keys are never empty"
        );
        self.segments.push(segment);
    }

    /// Returns `true` for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` for the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segments, root first.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The trailing segment, or `None` for the root.
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// The path with its trailing segment removed, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.segments.split_last()?;
        Some(Self {
            segments: init.to_vec(),
        })
    }

    /// Canonical key for this position. The root maps to `""`.
    #[must_use]
    pub fn key(&self) -> String {
        let mut key = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            match segment {
                PathSegment::Name(name) => key.push_str(name),
                PathSegment::Index(index) => key.push_str(&index.to_string()),
            }
        }
        key
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for ResponsePath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut path = Self::root();
        for segment in iter {
            path.push(segment);
        }
        path
    }
}

impl From<Vec<PathSegment>> for ResponsePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_key_is_empty() {
        assert_eq!(ResponsePath::root().key(), "");
        assert!(ResponsePath::root().is_root());
        assert_eq!(ResponsePath::root().parent(), None);
    }

    #[test]
    fn key_joins_names_and_indices() {
        let path = ResponsePath::root()
            .field("user")
            .field("friends")
            .index(3)
            .field("name");
        assert_eq!(path.key(), "user.friends.3.name");
        assert_eq!(path.to_string(), "user.friends.3.name");
    }

    #[test]
    fn parent_strips_trailing_segment() {
        let path = ResponsePath::root().field("items").index(0);
        let parent = path.parent().expect("non-root path has a parent");
        assert_eq!(parent.key(), "items");
        assert_eq!(parent.parent().map(|p| p.key()), Some(String::new()));
    }

    #[test]
    fn name_and_index_segments_do_not_collide_structurally() {
        let by_name: ResponsePath = ["a", "0"].into_iter().collect();
        let by_index = ResponsePath::root().field("a").index(0);
        assert_ne!(by_name, by_index);
        assert_eq!(by_name.last().and_then(PathSegment::as_name), Some("0"));
        assert_eq!(by_index.last().and_then(PathSegment::as_name), None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "response keys are never empty")]
    fn empty_field_name_is_rejected() {
        let _ = ResponsePath::root().field("user").field("");
    }

    #[test]
    fn empty_name_shares_root_key() {
        let path = ResponsePath::from(vec![PathSegment::Name(String::new())]);
        assert!(!path.is_root());
        assert_eq!(path.key(), ResponsePath::root().key());
    }

    #[test]
    fn serializes_as_graphql_error_path() {
        let path = ResponsePath::root().field("user").index(2);
        let json = serde_json::to_string(&path).expect("serialize path");
        assert_eq!(json, r#"["user",2]"#);

        let back: ResponsePath = serde_json::from_str(&json).expect("deserialize path");
        assert_eq!(back, path);
    }
}
