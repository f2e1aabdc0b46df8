//! Protobuf messages shared with the trace collector.
//!
//! These mirror the collector's `Trace` schema for the fields this crate
//! populates. Tag numbers are part of the collector contract and must not
//! change; fields the collector defines but this crate never sets are
//! omitted and decode as unknown fields.

/// A complete trace for one execution.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Trace {
    /// Wall-clock end of the execution.
    #[prost(message, optional, tag = "3")]
    pub end_time: Option<Timestamp>,
    /// Wall-clock start of the execution.
    #[prost(message, optional, tag = "4")]
    pub start_time: Option<Timestamp>,
    /// Monotonic duration of the execution.
    #[prost(uint64, tag = "11")]
    pub duration_ns: u64,
    /// Root of the field tree.
    #[prost(message, optional, tag = "14")]
    pub root: Option<Node>,
}

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Timestamp {
    /// Whole seconds.
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    /// Sub-second nanoseconds.
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

/// One resolved field (or the root).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Node {
    /// Response key or list index; absent on the root.
    #[prost(oneof = "node::Id", tags = "1, 2")]
    pub id: Option<node::Id>,
    /// Declared return type, e.g. `[User!]`.
    #[prost(string, tag = "3")]
    pub r#type: String,
    /// Offset of resolver start from trace start.
    #[prost(uint64, tag = "8")]
    pub start_time: u64,
    /// Offset of resolver end from trace start.
    #[prost(uint64, tag = "9")]
    pub end_time: u64,
    /// Errors attributed to this field.
    #[prost(message, repeated, tag = "11")]
    pub error: Vec<Error>,
    /// Child fields and list items, in first-seen order.
    #[prost(message, repeated, tag = "12")]
    pub child: Vec<Node>,
    /// Type that declares this field.
    #[prost(string, tag = "13")]
    pub parent_type: String,
    /// Underlying field name when the response key is an alias.
    #[prost(string, tag = "14")]
    pub original_field_name: String,
}

/// Nested types for [`Node`].
pub mod node {
    /// Node identity within its parent.
    #[derive(Clone, PartialEq, Eq, Hash, ::prost::Oneof)]
    pub enum Id {
        /// A field, by response key.
        #[prost(string, tag = "1")]
        ResponseName(String),
        /// A list item, by position.
        #[prost(uint32, tag = "2")]
        Index(u32),
    }
}

/// An error attributed to a node.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Error {
    /// Reported message.
    #[prost(string, tag = "1")]
    pub message: String,
    /// Source locations.
    #[prost(message, repeated, tag = "2")]
    pub location: Vec<Location>,
    /// Offset at which the error occurred; not populated by this crate.
    #[prost(uint64, tag = "3")]
    pub time_ns: u64,
    /// JSON form of the full error.
    #[prost(string, tag = "4")]
    pub json: String,
}

/// A `(line, column)` position.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Location {
    /// 1-based line.
    #[prost(uint32, tag = "1")]
    pub line: u32,
    /// 1-based column.
    #[prost(uint32, tag = "2")]
    pub column: u32,
}
