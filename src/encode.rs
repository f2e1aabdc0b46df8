//! Encoding finalized traces for the collector.
//!
//! A [`FinalizedTrace`] is converted to the [`wire::Trace`](crate::wire::Trace)
//! message, serialized with `prost`, and wrapped in standard base64 so it can
//! travel inside a text (JSON) response. Encoding is pure and deterministic.
//! The decoders exist for consumers and for round-trip checks.

use crate::clock::WallTimestamp;
use crate::error::Result;
use crate::error_record::ErrorRecord;
use crate::tree::{FinalizedNode, FinalizedTrace, NodeKey};
use crate::wire;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use prost::Message;

fn offset_to_wire(offset: Option<i64>) -> u64 {
    offset.map_or(0, |nanos| u64::try_from(nanos).unwrap_or(0))
}

impl From<WallTimestamp> for wire::Timestamp {
    fn from(ts: WallTimestamp) -> Self {
        Self {
            seconds: ts.seconds,
            nanos: ts.nanos,
        }
    }
}

impl From<&ErrorRecord> for wire::Error {
    fn from(record: &ErrorRecord) -> Self {
        Self {
            message: record.message.clone(),
            location: record
                .locations
                .iter()
                .map(|loc| wire::Location {
                    line: loc.line,
                    column: loc.column,
                })
                .collect(),
            time_ns: 0,
            json: record.json.clone(),
        }
    }
}

impl From<&FinalizedNode> for wire::Node {
    fn from(node: &FinalizedNode) -> Self {
        let id = match &node.key {
            NodeKey::Root => None,
            NodeKey::Field(name) => Some(wire::node::Id::ResponseName(name.clone())),
            NodeKey::Index(index) => Some(wire::node::Id::Index(
                u32::try_from(*index).unwrap_or(u32::MAX),
            )),
        };
        Self {
            id,
            r#type: node.type_name.clone().unwrap_or_default(),
            start_time: offset_to_wire(node.start_offset_nanos),
            end_time: offset_to_wire(node.end_offset_nanos),
            error: node.errors.iter().map(wire::Error::from).collect(),
            child: node.children.iter().map(Self::from).collect(),
            parent_type: node.parent_type_name.clone().unwrap_or_default(),
            original_field_name: node.original_field_name.clone().unwrap_or_default(),
        }
    }
}

impl From<&FinalizedTrace> for wire::Trace {
    fn from(trace: &FinalizedTrace) -> Self {
        Self {
            end_time: Some(trace.wall_end.into()),
            start_time: Some(trace.wall_start.into()),
            duration_ns: trace.duration_nanos,
            root: Some(wire::Node::from(&trace.root)),
        }
    }
}

/// Serializes a finalized trace to protobuf bytes.
#[must_use]
pub fn encode_trace(trace: &FinalizedTrace) -> Vec<u8> {
    wire::Trace::from(trace).encode_to_vec()
}

/// Serializes a finalized trace to base64-wrapped protobuf.
#[must_use]
pub fn encode_trace_base64(trace: &FinalizedTrace) -> String {
    STANDARD.encode(encode_trace(trace))
}

/// Parses protobuf bytes produced by [`encode_trace`].
pub fn decode_trace(bytes: &[u8]) -> Result<wire::Trace> {
    Ok(wire::Trace::decode(bytes)?)
}

/// Parses a base64 envelope produced by [`encode_trace_base64`].
pub fn decode_trace_base64(text: &str) -> Result<wire::Trace> {
    let bytes = STANDARD.decode(text)?;
    decode_trace(&bytes)
}
