//! Error types for trace assembly and encoding.
//!
//! Only caller contract violations and codec failures are errors. Skip
//! conditions (federated errors, errors dropped by a rewrite hook,
//! incremental results) and late events after finalize are handled by
//! omission and never surface here.

use thiserror::Error;

/// An error from trace assembly, encoding or decoding.
#[derive(Debug, Error)]
pub enum TraceError {
    /// `finalize` was called on a tree that was already finalized.
    #[error("trace was already finalized")]
    AlreadyFinalized,

    /// An error was attached after the trace was finalized.
    #[error("cannot attach an error after the trace was finalized")]
    ErrorAfterFinalize,

    /// An error carried a path for which no node was ever opened.
    #[error("could not find node with path {path}")]
    UnknownPath {
        /// Dotted form of the offending path.
        path: String,
    },

    /// The response side channel already held a value under this key.
    #[error("the `{key}` extension was already present")]
    SideChannelOccupied {
        /// The side-channel key.
        key: String,
    },

    /// An error could not be serialized for the collector.
    #[error("failed to serialize error for trace: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The transport envelope was not valid base64.
    #[error("invalid base64 trace envelope: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The payload did not decode as a trace message.
    #[error("invalid trace payload: {0}")]
    Decode(#[from] prost::DecodeError),
}

impl TraceError {
    /// Returns `true` if this error means the caller broke the trace protocol
    /// (as opposed to a serialization or decoding failure).
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyFinalized
                | Self::ErrorAfterFinalize
                | Self::UnknownPath { .. }
                | Self::SideChannelOccupied { .. }
        )
    }
}

/// Result type for trace operations.
pub type Result<T> = std::result::Result<T, TraceError>;
