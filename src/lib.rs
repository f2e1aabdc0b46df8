//! Fieldtrace: per-field timing and error traces for hierarchical query execution.
//!
//! # Overview
//!
//! A query executor resolves a response field by field, often with sibling
//! fields running concurrently. Fieldtrace records, for every resolved field,
//! its type information, start/end offsets relative to the start of the
//! execution, and the errors attributed to that field. When the executor
//! produces its result, the trace is sealed exactly once and encoded into
//! the collector's binary `Trace` schema, then base64-wrapped so it can ride
//! inside a text response envelope.
//!
//! # Core Guarantees
//!
//! - **Lazy ancestry**: a field (or error) at any depth materializes its whole
//!   ancestor chain, even if the ancestors never reported their own start
//! - **One-shot seal**: [`TraceTree::finalize`] succeeds once; late opens and
//!   closes after it are silent no-ops, never corruption
//! - **Loud contract violations**: double finalize, errors after finalize and
//!   errors on unknown paths are returned as [`TraceError`]s
//! - **Deterministic testing**: timing flows through an injected [`TraceClock`]
//!
//! # Module Structure
//!
//! - [`path`]: Response path segments and their canonical string keys
//! - [`clock`]: Monotonic and wall clock sources
//! - [`tree`]: Trace tree assembly (nodes, registry, lifecycle operations)
//! - [`error_record`]: Host errors and the records attached to nodes
//! - [`rewrite`]: Error reporting policies (unmodified, masked, custom hook)
//! - [`wire`]: Protobuf messages shared with the trace collector
//! - [`encode`]: Finalized trace to bytes and base64, and back
//! - [`inline`]: Per-execution glue for host executors
//! - [`config`]: Configuration with environment and file overrides
//! - [`error`](mod@error): Error types
//! - [`tracing_compat`]: Optional tracing integration (requires `tracing-integration` feature)
//!
//! # Example
//!
//! ```
//! use fieldtrace::{FieldInfo, ManualClock, ResponsePath, TraceTree};
//! use std::sync::Arc;
//!
//! let clock = Arc::new(ManualClock::new());
//! let tree = TraceTree::new(clock.clone());
//!
//! let user = ResponsePath::root().field("user");
//! let handle = tree.open(&FieldInfo::new(user, "user", "User", "Query"));
//! clock.advance_nanos(250);
//! tree.close(handle);
//!
//! let finalized = tree.finalize().expect("first finalize succeeds");
//! let encoded = fieldtrace::encode::encode_trace_base64(&finalized);
//! assert!(!encoded.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod clock;
pub mod config;
pub mod encode;
pub mod error;
pub mod error_record;
pub mod inline;
pub mod path;
pub mod rewrite;
pub mod tracing_compat;
pub mod tree;
pub mod wire;

pub use clock::{ManualClock, SystemClock, TraceClock, WallTimestamp};
pub use config::{ConfigError, ErrorMode, TraceConfig};
pub use error::{Result, TraceError};
pub use error_record::{ErrorRecord, ExecutionError, SourceLocation};
pub use inline::{
    ExecutionResult, ExecutionTrace, FederatedTraceHeader, InlineTracer, RequestContext,
    TracePredicate,
};
pub use path::{PathSegment, ResponsePath};
pub use rewrite::{ErrorPolicy, RewriteHook};
pub use tree::{FieldHandle, FieldInfo, FinalizedNode, FinalizedTrace, NodeKey, TraceTree};
