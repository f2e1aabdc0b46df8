//! Per-execution glue between a query executor and the trace tree.
//!
//! An [`InlineTracer`] is built once from a [`TraceConfig`] and decides, per
//! request, whether to trace. For a traced request it hands out an
//! [`ExecutionTrace`], which the executor feeds with field start/end events.
//! When the result is ready, [`ExecutionTrace::will_send_response`] attributes
//! the result's errors to their fields, seals the trace and stores the base64
//! encoding in the response's extensions under the configured key.
//!
//! Incremental (streamed) results are not traced; the trace is discarded and
//! the response left untouched.

use crate::clock::{SystemClock, TraceClock};
use crate::config::TraceConfig;
use crate::encode::encode_trace_base64;
use crate::error::{Result, TraceError};
use crate::error_record::ExecutionError;
use crate::rewrite::ErrorPolicy;
use crate::tracing_compat::{debug, warn};
use crate::tree::{FieldHandle, FieldInfo, FinalizedTrace, TraceTree};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Header a gateway sends to ask a subgraph for an inline trace.
pub const INCLUDE_TRACE_HEADER: &str = "apollo-federation-include-trace";

/// Header value requesting the `ftv1` trace format.
pub const INCLUDE_TRACE_FTV1: &str = "ftv1";

/// Request metadata visible to trace predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    headers: BTreeMap<String, String>,
}

impl RequestContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header. Names are case-insensitive.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Looks up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Decides whether a request is traced.
pub trait TracePredicate: Send + Sync {
    /// Returns `true` to trace this request.
    fn should_trace(&self, request: &RequestContext) -> bool;
}

impl<F> TracePredicate for F
where
    F: Fn(&RequestContext) -> bool + Send + Sync,
{
    fn should_trace(&self, request: &RequestContext) -> bool {
        self(request)
    }
}

/// Traces requests carrying `apollo-federation-include-trace: ftv1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FederatedTraceHeader;

impl TracePredicate for FederatedTraceHeader {
    fn should_trace(&self, request: &RequestContext) -> bool {
        request.header(INCLUDE_TRACE_HEADER) == Some(INCLUDE_TRACE_FTV1)
    }
}

/// Traces every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl TracePredicate for Always {
    fn should_trace(&self, _request: &RequestContext) -> bool {
        true
    }
}

/// The executor's result, as far as tracing is concerned.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Response data.
    pub data: Option<Value>,
    /// Errors reported to the client.
    pub errors: Vec<ExecutionError>,
    /// Response extensions; the encoded trace is stored here.
    pub extensions: Map<String, Value>,
    /// `true` if the result is delivered incrementally.
    pub incremental: bool,
}

impl ExecutionResult {
    /// A complete (non-incremental) result.
    #[must_use]
    pub fn new(data: Option<Value>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}

/// Builds an [`ExecutionTrace`] for each traced request.
#[derive(Clone)]
pub struct InlineTracer {
    config: TraceConfig,
    predicate: Arc<dyn TracePredicate>,
    policy: ErrorPolicy,
    clock: Arc<dyn TraceClock>,
}

impl InlineTracer {
    /// Creates a tracer from configuration.
    ///
    /// With `require_header` set the request must carry the federation trace
    /// header; otherwise every request is traced. The error policy follows
    /// the configured [`ErrorMode`](crate::config::ErrorMode).
    #[must_use]
    pub fn new(config: TraceConfig) -> Self {
        let predicate: Arc<dyn TracePredicate> = if config.require_header {
            Arc::new(FederatedTraceHeader)
        } else {
            Arc::new(Always)
        };
        let policy = config.errors.policy();
        Self {
            config,
            predicate,
            policy,
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Replaces the per-request predicate.
    #[must_use]
    pub fn with_predicate(mut self, predicate: impl TracePredicate + 'static) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Replaces the error policy, e.g. with a custom rewrite hook.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn TraceClock>) -> Self {
        self.clock = clock;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Starts a trace for `request`, or returns `None` if it is not traced.
    #[must_use]
    pub fn start(&self, request: &RequestContext) -> Option<ExecutionTrace> {
        if !self.config.enabled || !self.predicate.should_trace(request) {
            return None;
        }
        let tree = TraceTree::new(Arc::clone(&self.clock)).with_error_policy(self.policy.clone());
        Some(ExecutionTrace {
            tree: Arc::new(tree),
            extension_key: self.config.extension_key.clone(),
        })
    }
}

impl fmt::Debug for InlineTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineTracer")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// The trace of one execution. Cheap to clone; clones share the tree, so
/// concurrent resolvers can each hold one.
#[derive(Debug, Clone)]
pub struct ExecutionTrace {
    tree: Arc<TraceTree>,
    extension_key: String,
}

impl ExecutionTrace {
    /// Records that the executor started resolving `field`.
    pub fn will_resolve_field(&self, field: &FieldInfo) -> FieldHandle {
        self.tree.open(field)
    }

    /// Records that the field behind `handle` finished resolving.
    pub fn field_resolved(&self, handle: FieldHandle) {
        self.tree.close(handle);
    }

    /// The underlying tree.
    #[must_use]
    pub fn tree(&self) -> &TraceTree {
        &self.tree
    }

    /// Attributes `response.errors` to their fields, seals the trace and
    /// stores it in `response.extensions`.
    ///
    /// Returns the finalized trace, or `None` for incremental results, which
    /// are not traced. A value already present under the extension key is a
    /// [`TraceError::SideChannelOccupied`]; the response is left unchanged
    /// and the tree is not sealed.
    pub fn will_send_response(
        self,
        response: &mut ExecutionResult,
    ) -> Result<Option<FinalizedTrace>> {
        if response.incremental {
            debug!("incremental result; trace not attached");
            return Ok(None);
        }
        if response.extensions.contains_key(&self.extension_key) {
            warn!(key = %self.extension_key, "trace extension already present");
            return Err(TraceError::SideChannelOccupied {
                key: self.extension_key,
            });
        }

        self.tree.attach_errors(&response.errors)?;
        let finalized = self.tree.finalize()?;
        let encoded = encode_trace_base64(&finalized);
        debug!(
            key = %self.extension_key,
            bytes = encoded.len(),
            errors = response.errors.len(),
            "trace attached to response"
        );
        response
            .extensions
            .insert(self.extension_key, Value::String(encoded));
        Ok(Some(finalized))
    }
}
