//! Trace tree assembly.
//!
//! A [`TraceTree`] collects one execution's field events into a tree of
//! nodes keyed by response path. Fields are opened and closed as the host
//! resolves them, errors are attached by path, and [`TraceTree::finalize`]
//! seals the tree once and hands back an immutable [`FinalizedTrace`].
//!
//! # Concurrency
//!
//! Every operation takes `&self`; the registry and the finalized flag sit
//! behind one mutex, so the seal is linearizable: an `open` or `close` that
//! acquires the lock after `finalize` sees the flag and does nothing.
//! Executors cannot cancel resolvers that are still running when the result
//! is shipped, so those late events are expected and silent.
//!
//! `attach_error` after `finalize`, a second `finalize`, and an error path
//! with no node are caller bugs and return [`TraceError`]s.

mod node;
mod registry;

pub use node::{FinalizedNode, NodeId, NodeKey, TraceNode};
pub use registry::NodeRegistry;

use crate::clock::{TraceClock, WallTimestamp};
use crate::error::{Result, TraceError};
use crate::error_record::{ErrorRecord, ExecutionError};
use crate::path::{PathSegment, ResponsePath};
use crate::rewrite::ErrorPolicy;
use crate::tracing_compat::{debug, trace, warn};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// What the host knows about a field when it starts resolving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Position in the response; the last segment is the response key.
    pub path: ResponsePath,
    /// Name of the field in the schema (differs from the key when aliased).
    pub field_name: String,
    /// Declared return type, e.g. `[User!]!`.
    pub type_name: String,
    /// Type that declares the field.
    pub parent_type_name: String,
}

impl FieldInfo {
    /// Describes a field.
    #[must_use]
    pub fn new(
        path: ResponsePath,
        field_name: impl Into<String>,
        type_name: impl Into<String>,
        parent_type_name: impl Into<String>,
    ) -> Self {
        Self {
            path,
            field_name: field_name.into(),
            type_name: type_name.into(),
            parent_type_name: parent_type_name.into(),
        }
    }

    /// The underlying field name if the response key is an alias for it.
    #[must_use]
    pub fn alias_of(&self) -> Option<&str> {
        match self.path.last() {
            Some(PathSegment::Name(key)) if *key != self.field_name => Some(&self.field_name),
            _ => None,
        }
    }
}

/// Token returned by [`TraceTree::open`] and consumed by [`TraceTree::close`].
///
/// A handle obtained after finalize is inert. Handles are only meaningful
/// for the tree that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a field handle must be closed to record the field's end time"]
pub struct FieldHandle {
    node: Option<NodeId>,
}

impl FieldHandle {
    /// A handle whose close does nothing.
    pub const fn noop() -> Self {
        Self { node: None }
    }

    /// Returns `true` if closing this handle has no effect.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.node.is_none()
    }

    /// The node this handle closes, if any.
    #[must_use]
    pub const fn node(&self) -> Option<NodeId> {
        self.node
    }
}

/// The sealed result of a traced execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTrace {
    /// Root of the field tree.
    pub root: FinalizedNode,
    /// Monotonic time from tree creation to finalize.
    pub duration_nanos: u64,
    /// Wall clock at tree creation.
    pub wall_start: WallTimestamp,
    /// Wall clock at finalize.
    pub wall_end: WallTimestamp,
}

impl FinalizedTrace {
    /// Finds the node at `path`.
    #[must_use]
    pub fn find(&self, path: &ResponsePath) -> Option<&FinalizedNode> {
        path.segments()
            .iter()
            .try_fold(&self.root, |node, segment| node.child(segment))
    }

    /// Total number of nodes, including the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.root.subtree_len()
    }

    /// Total number of errors across all nodes.
    #[must_use]
    pub fn error_count(&self) -> usize {
        fn count(node: &FinalizedNode) -> usize {
            node.errors.len() + node.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }
}

#[derive(Debug)]
struct TreeState {
    registry: NodeRegistry,
    finalized: bool,
}

/// The trace for one execution, under construction.
pub struct TraceTree {
    clock: Arc<dyn TraceClock>,
    policy: ErrorPolicy,
    start_nanos: u64,
    wall_start: WallTimestamp,
    state: Mutex<TreeState>,
}

impl TraceTree {
    /// Starts a trace now, reading both clocks once.
    #[must_use]
    pub fn new(clock: Arc<dyn TraceClock>) -> Self {
        let start_nanos = clock.now_nanos();
        let wall_start = clock.wall_now();
        Self {
            clock,
            policy: ErrorPolicy::default(),
            start_nanos,
            wall_start,
            state: Mutex::new(TreeState {
                registry: NodeRegistry::new(),
                finalized: false,
            }),
        }
    }

    /// Sets how attached errors are reported.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The error policy in effect.
    #[must_use]
    pub fn error_policy(&self) -> &ErrorPolicy {
        &self.policy
    }

    /// Wall clock at tree creation.
    #[must_use]
    pub fn wall_start(&self) -> WallTimestamp {
        self.wall_start
    }

    /// Returns `true` once [`finalize`](Self::finalize) has succeeded.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state.lock().finalized
    }

    /// Number of nodes created so far, including the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    fn elapsed_nanos(&self) -> i64 {
        let elapsed = self.clock.now_nanos().saturating_sub(self.start_nanos);
        i64::try_from(elapsed).unwrap_or(i64::MAX)
    }

    /// Records the start of a field.
    ///
    /// The node (and any missing ancestors) is created if needed, then
    /// stamped with type information and the start offset. After finalize
    /// this does nothing and returns an inert handle.
    pub fn open(&self, field: &FieldInfo) -> FieldHandle {
        let offset = self.elapsed_nanos();
        let mut state = self.state.lock();
        if state.finalized {
            trace!(path = %field.path, "open after finalize ignored");
            return FieldHandle::noop();
        }

        let id = state.registry.ensure(&field.path);
        if id == NodeId::ROOT && !field.path.is_root() {
            warn!(path = ?field.path, "field path shares the root key; ignored");
            return FieldHandle::noop();
        }
        let Some(node) = state.registry.get_mut(id) else {
            return FieldHandle::noop();
        };
        node.type_name = Some(field.type_name.clone());
        node.parent_type_name = Some(field.parent_type_name.clone());
        node.start_offset_nanos = Some(offset);
        if let Some(original) = field.alias_of() {
            node.original_field_name = Some(original.to_owned());
        }
        trace!(path = %field.path, offset, "field opened");

        FieldHandle { node: Some(id) }
    }

    /// Records the end of a field opened with [`open`](Self::open).
    ///
    /// Does nothing for inert handles or once the tree is finalized.
    pub fn close(&self, handle: FieldHandle) {
        let Some(id) = handle.node else {
            return;
        };
        let offset = self.elapsed_nanos();
        let mut state = self.state.lock();
        if state.finalized {
            trace!(node = id.index(), "close after finalize ignored");
            return;
        }
        if let Some(node) = state.registry.get_mut(id) {
            node.end_offset_nanos = Some(offset);
            trace!(node = id.index(), offset, "field closed");
        }
    }

    /// Attaches an execution error to the node at its path, or to the root
    /// when it has no path.
    ///
    /// Errors already traced by a nested execution are skipped, and the
    /// tree's [`ErrorPolicy`] may rewrite or drop the error. The node must
    /// already exist: an error for a path that was never opened means the
    /// result and the trace disagree, and is returned as
    /// [`TraceError::UnknownPath`].
    pub fn attach_error(&self, error: &ExecutionError) -> Result<()> {
        if self.state.lock().finalized {
            warn!(error = %error, "error attached after finalize");
            return Err(TraceError::ErrorAfterFinalize);
        }
        if error.is_federated() {
            debug!(error = %error, "skipping error traced by nested execution");
            return Ok(());
        }

        // The policy may run user code, so it runs without the lock held.
        let Some(reported) = self.policy.apply(error) else {
            debug!(error = %error, "error dropped by rewrite policy");
            return Ok(());
        };
        let record = ErrorRecord::from_error(&reported)?;

        let mut state = self.state.lock();
        if state.finalized {
            warn!(error = %error, "error attached after finalize");
            return Err(TraceError::ErrorAfterFinalize);
        }
        let id = match reported.path() {
            None => NodeId::ROOT,
            Some(path) => state.registry.lookup(path).ok_or_else(|| {
                warn!(path = %path, "error path has no trace node");
                TraceError::UnknownPath { path: path.key() }
            })?,
        };
        if let Some(node) = state.registry.get_mut(id) {
            node.errors.push(record);
        }
        Ok(())
    }

    /// Attaches each error in order, stopping at the first failure.
    pub fn attach_errors<'a, I>(&self, errors: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a ExecutionError>,
    {
        errors
            .into_iter()
            .try_for_each(|error| self.attach_error(error))
    }

    /// Seals the tree and returns its immutable snapshot.
    ///
    /// Succeeds exactly once; later calls return
    /// [`TraceError::AlreadyFinalized`].
    pub fn finalize(&self) -> Result<FinalizedTrace> {
        let mut state = self.state.lock();
        if state.finalized {
            warn!("trace finalized twice");
            return Err(TraceError::AlreadyFinalized);
        }
        state.finalized = true;

        let duration_nanos = self.clock.now_nanos().saturating_sub(self.start_nanos);
        let wall_end = self.clock.wall_now();
        let root = state.registry.snapshot(NodeId::ROOT);
        drop(state);

        debug!(nodes = root.subtree_len(), duration_nanos, "trace finalized");
        Ok(FinalizedTrace {
            root,
            duration_nanos,
            wall_start: self.wall_start,
            wall_end,
        })
    }
}

impl fmt::Debug for TraceTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TraceTree")
            .field("policy", &self.policy)
            .field("start_nanos", &self.start_nanos)
            .field("wall_start", &self.wall_start)
            .field("nodes", &state.registry.len())
            .field("finalized", &state.finalized)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error_record::FEDERATION_MARKER_KEY;

    fn tree() -> (Arc<ManualClock>, TraceTree) {
        let clock = Arc::new(ManualClock::with_wall_seconds(1_000));
        let tree = TraceTree::new(clock.clone());
        (clock, tree)
    }

    fn path(segments: &[&str]) -> ResponsePath {
        segments.iter().copied().collect()
    }

    #[test]
    fn open_close_stamps_offsets() {
        let (clock, tree) = tree();
        clock.advance_nanos(100);
        let handle = tree.open(&FieldInfo::new(path(&["user"]), "user", "User", "Query"));
        clock.advance_nanos(50);
        tree.close(handle);
        clock.advance_nanos(10);

        let trace = tree.finalize().expect("finalize");
        let user = trace.find(&path(&["user"])).expect("user node");
        assert_eq!(user.start_offset_nanos, Some(100));
        assert_eq!(user.end_offset_nanos, Some(150));
        assert_eq!(user.type_name.as_deref(), Some("User"));
        assert_eq!(user.parent_type_name.as_deref(), Some("Query"));
        assert_eq!(trace.duration_nanos, 160);
        assert_eq!(trace.wall_start, WallTimestamp::new(1_000, 0));
        assert_eq!(trace.wall_end, WallTimestamp::new(1_000, 160));
    }

    #[test]
    fn alias_sets_original_field_name() {
        let (_, tree) = tree();
        let _ = tree.open(&FieldInfo::new(path(&["u"]), "user", "User", "Query"));
        let _ = tree.open(&FieldInfo::new(path(&["me"]), "me", "User", "Query"));

        let trace = tree.finalize().expect("finalize");
        let u = trace.find(&path(&["u"])).expect("u");
        assert_eq!(u.original_field_name.as_deref(), Some("user"));
        let me = trace.find(&path(&["me"])).expect("me");
        assert_eq!(me.original_field_name, None);
    }

    #[test]
    fn opening_lazily_created_ancestor_fills_it_in() {
        let (_, tree) = tree();
        let _ = tree.open(&FieldInfo::new(path(&["a", "b"]), "b", "Int", "A"));
        assert_eq!(tree.node_count(), 3);

        let _ = tree.open(&FieldInfo::new(path(&["a"]), "a", "A", "Query"));
        assert_eq!(tree.node_count(), 3);

        let trace = tree.finalize().expect("finalize");
        let a = trace.find(&path(&["a"])).expect("a");
        assert_eq!(a.type_name.as_deref(), Some("A"));
        assert_eq!(a.children.len(), 1);
    }

    #[test]
    fn empty_response_key_does_not_touch_root() {
        let (_, tree) = tree();
        let path = ResponsePath::from(vec![PathSegment::Name(String::new())]);
        let handle = tree.open(&FieldInfo::new(path, "", "T", "Query"));
        assert!(handle.is_noop());
        tree.close(handle);

        let trace = tree.finalize().expect("finalize");
        assert_eq!(trace.node_count(), 1);
        assert_eq!(trace.root.type_name, None);
        assert_eq!(trace.root.start_offset_nanos, None);
    }

    #[test]
    fn late_events_are_ignored() {
        let (_, tree) = tree();
        let handle = tree.open(&FieldInfo::new(path(&["slow"]), "slow", "Int", "Query"));
        let trace = tree.finalize().expect("finalize");

        tree.close(handle);
        let late = tree.open(&FieldInfo::new(path(&["late"]), "late", "Int", "Query"));
        assert!(late.is_noop());
        tree.close(late);

        assert_eq!(tree.node_count(), 2);
        let slow = trace.find(&path(&["slow"])).expect("slow");
        assert_eq!(slow.end_offset_nanos, None);
    }

    #[test]
    fn double_finalize_is_rejected() {
        let (_, tree) = tree();
        tree.finalize().expect("first finalize");
        assert!(matches!(tree.finalize(), Err(TraceError::AlreadyFinalized)));
    }

    #[test]
    fn error_without_path_goes_to_root() {
        let (_, tree) = tree();
        tree.attach_error(&ExecutionError::new("syntax"))
            .expect("attach");
        let trace = tree.finalize().expect("finalize");
        assert_eq!(trace.root.errors.len(), 1);
        assert_eq!(trace.root.errors[0].message, "syntax");
    }

    #[test]
    fn error_on_unknown_path_is_fatal() {
        let (_, tree) = tree();
        let err = tree
            .attach_error(&ExecutionError::new("lost").with_path(path(&["nowhere", "x"])))
            .expect_err("unknown path");
        assert!(matches!(err, TraceError::UnknownPath { ref path } if path == "nowhere.x"));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn error_after_finalize_is_fatal() {
        let (_, tree) = tree();
        tree.finalize().expect("finalize");
        let err = tree
            .attach_error(&ExecutionError::new("late"))
            .expect_err("after finalize");
        assert!(matches!(err, TraceError::ErrorAfterFinalize));
    }

    #[test]
    fn federated_error_is_skipped_even_on_unknown_path() {
        let (_, tree) = tree();
        let error = ExecutionError::new("from subgraph")
            .with_path(path(&["remote"]))
            .with_extension(FEDERATION_MARKER_KEY, "reviews");
        tree.attach_error(&error).expect("skip is not an error");
        let trace = tree.finalize().expect("finalize");
        assert_eq!(trace.error_count(), 0);
    }

    #[test]
    fn masked_policy_applies() {
        let clock = Arc::new(ManualClock::new());
        let tree = TraceTree::new(clock).with_error_policy(ErrorPolicy::Masked);
        let _ = tree.open(&FieldInfo::new(path(&["x"]), "x", "Int", "Query"));
        tree.attach_error(&ExecutionError::new("secret").with_path(path(&["x"])))
            .expect("attach");

        let trace = tree.finalize().expect("finalize");
        let x = trace.find(&path(&["x"])).expect("x");
        assert_eq!(x.errors[0].message, crate::rewrite::MASKED_MESSAGE);
        assert!(!x.errors[0].json.contains("secret"));
    }

    #[test]
    fn attach_errors_stops_at_first_failure() {
        let (_, tree) = tree();
        let errors = [
            ExecutionError::new("first"),
            ExecutionError::new("bad").with_path(path(&["missing"])),
            ExecutionError::new("never"),
        ];
        assert!(tree.attach_errors(&errors).is_err());
        let trace = tree.finalize().expect("finalize");
        assert_eq!(trace.root.errors.len(), 1);
    }
}
