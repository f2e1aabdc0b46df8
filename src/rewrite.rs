//! Error reporting policies.
//!
//! Before an error is attached to the trace it passes through the tree's
//! [`ErrorPolicy`]. A custom hook may rewrite the message and extensions or
//! drop the error from the trace; it can never move an error to another
//! node or alter its locations, source or cause.

use crate::error_record::ExecutionError;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Message substituted by [`ErrorPolicy::Masked`].
pub const MASKED_MESSAGE: &str = "<masked>";

/// Extension key identifying who masked an error.
pub const MASKED_BY_KEY: &str = "maskedBy";

/// Value stored under [`MASKED_BY_KEY`].
pub const MASKED_BY: &str = "fieldtrace";

/// User-supplied error rewrite. Returning `None` drops the error from the trace.
pub type RewriteHook = Arc<dyn Fn(ExecutionError) -> Option<ExecutionError> + Send + Sync>;

/// How errors are reported in the trace.
#[derive(Clone, Default)]
pub enum ErrorPolicy {
    /// Report errors exactly as the executor produced them.
    #[default]
    Unmodified,
    /// Replace message and extensions with a fixed placeholder.
    Masked,
    /// Pass a copy of each error through a hook.
    Transform(RewriteHook),
}

impl ErrorPolicy {
    /// Wraps a closure as a transform policy.
    #[must_use]
    pub fn transform<F>(hook: F) -> Self
    where
        F: Fn(ExecutionError) -> Option<ExecutionError> + Send + Sync + 'static,
    {
        Self::Transform(Arc::new(hook))
    }

    /// Applies the policy. `None` means the error is not reported.
    #[must_use]
    pub fn apply(&self, error: &ExecutionError) -> Option<ExecutionError> {
        match self {
            Self::Unmodified => Some(error.clone()),
            Self::Masked => {
                let mut extensions = Map::new();
                extensions.insert(MASKED_BY_KEY.to_owned(), Value::from(MASKED_BY));
                let masked = ExecutionError::new(MASKED_MESSAGE);
                Some(error.merge_cosmetic(masked.with_extensions(extensions)))
            }
            Self::Transform(hook) => {
                let rewritten = hook(error.clone())?;
                Some(error.merge_cosmetic(rewritten))
            }
        }
    }
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmodified => f.write_str("Unmodified"),
            Self::Masked => f.write_str("Masked"),
            Self::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}
