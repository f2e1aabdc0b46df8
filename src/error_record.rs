//! Host execution errors and the records attached to trace nodes.
//!
//! [`ExecutionError`] is the value the host executor reports for a failed
//! field: message, source locations, response path, structured extensions,
//! and optionally the source name and underlying cause. Cloning it is an
//! explicit field-by-field value copy.
//!
//! [`ErrorRecord`] is what a trace node keeps: the message, the locations,
//! and the full JSON form of the error for the collector.

use crate::path::ResponsePath;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Extension key marking an error already reported by a nested (federated)
/// execution's own trace.
pub const FEDERATION_MARKER_KEY: &str = "serviceName";

/// A `(line, column)` position in the query document, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

impl SourceLocation {
    /// Creates a location.
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Underlying cause of an execution error.
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync>;

/// An error produced while executing a query.
#[derive(Clone, Serialize)]
pub struct ExecutionError {
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    locations: Vec<SourceLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<ResponsePath>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    extensions: Map<String, Value>,
    #[serde(skip)]
    source_name: Option<String>,
    #[serde(skip)]
    cause: Option<ErrorCause>,
}

impl ExecutionError {
    /// Creates an error with only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: Map::new(),
            source_name: None,
            cause: None,
        }
    }

    /// Sets the response path the error belongs to.
    #[must_use]
    pub fn with_path(mut self, path: ResponsePath) -> Self {
        self.path = Some(path);
        self
    }

    /// Adds a source location.
    #[must_use]
    pub fn with_location(mut self, line: u32, column: u32) -> Self {
        self.locations.push(SourceLocation::new(line, column));
        self
    }

    /// Adds a structured extension entry.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Replaces all extensions.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Map<String, Value>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Sets the name of the document the locations refer to.
    #[must_use]
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// Sets the underlying cause.
    #[must_use]
    pub fn with_cause(mut self, cause: ErrorCause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Replaces the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source locations, in reported order.
    #[must_use]
    pub fn locations(&self) -> &[SourceLocation] {
        &self.locations
    }

    /// The response path, if the error belongs to a field.
    #[must_use]
    pub fn path(&self) -> Option<&ResponsePath> {
        self.path.as_ref()
    }

    /// Structured extensions.
    #[must_use]
    pub fn extensions(&self) -> &Map<String, Value> {
        &self.extensions
    }

    /// Name of the source document, if known.
    #[must_use]
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// The underlying cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }

    /// Returns `true` if a nested execution already traced this error.
    #[must_use]
    pub fn is_federated(&self) -> bool {
        self.extensions.contains_key(FEDERATION_MARKER_KEY)
    }

    /// Builds an error carrying `message` and `extensions` from `rewritten`
    /// and every other field from `self`.
    #[must_use]
    pub(crate) fn merge_cosmetic(&self, rewritten: Self) -> Self {
        Self {
            message: rewritten.message,
            extensions: rewritten.extensions,
            locations: self.locations.clone(),
            path: self.path.clone(),
            source_name: self.source_name.clone(),
            cause: self.cause.clone(),
        }
    }
}

impl fmt::Debug for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionError")
            .field("message", &self.message)
            .field("locations", &self.locations)
            .field("path", &self.path)
            .field("extensions", &self.extensions)
            .field("source_name", &self.source_name)
            .field("cause", &self.cause.as_ref().map(ToString::to_string))
            .finish()
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(path) = &self.path {
            write!(f, " (at {path})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// An error as recorded on a trace node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// The message reported to the collector.
    pub message: String,
    /// Source locations, in reported order.
    pub locations: Vec<SourceLocation>,
    /// Full JSON serialization of the reported error.
    pub json: String,
}

impl ErrorRecord {
    /// Captures `error` for a trace node.
    pub fn from_error(error: &ExecutionError) -> crate::Result<Self> {
        Ok(Self {
            message: error.message.clone(),
            locations: error.locations.clone(),
            json: serde_json::to_string(error)?,
        })
    }
}
