#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! #[macro_use]
//! mod common;
//! ```

use fieldtrace::{FieldInfo, ManualClock, ResponsePath, TraceTree};
use std::sync::{Arc, Once};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Wall-clock seconds the test clocks start at.
pub const TEST_WALL_SECONDS: i64 = 1_700_000_000;

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// A tree driven by a manual clock.
#[must_use]
pub fn manual_tree() -> (Arc<ManualClock>, TraceTree) {
    let clock = Arc::new(ManualClock::with_wall_seconds(TEST_WALL_SECONDS));
    let tree = TraceTree::new(clock.clone());
    (clock, tree)
}

/// Builds a path from field names; digits become list indices.
#[must_use]
pub fn path(segments: &[&str]) -> ResponsePath {
    let mut path = ResponsePath::root();
    for segment in segments {
        match segment.parse::<usize>() {
            Ok(index) => path.push(index),
            Err(_) => path.push(*segment),
        }
    }
    path
}

/// Field info for an unaliased field at `segments`.
#[must_use]
pub fn field(segments: &[&str], type_name: &str, parent_type: &str) -> FieldInfo {
    let path = path(segments);
    let name = path
        .last()
        .and_then(|segment| segment.as_name())
        .unwrap_or_default()
        .to_owned();
    FieldInfo::new(path, name, type_name, parent_type)
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log test completion.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
}
