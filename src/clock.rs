//! Clock sources for trace timing.
//!
//! A trace needs two readings: a monotonic nanosecond counter for field
//! offsets and the overall duration, and a wall-clock timestamp for the
//! trace's start and end. Both come from a [`TraceClock`] injected into the
//! tree, so tests can drive time explicitly with [`ManualClock`].

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: i32 = 1_000_000_000;

#[inline]
fn duration_to_nanos_saturating(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// A wall-clock instant as seconds and sub-second nanoseconds since the
/// Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallTimestamp {
    /// Whole seconds since the Unix epoch.
    pub seconds: i64,
    /// Nanoseconds past `seconds`, in `0..1_000_000_000`.
    pub nanos: i32,
}

impl WallTimestamp {
    /// Builds a timestamp, normalizing `nanos` into `0..1_000_000_000` and
    /// carrying the excess (or deficit) into `seconds`, saturating at the
    /// bounds of `i64`.
    #[must_use]
    pub const fn new(seconds: i64, nanos: i32) -> Self {
        Self {
            seconds: seconds.saturating_add(nanos.div_euclid(NANOS_PER_SEC) as i64),
            nanos: nanos.rem_euclid(NANOS_PER_SEC),
        }
    }

    /// Converts a `SystemTime`. Times before the epoch clamp to the epoch.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            seconds: i64::try_from(since_epoch.as_secs()).unwrap_or(i64::MAX),
            // subsec_nanos is always below 1e9 and fits in i32
            nanos: i32::try_from(since_epoch.subsec_nanos()).unwrap_or(0),
        }
    }

    /// Returns this timestamp shifted forward by `nanos`.
    #[must_use]
    pub fn add_nanos(self, nanos: u64) -> Self {
        let total = i128::from(self.nanos) + i128::from(nanos);
        let carry = i64::try_from(total / 1_000_000_000).unwrap_or(i64::MAX);
        Self {
            seconds: self.seconds.saturating_add(carry),
            nanos: i32::try_from(total % 1_000_000_000).unwrap_or(0),
        }
    }
}

/// Time source abstraction for trace timing.
///
/// Implementations must be monotonic in [`now_nanos`](Self::now_nanos); the
/// epoch of that counter is arbitrary since the tree only uses differences.
pub trait TraceClock: Send + Sync {
    /// Monotonic reading in nanoseconds.
    fn now_nanos(&self) -> u64;

    /// Current wall-clock time.
    fn wall_now(&self) -> WallTimestamp;
}

/// Production clock: `Instant` for offsets, `SystemTime` for timestamps.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Creates a new system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceClock for SystemClock {
    fn now_nanos(&self) -> u64 {
        duration_to_nanos_saturating(self.epoch.elapsed())
    }

    fn wall_now(&self) -> WallTimestamp {
        WallTimestamp::from_system_time(SystemTime::now())
    }
}

/// Manually driven clock for deterministic tests.
///
/// The monotonic counter only moves when [`advance`](Self::advance) is
/// called; the wall clock moves with it from a fixed base.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
    wall_seconds: AtomicI64,
}

impl ManualClock {
    /// Creates a clock at monotonic zero with the wall clock at the epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock whose wall time starts at `seconds` past the epoch.
    #[must_use]
    pub fn with_wall_seconds(seconds: i64) -> Self {
        Self {
            nanos: AtomicU64::new(0),
            wall_seconds: AtomicI64::new(seconds),
        }
    }

    /// Moves both readings forward.
    pub fn advance(&self, by: Duration) {
        self.advance_nanos(duration_to_nanos_saturating(by));
    }

    /// Moves both readings forward by `nanos`.
    pub fn advance_nanos(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::AcqRel);
    }
}

impl TraceClock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::Acquire)
    }

    fn wall_now(&self) -> WallTimestamp {
        WallTimestamp::new(self.wall_seconds.load(Ordering::Acquire), 0)
            .add_nanos(self.nanos.load(Ordering::Acquire))
    }
}
