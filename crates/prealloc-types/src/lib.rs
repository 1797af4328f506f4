#![forbid(unsafe_code)]
//! Shared vocabulary for prealloc: byte sizes, filler-unit geometry, fill
//! modes, unit names, and the two clock seams the rest of the workspace
//! injects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// Name of the reserved directory under the volume root.
pub const RESERVED_DIR_NAME: &str = ".preallocation";

/// Bytes per write call when filling a unit.
pub const CHUNK_BYTES: u64 = MIB;

/// Write calls per unit. `CHUNK_BYTES * CHUNKS_PER_UNIT == GIB`.
pub const CHUNKS_PER_UNIT: u64 = 1024;

/// How far below a full unit a file may be and still count as one.
pub const RECLAIM_SLACK_BYTES: u64 = 128 * MIB;

/// A single unit operation slower than this stops the run.
pub const SLOW_UNIT_LIMIT: Duration = Duration::from_secs(10 * 60);

// ── Unit geometry ───────────────────────────────────────────────────────────

/// Shape of a filler unit on disk.
///
/// Production code always uses [`UnitGeometry::GIB`]. Smaller geometries
/// exist so the allocator and reclaimer can be exercised without writing
/// gigabytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitGeometry {
    pub chunk_bytes: u64,
    pub chunks_per_unit: u64,
    pub reclaim_slack_bytes: u64,
}

impl UnitGeometry {
    /// 1024 x 1 MiB units; files of at least 896 MiB are reclaimable.
    pub const GIB: Self = Self {
        chunk_bytes: CHUNK_BYTES,
        chunks_per_unit: CHUNKS_PER_UNIT,
        reclaim_slack_bytes: RECLAIM_SLACK_BYTES,
    };

    #[must_use]
    pub const fn unit_bytes(&self) -> u64 {
        self.chunk_bytes * self.chunks_per_unit
    }

    /// Smallest file size the reclaimer treats as a complete unit.
    #[must_use]
    pub const fn min_reclaim_bytes(&self) -> u64 {
        self.unit_bytes().saturating_sub(self.reclaim_slack_bytes)
    }
}

impl Default for UnitGeometry {
    fn default() -> Self {
        Self::GIB
    }
}

// ── Fill mode ───────────────────────────────────────────────────────────────

/// Content written into each chunk of a new unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    #[default]
    Zero,
    /// Bytes from the operating system CSPRNG, regenerated per chunk.
    Random,
}

impl FillMode {
    #[must_use]
    pub fn from_random_flag(random: bool) -> Self {
        if random { Self::Random } else { Self::Zero }
    }
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => f.write_str("zero"),
            Self::Random => f.write_str("random"),
        }
    }
}

// ── Unit names ──────────────────────────────────────────────────────────────

/// File name of a filler unit: lowercase hex of nanoseconds since the Unix
/// epoch, no padding.
///
/// Ordering is the derived `String` ordering, i.e. lexicographic. Names of
/// different lengths therefore do not sort numerically, and callers must not
/// pretend they do.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitName(String);

impl UnitName {
    #[must_use]
    pub fn from_unix_nanos(nanos: u128) -> Self {
        Self(format!("{nanos:x}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UnitName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Clocks ──────────────────────────────────────────────────────────────────

/// Wall-clock source for unit names.
///
/// Returns `None` when the clock reads earlier than the Unix epoch.
pub trait NameClock {
    fn unix_nanos(&self) -> Option<u128>;

    fn next_name(&self) -> Option<UnitName> {
        self.unix_nanos().map(UnitName::from_unix_nanos)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNameClock;

impl NameClock for SystemNameClock {
    fn unix_nanos(&self) -> Option<u128> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|since| since.as_nanos())
    }
}

/// Monotonic time source used to measure unit operations.
///
/// `now` is relative to an arbitrary fixed origin; only differences matter.
pub trait MonotonicClock {
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct InstantClock {
    origin: Instant,
}

impl InstantClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for InstantClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

impl<C: NameClock + ?Sized> NameClock for &C {
    fn unix_nanos(&self) -> Option<u128> {
        (**self).unix_nanos()
    }
}
