use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Modification timestamp with a strict total order.
///
/// Combines wall-clock milliseconds with a logical counter so that two
/// mutations landing in the same millisecond still compare strictly.
/// Ordering: `ms` first, then `seq`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Wall-clock milliseconds since the UNIX epoch.
    pub ms: u64,
    /// Logical counter for mutations within the same millisecond.
    pub seq: u32,
}

impl Timestamp {
    /// Create a timestamp with explicit components.
    pub fn new(ms: u64, seq: u32) -> Self {
        Self { ms, seq }
    }

    /// A timestamp for the current wall-clock time, counter zero.
    pub fn wall_now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self { ms, seq: 0 }
    }

    /// The zero timestamp (before everything).
    pub const fn zero() -> Self {
        Self { ms: 0, seq: 0 }
    }

    /// Returns `true` if this timestamp is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Returns `true` if this timestamp is strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ms.cmp(&other.ms).then(self.seq.cmp(&other.seq))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms.{})", self.ms, self.seq)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.ms, self.seq)
    }
}
