use std::time::Duration;

/// Configuration for a [`crate::MuralStore`].
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// How long tombstones stay fetchable before garbage collection.
    ///
    /// Continuation streams older than this may see a bare change-log
    /// entry instead of the tombstone record itself.
    pub tombstone_retention: Duration,
    /// Maximum number of retained change-log entries. Continuations whose
    /// watermark predates the pruned horizon fall back to a full rescan.
    pub changelog_capacity: usize,
    /// Capacity of per-subscriber event broadcast channels.
    pub event_capacity: usize,
    /// Run a tombstone sweep every this many mutations. Zero disables
    /// opportunistic sweeps (callers can still invoke `gc_tombstones`).
    pub gc_interval: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tombstone_retention: Duration::from_secs(24 * 60 * 60),
            changelog_capacity: 4096,
            event_capacity: 1024,
            gc_interval: 256,
        }
    }
}
