use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use mural_types::{ActorUri, ChannelUri, ObjectUrl, Timestamp};

use crate::clock::StoreClock;

/// Classification of a store mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Replaced,
    Patched,
    Deleted,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Replaced => "Replaced",
            Self::Patched => "Patched",
            Self::Deleted => "Deleted",
        };
        write!(f, "{s}")
    }
}

/// One recorded mutation, with enough channel context to decide later
/// whether a given discovery query was affected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// When the mutation committed; unique across the log.
    pub at: Timestamp,
    pub url: ObjectUrl,
    /// The mutating actor (always the object's creator).
    pub actor: ActorUri,
    pub kind: ChangeKind,
    /// Channel memberships before the mutation.
    pub channels_before: BTreeSet<ChannelUri>,
    /// Channel memberships after the mutation (empty for deletes).
    pub channels_after: BTreeSet<ChannelUri>,
}

impl ChangeRecord {
    /// Did this change touch any of the queried channels, on either side
    /// of the mutation?
    pub fn touches(&self, queried: &BTreeSet<ChannelUri>) -> bool {
        self.channels_before
            .iter()
            .chain(self.channels_after.iter())
            .any(|c| queried.contains(c))
    }
}

struct LogState {
    entries: BTreeMap<Timestamp, ChangeRecord>,
    /// Timestamp of the newest pruned entry, if any entry was ever pruned.
    truncated_at: Option<Timestamp>,
}

/// Bounded, ordered log of store mutations backing continuation streams.
///
/// The log owns the store clock: a timestamp is minted and its record
/// inserted under one lock, so the high watermark can never run ahead of
/// a mutation that is still being recorded. Once capacity is exceeded the
/// oldest entries are pruned and the truncation horizon advances;
/// watermarks older than the horizon can no longer be served completely.
pub struct ChangeLog {
    state: RwLock<LogState>,
    clock: StoreClock,
    capacity: usize,
}

impl ChangeLog {
    /// Create a log retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(LogState {
                entries: BTreeMap::new(),
                truncated_at: None,
            }),
            clock: StoreClock::new(),
            capacity,
        }
    }

    /// Mint the mutation timestamp and record the change atomically.
    ///
    /// Returns the minted timestamp for the caller to stamp the object.
    pub fn append(
        &self,
        url: &ObjectUrl,
        actor: &ActorUri,
        kind: ChangeKind,
        channels_before: BTreeSet<ChannelUri>,
        channels_after: BTreeSet<ChannelUri>,
    ) -> Timestamp {
        let mut state = self.state.write().expect("change log lock poisoned");
        let at = self.clock.now();
        state.entries.insert(
            at,
            ChangeRecord {
                at,
                url: url.clone(),
                actor: actor.clone(),
                kind,
                channels_before,
                channels_after,
            },
        );
        while state.entries.len() > self.capacity {
            if let Some((&oldest, _)) = state.entries.iter().next() {
                state.entries.remove(&oldest);
                state.truncated_at = Some(oldest);
            }
        }
        at
    }

    /// The timestamp of the most recent recorded change, or zero.
    ///
    /// Used as the watermark for new discovery streams: every later
    /// mutation is guaranteed to land in the log with a greater timestamp.
    pub fn high_watermark(&self) -> Timestamp {
        let state = self.state.read().expect("change log lock poisoned");
        state
            .entries
            .keys()
            .next_back()
            .copied()
            .unwrap_or(Timestamp::zero())
    }

    /// All changes strictly after `watermark`, oldest first.
    ///
    /// Returns `None` when pruning has discarded history at or after the
    /// watermark, meaning completeness can no longer be guaranteed and
    /// the caller must fall back to a full rescan.
    pub fn since(&self, watermark: Timestamp) -> Option<Vec<ChangeRecord>> {
        let state = self.state.read().expect("change log lock poisoned");
        if let Some(truncated_at) = state.truncated_at {
            if watermark < truncated_at {
                return None;
            }
        }
        Some(
            state
                .entries
                .range((
                    std::ops::Bound::Excluded(watermark),
                    std::ops::Bound::Unbounded,
                ))
                .map(|(_, rec)| rec.clone())
                .collect(),
        )
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.state.read().expect("change log lock poisoned").entries.len()
    }

    /// Returns `true` if no entry is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
