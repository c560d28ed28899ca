use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use mural_types::{ChannelUri, ObjectUrl};

/// Derived index from channel uri to the urls of member objects.
///
/// Maintained as a side effect of store mutations; it never decides
/// visibility on its own, it only bounds discovery's search space. An
/// object in no bucket at all is an orphan -- orphan status is absence,
/// not a tracked membership.
#[derive(Debug, Default)]
pub struct ChannelIndex {
    buckets: RwLock<HashMap<ChannelUri, BTreeSet<ObjectUrl>>>,
}

impl ChannelIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a membership diff for one url: drop memberships present in
    /// `before` but not `after`, add memberships new in `after`.
    pub fn apply(
        &self,
        url: &ObjectUrl,
        before: &BTreeSet<ChannelUri>,
        after: &BTreeSet<ChannelUri>,
    ) {
        let mut buckets = self.buckets.write().expect("channel index lock poisoned");
        for removed in before.difference(after) {
            if let Some(bucket) = buckets.get_mut(removed) {
                bucket.remove(url);
                if bucket.is_empty() {
                    buckets.remove(removed);
                }
            }
        }
        for added in after.difference(before) {
            buckets.entry(added.clone()).or_default().insert(url.clone());
        }
    }

    /// Member urls of a single channel.
    pub fn lookup(&self, channel: &ChannelUri) -> BTreeSet<ObjectUrl> {
        let buckets = self.buckets.read().expect("channel index lock poisoned");
        buckets.get(channel).cloned().unwrap_or_default()
    }

    /// Deduplicated union of the buckets for every requested channel.
    ///
    /// An object in several requested channels appears once.
    pub fn candidates<'a>(
        &self,
        channels: impl IntoIterator<Item = &'a ChannelUri>,
    ) -> BTreeSet<ObjectUrl> {
        let buckets = self.buckets.read().expect("channel index lock poisoned");
        let mut out = BTreeSet::new();
        for channel in channels {
            if let Some(bucket) = buckets.get(channel) {
                out.extend(bucket.iter().cloned());
            }
        }
        out
    }

    /// Number of channels with at least one member.
    pub fn channel_count(&self) -> usize {
        self.buckets.read().expect("channel index lock poisoned").len()
    }

    /// Returns `true` if no channel has any member.
    pub fn is_empty(&self) -> bool {
        self.channel_count() == 0
    }
}
