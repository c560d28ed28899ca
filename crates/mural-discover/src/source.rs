use std::collections::BTreeSet;

use thiserror::Error;

use mural_store::{ChangeRecord, MuralStore, ObjectRecord};
use mural_types::{ActorUri, ChannelUri, ObjectUrl, Timestamp};

/// Failure of one backing source during a scan.
///
/// Never terminates a stream: the engine yields it as a tagged stream
/// item and keeps scanning the remaining sources.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SourceFault {
    pub message: String,
}

impl SourceFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result alias for source operations.
pub type SourceResult<T> = Result<T, SourceFault>;

/// A backing source the discovery engine can scan.
///
/// The local [`MuralStore`] is always one; federated deployments register
/// additional sources (remote nodes, read replicas). The engine never
/// assumes any ordering across sources and tolerates any one of them
/// failing mid-scan.
pub trait DiscoverSource: Send + Sync {
    /// Stable name for error attribution in stream items.
    fn origin(&self) -> &str;

    /// Candidate urls for a channel query (deduplicated union of the
    /// requested channels' buckets).
    fn candidates(&self, channels: &BTreeSet<ChannelUri>) -> SourceResult<BTreeSet<ObjectUrl>>;

    /// All live urls created by `actor`.
    fn owned_by(&self, actor: &ActorUri) -> SourceResult<BTreeSet<ObjectUrl>>;

    /// The current record at a url, if any.
    fn fetch(&self, url: &ObjectUrl) -> SourceResult<Option<ObjectRecord>>;

    /// Changes recorded strictly after `watermark`; `Ok(None)` when the
    /// source's log no longer reaches back that far and the caller must
    /// rescan.
    fn changes_since(&self, watermark: Timestamp) -> SourceResult<Option<Vec<ChangeRecord>>>;

    /// The watermark a stream created now should record.
    fn watermark(&self) -> Timestamp;
}

impl DiscoverSource for MuralStore {
    fn origin(&self) -> &str {
        "local"
    }

    fn candidates(&self, channels: &BTreeSet<ChannelUri>) -> SourceResult<BTreeSet<ObjectUrl>> {
        Ok(MuralStore::candidates(self, channels))
    }

    fn owned_by(&self, actor: &ActorUri) -> SourceResult<BTreeSet<ObjectUrl>> {
        Ok(MuralStore::owned_by(self, actor))
    }

    fn fetch(&self, url: &ObjectUrl) -> SourceResult<Option<ObjectRecord>> {
        Ok(MuralStore::fetch(self, url))
    }

    fn changes_since(&self, watermark: Timestamp) -> SourceResult<Option<Vec<ChangeRecord>>> {
        Ok(MuralStore::changes_since(self, watermark))
    }

    fn watermark(&self) -> Timestamp {
        MuralStore::watermark(self)
    }
}
