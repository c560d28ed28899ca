use serde::{Deserialize, Serialize};

use mural_types::{ChannelUri, Object, Timestamp, Tombstone};

/// One item yielded by a discovery stream.
///
/// An explicit tagged union: a live (masked) object, the tombstone of an
/// object that left the stream's scope, or the failure of one backing
/// source. Consumers treat `SourceError` as recoverable -- the scan over
/// the remaining sources continues behind it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StreamEntry {
    /// A live object, masked for the requesting identity.
    Object(Object),
    /// A url that no longer holds a matching, visible object.
    Tombstone(Tombstone),
    /// One backing source failed; the scan continues without it.
    SourceError { origin: String, message: String },
}

impl StreamEntry {
    /// The live object, if this entry carries one.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The tombstone, if this entry carries one.
    pub fn as_tombstone(&self) -> Option<&Tombstone> {
        match self {
            Self::Tombstone(stone) => Some(stone),
            _ => None,
        }
    }

    /// Returns `true` for a source failure entry.
    pub fn is_source_error(&self) -> bool {
        matches!(self, Self::SourceError { .. })
    }
}

/// Per-channel aggregate over one actor's own live objects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub channel: ChannelUri,
    /// Live objects the querying actor has in this channel.
    pub count: u64,
    /// Most recent modification among those objects; zero when `count`
    /// is zero (the channel emptied since the last watermark).
    #[serde(rename = "lastModified")]
    pub last_modified: Timestamp,
}
