use serde::{Deserialize, Serialize};

use mural_types::{Object, ObjectUrl, Timestamp, Tombstone};

/// What a url currently holds: a live object or the remnant of one.
///
/// A url that was never used has no record at all; a url with a tombstone
/// record can never hold a live object again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectRecord {
    Live(Object),
    Tombstone(Tombstone),
}

impl ObjectRecord {
    /// The url this record occupies.
    pub fn url(&self) -> &ObjectUrl {
        match self {
            Self::Live(object) => &object.url,
            Self::Tombstone(stone) => &stone.url,
        }
    }

    /// Timestamp of the most recent mutation.
    pub fn last_modified(&self) -> Timestamp {
        match self {
            Self::Live(object) => object.last_modified,
            Self::Tombstone(stone) => stone.last_modified,
        }
    }

    /// The live object, if this record is live.
    pub fn as_live(&self) -> Option<&Object> {
        match self {
            Self::Live(object) => Some(object),
            Self::Tombstone(_) => None,
        }
    }

    /// Returns `true` if the record is a tombstone.
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone(_))
    }
}
