use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mural_types::{ActorUri, ChannelUri};

/// The typed query a stream (and its cursors) is bound to.
///
/// Schemas are carried as canonical JSON text so the whole query stays
/// compactly serializable inside cursor state; they are recompiled when a
/// continuation starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    /// Objects discoverable in any of the given channels, filtered by
    /// schema.
    Channels {
        channels: BTreeSet<ChannelUri>,
        schema: String,
    },
    /// The requester's own channel-less objects, filtered by schema.
    Orphans { actor: ActorUri, schema: String },
    /// Per-channel aggregates over the requester's own objects.
    Stats { actor: ActorUri },
}

impl Query {
    /// A channel query over the given schema document.
    pub fn channels(channels: BTreeSet<ChannelUri>, schema: &Value) -> Self {
        Self::Channels {
            channels,
            schema: schema.to_string(),
        }
    }

    /// An orphan-recovery query for the given actor.
    pub fn orphans(actor: ActorUri, schema: &Value) -> Self {
        Self::Orphans {
            actor,
            schema: schema.to_string(),
        }
    }

    /// A channel-statistics query for the given actor.
    pub fn stats(actor: ActorUri) -> Self {
        Self::Stats { actor }
    }

    /// The schema document, for query kinds that carry one.
    ///
    /// Returns `None` for stats queries and for schema text that does not
    /// parse (a corrupted cursor); callers treat the latter as an invalid
    /// schema.
    pub fn schema_value(&self) -> Option<Value> {
        let text = match self {
            Self::Channels { schema, .. } | Self::Orphans { schema, .. } => schema,
            Self::Stats { .. } => return None,
        };
        serde_json::from_str(text).ok()
    }
}
