use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::timestamp::Timestamp;
use crate::uri::{ActorUri, ChannelUri};
use crate::url::ObjectUrl;

/// The atomic stored unit: a JSON document plus its placement and
/// permission metadata.
///
/// `url` and `actor` are immutable after creation. `value`, `channels`,
/// and `allowed` change through replace and patch. `last_modified` is
/// bumped on every mutation and compares strictly greater after each one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Object {
    /// Primary key; unique across the store, never reused.
    pub url: ObjectUrl,
    /// The creating identity. Only this actor may mutate the object.
    pub actor: ActorUri,
    /// The document body.
    pub value: Map<String, Value>,
    /// Channels the object is discoverable in. Empty set means orphan.
    pub channels: BTreeSet<ChannelUri>,
    /// Access list. `None` is public; `Some` restricts reads to the
    /// listed actors plus the creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<BTreeSet<ActorUri>>,
    /// Timestamp of the most recent mutation.
    #[serde(rename = "lastModified")]
    pub last_modified: Timestamp,
}

impl Object {
    /// Returns `true` if the object has no access list (readable by anyone).
    pub fn is_public(&self) -> bool {
        self.allowed.is_none()
    }

    /// Returns `true` if the object belongs to no channel.
    ///
    /// Orphans are unreachable through channel discovery; only the creator
    /// can recover them.
    pub fn is_orphan(&self) -> bool {
        self.channels.is_empty()
    }

    /// The JSON document a schema validates against.
    ///
    /// `lastModified` renders as the millisecond component alone so schemas
    /// see a plain numeric, and `allowed` is omitted when absent.
    pub fn to_json(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("url".into(), Value::String(self.url.as_str().into()));
        doc.insert("actor".into(), Value::String(self.actor.as_str().into()));
        doc.insert("value".into(), Value::Object(self.value.clone()));
        doc.insert(
            "channels".into(),
            Value::Array(
                self.channels
                    .iter()
                    .map(|c| Value::String(c.as_str().into()))
                    .collect(),
            ),
        );
        if let Some(allowed) = &self.allowed {
            doc.insert(
                "allowed".into(),
                Value::Array(
                    allowed
                        .iter()
                        .map(|a| Value::String(a.as_str().into()))
                        .collect(),
                ),
            );
        }
        doc.insert("lastModified".into(), Value::from(self.last_modified.ms));
        Value::Object(doc)
    }
}

/// A candidate object submitted to create or replace.
///
/// `url` is optional: absent means "mint a fresh unguessable url";
/// present targets an existing url (replace) or claims a new one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectDraft {
    pub value: Map<String, Value>,
    pub channels: BTreeSet<ChannelUri>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<BTreeSet<ActorUri>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<ObjectUrl>,
}

impl ObjectDraft {
    /// A draft with the given document body, no channels, public access.
    pub fn new(value: Map<String, Value>) -> Self {
        Self {
            value,
            channels: BTreeSet::new(),
            allowed: None,
            url: None,
        }
    }

    /// Set the channels.
    pub fn with_channels(mut self, channels: impl IntoIterator<Item = ChannelUri>) -> Self {
        self.channels = channels.into_iter().collect();
        self
    }

    /// Restrict access to the given actors (plus the creator).
    pub fn with_allowed(mut self, allowed: impl IntoIterator<Item = ActorUri>) -> Self {
        self.allowed = Some(allowed.into_iter().collect());
        self
    }

    /// Target a specific url instead of minting one.
    pub fn with_url(mut self, url: ObjectUrl) -> Self {
        self.url = Some(url);
        self
    }
}

/// Sparse remnant of a deleted object.
///
/// Carries just enough for continuation streams to report that the url no
/// longer holds a live object, without leaking any former content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub url: ObjectUrl,
    #[serde(rename = "lastModified")]
    pub last_modified: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn actor(s: &str) -> ActorUri {
        ActorUri::parse(s).unwrap()
    }

    fn channel(s: &str) -> ChannelUri {
        ChannelUri::parse(s).unwrap()
    }

    fn sample_object() -> Object {
        let value = match json!({"a": 1}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        Object {
            url: ObjectUrl::parse("mural:deadbeef").unwrap(),
            actor: actor("did:web:alice"),
            value,
            channels: [channel("urn:c1"), channel("urn:c2")].into_iter().collect(),
            allowed: None,
            last_modified: Timestamp::new(5000, 2),
        }
    }

    #[test]
    fn public_and_orphan_flags() {
        let mut obj = sample_object();
        assert!(obj.is_public());
        assert!(!obj.is_orphan());

        obj.allowed = Some(BTreeSet::new());
        obj.channels.clear();
        assert!(!obj.is_public());
        assert!(obj.is_orphan());
    }

    #[test]
    fn to_json_shape() {
        let obj = sample_object();
        let doc = obj.to_json();
        assert_eq!(doc["url"], json!("mural:deadbeef"));
        assert_eq!(doc["actor"], json!("did:web:alice"));
        assert_eq!(doc["value"], json!({"a": 1}));
        assert_eq!(doc["channels"], json!(["urn:c1", "urn:c2"]));
        assert_eq!(doc["lastModified"], json!(5000));
        // Absent allowed is omitted, not null.
        assert!(doc.get("allowed").is_none());
    }

    #[test]
    fn to_json_includes_allowed_when_present() {
        let mut obj = sample_object();
        obj.allowed = Some([actor("did:web:bob")].into_iter().collect());
        let doc = obj.to_json();
        assert_eq!(doc["allowed"], json!(["did:web:bob"]));
    }

    #[test]
    fn draft_builder() {
        let value = Map::new();
        let draft = ObjectDraft::new(value)
            .with_channels([channel("urn:c1")])
            .with_allowed([actor("did:web:bob")]);
        assert_eq!(draft.channels.len(), 1);
        assert_eq!(draft.allowed.as_ref().unwrap().len(), 1);
        assert!(draft.url.is_none());
    }

    #[test]
    fn object_serde_roundtrip() {
        let obj = sample_object();
        let json = serde_json::to_string(&obj).unwrap();
        assert!(json.contains("lastModified"));
        let parsed: Object = serde_json::from_str(&json).unwrap();
        assert_eq!(obj, parsed);
    }

    #[test]
    fn tombstone_serde_roundtrip() {
        let stone = Tombstone {
            url: ObjectUrl::random(),
            last_modified: Timestamp::new(9999, 0),
        };
        let json = serde_json::to_string(&stone).unwrap();
        let parsed: Tombstone = serde_json::from_str(&json).unwrap();
        assert_eq!(stone, parsed);
    }
}
