use std::collections::BTreeSet;

use json_patch::{PatchErrorKind, PatchOperation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use mural_types::{ActorUri, ChannelUri, Object};

use crate::error::{PatchError, PatchResult};

/// Patch operations partitioned by the object field they target.
///
/// Each field's list is an ordered RFC 6902 document patch applied to that
/// field's JSON projection: `value` as an object, `channels` as an array
/// of strings, `allowed` as an array of strings or `null` when absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldPatches {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<PatchOperation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<PatchOperation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<PatchOperation>,
}

impl FieldPatches {
    /// Returns `true` if no field has any operation.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.channels.is_empty() && self.allowed.is_empty()
    }
}

/// The three mutable fields after a successful patch, ready to commit.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchedFields {
    pub value: Map<String, Value>,
    pub channels: BTreeSet<ChannelUri>,
    pub allowed: Option<BTreeSet<ActorUri>>,
}

/// Apply an ordered patch list to a document, translating the patch
/// library's failure modes into [`PatchError`].
pub fn apply(doc: &Value, ops: &[PatchOperation]) -> PatchResult<Value> {
    let mut patched = doc.clone();
    json_patch::patch(&mut patched, ops).map_err(|e| match e.kind {
        PatchErrorKind::TestFailed => PatchError::TestFailed {
            index: e.operation,
            path: e.path.to_string(),
        },
        other => PatchError::Invalid {
            index: e.operation,
            reason: other.to_string(),
        },
    })?;
    Ok(patched)
}

/// Apply field-scoped patches to an object's mutable fields.
///
/// All three fields are patched against clones; the caller commits the
/// returned [`PatchedFields`] only on success, which gives the whole call
/// all-or-nothing semantics. Shape invariants are enforced after
/// application: `value` must remain a JSON object, `channels` a set of
/// channel uris, `allowed` a set of actor uris or `null`.
pub fn apply_to_object(object: &Object, patches: &FieldPatches) -> PatchResult<PatchedFields> {
    let value = if patches.value.is_empty() {
        object.value.clone()
    } else {
        let patched = apply(&Value::Object(object.value.clone()), &patches.value)?;
        match patched {
            Value::Object(map) => map,
            _ => {
                return Err(PatchError::FieldShape {
                    field: "value",
                    expected: "a JSON object",
                })
            }
        }
    };

    let channels = if patches.channels.is_empty() {
        object.channels.clone()
    } else {
        let before = Value::Array(
            object
                .channels
                .iter()
                .map(|c| Value::String(c.as_str().into()))
                .collect(),
        );
        let patched = apply(&before, &patches.channels)?;
        parse_channel_set(&patched)?
    };

    let allowed = if patches.allowed.is_empty() {
        object.allowed.clone()
    } else {
        let before = match &object.allowed {
            None => Value::Null,
            Some(set) => Value::Array(
                set.iter()
                    .map(|a| Value::String(a.as_str().into()))
                    .collect(),
            ),
        };
        let patched = apply(&before, &patches.allowed)?;
        parse_allowed_set(&patched)?
    };

    Ok(PatchedFields {
        value,
        channels,
        allowed,
    })
}

fn parse_channel_set(doc: &Value) -> PatchResult<BTreeSet<ChannelUri>> {
    const SHAPE: PatchError = PatchError::FieldShape {
        field: "channels",
        expected: "an array of channel uris",
    };
    let items = doc.as_array().ok_or(SHAPE)?;
    let mut set = BTreeSet::new();
    for item in items {
        let s = item.as_str().ok_or(SHAPE)?;
        let channel = ChannelUri::parse(s).map_err(|_| SHAPE)?;
        set.insert(channel);
    }
    Ok(set)
}

fn parse_allowed_set(doc: &Value) -> PatchResult<Option<BTreeSet<ActorUri>>> {
    const SHAPE: PatchError = PatchError::FieldShape {
        field: "allowed",
        expected: "null or an array of actor uris",
    };
    match doc {
        Value::Null => Ok(None),
        Value::Array(items) => {
            let mut set = BTreeSet::new();
            for item in items {
                let s = item.as_str().ok_or(SHAPE)?;
                let actor = ActorUri::parse(s).map_err(|_| SHAPE)?;
                set.insert(actor);
            }
            Ok(Some(set))
        }
        _ => Err(SHAPE),
    }
}
