//! Access control evaluation for mural.
//!
//! Two pure functions, no side effects:
//!
//! - [`is_visible`] gates every read and mutation lookup: public objects
//!   are visible to everyone, restricted objects only to their creator and
//!   the members of `allowed`.
//! - [`mask`] computes the view a requester is entitled to: the creator
//!   sees the object unchanged; everyone else sees `allowed` collapsed to
//!   their own identity and `channels` cut down to the channels they
//!   actually asked about.
//!
//! Masking runs before schema validation so a schema can only ever match
//! against fields the requester is entitled to see.

use std::collections::BTreeSet;

use mural_types::{ActorUri, ChannelUri, Object};

/// Visibility test: may `requester` observe `object` at all?
///
/// `None` is the anonymous requester, which only sees public objects.
pub fn is_visible(object: &Object, requester: Option<&ActorUri>) -> bool {
    let Some(allowed) = &object.allowed else {
        return true;
    };
    match requester {
        Some(actor) => *actor == object.actor || allowed.contains(actor),
        None => false,
    }
}

/// Compute the masked view of `object` for `requester`.
///
/// The caller is expected to have passed [`is_visible`] first; masking an
/// invisible object still never reveals other members of `allowed`.
pub fn mask(
    object: &Object,
    queried: &BTreeSet<ChannelUri>,
    requester: Option<&ActorUri>,
) -> Object {
    if requester == Some(&object.actor) {
        return object.clone();
    }

    let channels: BTreeSet<ChannelUri> = object
        .channels
        .intersection(queried)
        .cloned()
        .collect();
    let allowed = object
        .allowed
        .as_ref()
        .map(|_| requester.cloned().into_iter().collect());

    Object {
        url: object.url.clone(),
        actor: object.actor.clone(),
        value: object.value.clone(),
        channels,
        allowed,
        last_modified: object.last_modified,
    }
}
