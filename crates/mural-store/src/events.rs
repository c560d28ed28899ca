use std::collections::BTreeSet;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use mural_types::{ActorUri, ChannelUri, ObjectUrl, Timestamp};

use crate::changelog::ChangeKind;

/// Unique identifier for a store event, content-addressed with BLAKE3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    hash: [u8; 32],
}

impl EventId {
    /// Short hex representation (first 8 hex chars).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.hash[..4])
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt:{}", self.short_hex())
    }
}

/// A single mutation notification fanned out to subscribers.
///
/// Events carry placement metadata only, never the document body --
/// subscribers fetch through the normal read path, which applies access
/// control.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEvent {
    /// Content-addressed event identifier.
    pub id: EventId,
    /// The mutation timestamp.
    pub at: Timestamp,
    /// What happened.
    pub kind: ChangeKind,
    /// The mutated url.
    pub url: ObjectUrl,
    /// The mutating actor.
    pub actor: ActorUri,
    /// Channel memberships after the mutation.
    pub channels: BTreeSet<ChannelUri>,
}

impl StoreEvent {
    /// Build an event, computing its content-addressed id.
    pub fn new(
        at: Timestamp,
        kind: ChangeKind,
        url: ObjectUrl,
        actor: ActorUri,
        channels: BTreeSet<ChannelUri>,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"mural-store-event-v1:");
        hasher.update(&at.ms.to_le_bytes());
        hasher.update(&at.seq.to_le_bytes());
        hasher.update(url.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(actor.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(kind.to_string().as_bytes());
        for channel in &channels {
            hasher.update(b":");
            hasher.update(channel.as_str().as_bytes());
        }
        let id = EventId {
            hash: *hasher.finalize().as_bytes(),
        };
        Self {
            id,
            at,
            kind,
            url,
            actor,
            channels,
        }
    }
}

/// Filter for subscribing to a subset of store events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events touching one of these channels are delivered.
    pub channels: Option<Vec<ChannelUri>>,
    /// If set, only events by these actors are delivered.
    pub actors: Option<Vec<ActorUri>>,
    /// If set, only events after this timestamp are delivered.
    pub since: Option<Timestamp>,
}

impl EventFilter {
    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &StoreEvent) -> bool {
        if let Some(ref channels) = self.channels {
            if !channels.iter().any(|c| event.channels.contains(c)) {
                return false;
            }
        }
        if let Some(ref actors) = self.actors {
            if !actors.contains(&event.actor) {
                return false;
            }
        }
        if let Some(ref since) = self.since {
            if !event.at.is_after(since) {
                return false;
            }
        }
        true
    }
}

/// A broadcast receiver for store events.
pub type EventStream = broadcast::Receiver<StoreEvent>;

/// Internal subscriber: a filter paired with a broadcast sender.
struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<StoreEvent>,
}

/// Fan-out router delivering mutation events to matching subscribers.
///
/// The store publishes here as a side effect of every mutation; nothing
/// in the core read/write path depends on anyone listening.
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus whose per-subscriber channels hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            capacity,
        }
    }

    /// Register a subscriber; returns a receiver for matching events.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        let (tx, rx) = broadcast::channel(self.capacity);
        self.subscribers
            .write()
            .expect("event bus lock poisoned")
            .push(Subscriber { filter, sender: tx });
        rx
    }

    /// Route an event to all matching subscribers, pruning stale ones.
    pub fn publish(&self, event: &StoreEvent) {
        let mut subs = self.subscribers.write().expect("event bus lock poisoned");
        subs.retain(|sub| {
            if sub.filter.matches(event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("event bus lock poisoned")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(names: &[&str]) -> BTreeSet<ChannelUri> {
        names.iter().map(|n| ChannelUri::parse(*n).unwrap()).collect()
    }

    fn event(kind: ChangeKind, chans: &[&str], at: Timestamp) -> StoreEvent {
        StoreEvent::new(
            at,
            kind,
            ObjectUrl::parse("mural:abc").unwrap(),
            ActorUri::parse("did:web:alice").unwrap(),
            channels(chans),
        )
    }

    #[test]
    fn event_id_is_deterministic() {
        let at = Timestamp::new(100, 0);
        let e1 = event(ChangeKind::Created, &["urn:c1"], at);
        let e2 = event(ChangeKind::Created, &["urn:c1"], at);
        assert_eq!(e1.id, e2.id);
    }

    #[test]
    fn different_kinds_produce_different_ids() {
        let at = Timestamp::new(100, 0);
        let e1 = event(ChangeKind::Created, &["urn:c1"], at);
        let e2 = event(ChangeKind::Deleted, &["urn:c1"], at);
        assert_ne!(e1.id, e2.id);
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = EventFilter::default();
        assert!(filter.matches(&event(ChangeKind::Created, &[], Timestamp::new(1, 0))));
    }

    #[test]
    fn channel_filter() {
        let filter = EventFilter {
            channels: Some(vec![ChannelUri::parse("urn:c1").unwrap()]),
            ..Default::default()
        };
        let both = event(ChangeKind::Created, &["urn:c1", "urn:c2"], Timestamp::new(1, 0));
        assert!(filter.matches(&both));
        assert!(!filter.matches(&event(ChangeKind::Created, &["urn:c3"], Timestamp::new(1, 0))));
    }

    #[test]
    fn since_filter_is_strict() {
        let filter = EventFilter {
            since: Some(Timestamp::new(100, 0)),
            ..Default::default()
        };
        assert!(!filter.matches(&event(ChangeKind::Created, &[], Timestamp::new(100, 0))));
        assert!(filter.matches(&event(ChangeKind::Created, &[], Timestamp::new(100, 1))));
    }

    #[test]
    fn publish_reaches_matching_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe(EventFilter::default());
        let e = event(ChangeKind::Created, &["urn:c1"], Timestamp::new(1, 0));
        bus.publish(&e);
        assert_eq!(rx.try_recv().unwrap(), e);
    }

    #[test]
    fn publish_skips_non_matching_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe(EventFilter {
            actors: Some(vec![ActorUri::parse("did:web:bob").unwrap()]),
            ..Default::default()
        });
        bus.publish(&event(ChangeKind::Created, &[], Timestamp::new(1, 0)));
        assert!(rx.try_recv().is_err());
        // Non-matching subscribers stay registered for future events.
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn dropped_receivers_are_pruned_on_publish() {
        let bus = EventBus::new(16);
        let rx = bus.subscribe(EventFilter::default());
        drop(rx);
        bus.publish(&event(ChangeKind::Created, &[], Timestamp::new(1, 0)));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
