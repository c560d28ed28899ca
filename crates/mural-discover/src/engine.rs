use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use mural_store::MuralStore;
use mural_types::{ActorUri, ChannelUri};

use crate::cursor::{CursorConfig, CursorManager};
use crate::query::Query;
use crate::source::DiscoverSource;
use crate::stats::StatsStream;
use crate::stream::DiscoverStream;

/// Front door of the discovery subsystem.
///
/// Owns the scan-source list (the local store plus any registered remote
/// sources) and the cursor table every stream issues into. The engine
/// itself holds no per-stream state -- streams are self-contained values
/// and dropping one releases everything it used.
pub struct DiscoveryEngine {
    sources: Vec<Arc<dyn DiscoverSource>>,
    cursors: Arc<CursorManager>,
}

impl DiscoveryEngine {
    /// An engine scanning the given store, with default cursor policy.
    pub fn new(store: Arc<MuralStore>) -> Self {
        Self::with_cursor_config(store, CursorConfig::default())
    }

    /// An engine with an explicit cursor policy.
    pub fn with_cursor_config(store: Arc<MuralStore>, config: CursorConfig) -> Self {
        Self {
            sources: vec![store],
            cursors: Arc::new(CursorManager::with_config(config)),
        }
    }

    /// Register an additional backing source. The scan order across
    /// sources carries no meaning.
    pub fn add_source(&mut self, source: Arc<dyn DiscoverSource>) {
        self.sources.push(source);
    }

    /// Live objects discoverable in any of `channels`, masked for
    /// `identity` and filtered by `schema`.
    ///
    /// A schema that fails to compile errors on the stream's first pull.
    pub fn discover(
        &self,
        channels: BTreeSet<ChannelUri>,
        schema: &Value,
        identity: Option<&ActorUri>,
    ) -> DiscoverStream {
        DiscoverStream::fresh(
            self.sources.clone(),
            Arc::clone(&self.cursors),
            identity.cloned(),
            Query::channels(channels, schema),
        )
    }

    /// Resume an object stream from a cursor token.
    ///
    /// Unknown/expired tokens and identity mismatches surface on the
    /// first pull, not here.
    pub fn continue_discover(&self, token: &str, identity: Option<&ActorUri>) -> DiscoverStream {
        DiscoverStream::resume(
            self.sources.clone(),
            Arc::clone(&self.cursors),
            identity.cloned(),
            token.to_string(),
        )
    }

    /// The requester's own channel-less objects, filtered by `schema`.
    pub fn recover_orphans(&self, schema: &Value, identity: &ActorUri) -> DiscoverStream {
        DiscoverStream::fresh(
            self.sources.clone(),
            Arc::clone(&self.cursors),
            Some(identity.clone()),
            Query::orphans(identity.clone(), schema),
        )
    }

    /// Per-channel aggregates over the requester's own live objects.
    pub fn channel_stats(&self, identity: &ActorUri) -> StatsStream {
        StatsStream::fresh(
            self.sources.clone(),
            Arc::clone(&self.cursors),
            identity.clone(),
        )
    }

    /// Resume a stats stream from a cursor token.
    pub fn continue_channel_stats(&self, token: &str, identity: &ActorUri) -> StatsStream {
        StatsStream::resume(
            self.sources.clone(),
            Arc::clone(&self.cursors),
            identity.clone(),
            token.to_string(),
        )
    }

    /// Drop expired cursors; returns how many were removed.
    pub fn prune_cursors(&self) -> usize {
        self.cursors.prune_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::StreamEntry;
    use crate::error::DiscoverError;
    use crate::source::{SourceFault, SourceResult};
    use mural_store::{ChangeRecord, ObjectRecord, StoreConfig};
    use mural_types::{ObjectDraft, ObjectUrl, Timestamp};
    use serde_json::json;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn actor(s: &str) -> ActorUri {
        ActorUri::parse(s).unwrap()
    }

    fn channel(s: &str) -> ChannelUri {
        ChannelUri::parse(s).unwrap()
    }

    fn channels(names: &[&str]) -> BTreeSet<ChannelUri> {
        names.iter().map(|n| channel(n)).collect()
    }

    fn value(doc: Value) -> serde_json::Map<String, Value> {
        match doc {
            Value::Object(map) => map,
            _ => panic!("test value must be an object"),
        }
    }

    fn draft(doc: Value, chans: &[&str]) -> ObjectDraft {
        ObjectDraft::new(value(doc)).with_channels(chans.iter().map(|c| channel(c)))
    }

    fn any_schema() -> Value {
        json!(true)
    }

    fn engine_over(store: &Arc<MuralStore>) -> DiscoveryEngine {
        DiscoveryEngine::new(Arc::clone(store))
    }

    /// A source that fails every call, for fault-isolation tests.
    struct FlakySource;

    impl DiscoverSource for FlakySource {
        fn origin(&self) -> &str {
            "flaky-remote"
        }
        fn candidates(&self, _: &BTreeSet<ChannelUri>) -> SourceResult<BTreeSet<ObjectUrl>> {
            Err(SourceFault::new("connection refused"))
        }
        fn owned_by(&self, _: &ActorUri) -> SourceResult<BTreeSet<ObjectUrl>> {
            Err(SourceFault::new("connection refused"))
        }
        fn fetch(&self, _: &ObjectUrl) -> SourceResult<Option<ObjectRecord>> {
            Err(SourceFault::new("connection refused"))
        }
        fn changes_since(&self, _: Timestamp) -> SourceResult<Option<Vec<ChangeRecord>>> {
            Err(SourceFault::new("connection refused"))
        }
        fn watermark(&self) -> Timestamp {
            Timestamp::zero()
        }
    }

    // -----------------------------------------------------------------------
    // Initial discovery
    // -----------------------------------------------------------------------

    #[test]
    fn discover_masks_channels_per_requester() {
        init_tracing();
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        store
            .put(draft(json!({"a": 1}), &["urn:c1", "urn:c2"]), &alice)
            .unwrap();

        let engine = engine_over(&store);

        // The creator sees every channel, regardless of the query subset.
        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        let entries = stream.drain().unwrap();
        assert_eq!(entries.len(), 1);
        let object = entries[0].as_object().unwrap();
        assert_eq!(object.channels, channels(&["urn:c1", "urn:c2"]));

        // A stranger sees only the channels they asked about.
        let bob = actor("did:web:bob");
        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&bob));
        let entries = stream.drain().unwrap();
        assert_eq!(entries.len(), 1);
        let object = entries[0].as_object().unwrap();
        assert_eq!(object.channels, channels(&["urn:c1"]));
        assert_eq!(object.value["a"], json!(1));
    }

    #[test]
    fn discover_deduplicates_across_queried_channels() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        store
            .put(draft(json!({}), &["urn:c1", "urn:c2"]), &alice)
            .unwrap();

        let engine = engine_over(&store);
        let mut stream =
            engine.discover(channels(&["urn:c1", "urn:c2"]), &any_schema(), Some(&alice));
        assert_eq!(stream.drain().unwrap().len(), 1);
    }

    #[test]
    fn discover_skips_invisible_objects_silently() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        store
            .put(
                ObjectDraft::new(value(json!({"secret": true})))
                    .with_channels([channel("urn:c1")])
                    .with_allowed([actor("did:web:carol")]),
                &alice,
            )
            .unwrap();
        store.put(draft(json!({"open": true}), &["urn:c1"]), &alice).unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.discover(
            channels(&["urn:c1"]),
            &any_schema(),
            Some(&actor("did:web:bob")),
        );
        let entries = stream.drain().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_object().unwrap().value["open"], json!(true));
    }

    #[test]
    fn discover_filters_by_schema_without_erroring() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        store
            .put(draft(json!({"kind": "note"}), &["urn:c1"]), &alice)
            .unwrap();
        store
            .put(draft(json!({"kind": "photo"}), &["urn:c1"]), &alice)
            .unwrap();

        let schema = json!({
            "properties": {
                "value": {"properties": {"kind": {"const": "note"}}}
            }
        });
        let engine = engine_over(&store);
        let mut stream = engine.discover(channels(&["urn:c1"]), &schema, Some(&alice));
        let entries = stream.drain().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_object().unwrap().value["kind"], json!("note"));
    }

    #[test]
    fn invalid_schema_errors_on_first_pull() {
        let store = Arc::new(MuralStore::new());
        let engine = engine_over(&store);
        let mut stream = engine.discover(channels(&["urn:c1"]), &json!({"type": 42}), None);
        let err = stream.next().unwrap_err();
        assert!(matches!(
            err,
            DiscoverError::Schema(mural_schema::SchemaError::Invalid(_))
        ));
    }

    #[test]
    fn anonymous_discovery_sees_public_objects_only() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        store.put(draft(json!({}), &["urn:c1"]), &alice).unwrap();
        store
            .put(
                ObjectDraft::new(value(json!({})))
                    .with_channels([channel("urn:c1")])
                    .with_allowed([]),
                &alice,
            )
            .unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), None);
        assert_eq!(stream.drain().unwrap().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Cursors and continuation
    // -----------------------------------------------------------------------

    #[test]
    fn quiet_continuation_is_immediately_done() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        store.put(draft(json!({}), &["urn:c1"]), &alice).unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        assert_eq!(stream.drain().unwrap().len(), 1);
        let token = stream.cursor().expect("exhausted stream has a cursor").to_string();

        // Both the raw token and the bound continuation resume to an
        // immediately-done stream when nothing changed in between.
        let mut via_token = engine.continue_discover(&token, Some(&alice));
        assert!(via_token.drain().unwrap().is_empty());

        let mut bound = stream.continuation().unwrap();
        assert!(bound.drain().unwrap().is_empty());
    }

    #[test]
    fn continuation_emits_objects_created_since() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        store.put(draft(json!({"n": 1}), &["urn:c1"]), &alice).unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        assert_eq!(stream.drain().unwrap().len(), 1);

        store.put(draft(json!({"n": 2}), &["urn:c1"]), &alice).unwrap();

        let mut cont = stream.continuation().unwrap();
        let entries = cont.drain().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_object().unwrap().value["n"], json!(2));
    }

    #[test]
    fn continuation_reports_deletion_as_tombstone() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let url = ObjectUrl::parse("mural:doomed").unwrap();
        store
            .put(draft(json!({}), &["urn:c1"]).with_url(url.clone()), &alice)
            .unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        assert_eq!(stream.drain().unwrap().len(), 1);

        let deleted = store.delete(&url, &alice).unwrap();

        let mut cont = stream.continuation().unwrap();
        let entries = cont.drain().unwrap();
        assert_eq!(entries.len(), 1);
        let stone = entries[0].as_tombstone().unwrap();
        assert_eq!(stone.url, url);
        assert_eq!(stone.last_modified, deleted.last_modified);
    }

    #[test]
    fn continuation_reemits_patched_objects() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let url = ObjectUrl::parse("mural:edited").unwrap();
        store
            .put(draft(json!({"rev": 1}), &["urn:c1"]).with_url(url.clone()), &alice)
            .unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        assert_eq!(stream.drain().unwrap().len(), 1);

        let patches = mural_patch::FieldPatches {
            value: serde_json::from_value(json!([
                {"op": "replace", "path": "/rev", "value": 2}
            ]))
            .unwrap(),
            ..Default::default()
        };
        store.patch(&url, &patches, &alice).unwrap();

        let mut cont = stream.continuation().unwrap();
        let entries = cont.drain().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_object().unwrap().value["rev"], json!(2));
    }

    #[test]
    fn leaving_the_queried_channels_reads_as_tombstone() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let url = ObjectUrl::parse("mural:wanderer").unwrap();
        store
            .put(draft(json!({}), &["urn:c1"]).with_url(url.clone()), &alice)
            .unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        assert_eq!(stream.drain().unwrap().len(), 1);

        // Replaced into a different channel: still live, but gone from
        // this query's scope.
        store
            .put(draft(json!({}), &["urn:elsewhere"]).with_url(url.clone()), &alice)
            .unwrap();

        let mut cont = stream.continuation().unwrap();
        let entries = cont.drain().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_tombstone().unwrap().url, url);
    }

    #[test]
    fn access_revocation_reads_as_tombstone() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let bob = actor("did:web:bob");
        let url = ObjectUrl::parse("mural:revoked").unwrap();
        store
            .put(
                ObjectDraft::new(value(json!({})))
                    .with_channels([channel("urn:c1")])
                    .with_allowed([bob.clone()])
                    .with_url(url.clone()),
                &alice,
            )
            .unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&bob));
        assert_eq!(stream.drain().unwrap().len(), 1);

        // Alice cuts bob out; the object stays live for others.
        store
            .put(
                ObjectDraft::new(value(json!({})))
                    .with_channels([channel("urn:c1")])
                    .with_allowed([])
                    .with_url(url.clone()),
                &alice,
            )
            .unwrap();

        let mut cont = stream.continuation().unwrap();
        let entries = cont.drain().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_tombstone().unwrap().url, url);
    }

    #[test]
    fn continuations_chain_indefinitely() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let engine = engine_over(&store);

        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        assert!(stream.drain().unwrap().is_empty());

        for i in 0..3 {
            store.put(draft(json!({"i": i}), &["urn:c1"]), &alice).unwrap();
            let mut cont = stream.continuation().unwrap();
            let entries = cont.drain().unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].as_object().unwrap().value["i"], json!(i));
            stream = cont;
        }
    }

    #[test]
    fn wrong_identity_continuation_is_forbidden_on_first_pull() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let engine = engine_over(&store);

        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        stream.drain().unwrap();
        let token = stream.cursor().unwrap().to_string();

        // Constructing the continuation does not fail...
        let mut hijacked = engine.continue_discover(&token, Some(&actor("did:web:bob")));
        // ...pulling it does.
        assert!(matches!(
            hijacked.next().unwrap_err(),
            DiscoverError::Forbidden
        ));

        let mut anonymous = engine.continue_discover(&token, None);
        assert!(matches!(
            anonymous.next().unwrap_err(),
            DiscoverError::Forbidden
        ));
    }

    #[test]
    fn unknown_cursor_is_not_found_on_first_pull() {
        let store = Arc::new(MuralStore::new());
        let engine = engine_over(&store);
        let mut stream = engine.continue_discover("garbage-token", None);
        assert!(matches!(
            stream.next().unwrap_err(),
            DiscoverError::CursorNotFound
        ));
    }

    #[test]
    fn expired_cursor_is_not_found() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let engine = DiscoveryEngine::with_cursor_config(
            Arc::clone(&store),
            CursorConfig {
                ttl: std::time::Duration::ZERO,
            },
        );

        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        stream.drain().unwrap();
        let token = stream.cursor().unwrap().to_string();

        let mut cont = engine.continue_discover(&token, Some(&alice));
        assert!(matches!(
            cont.next().unwrap_err(),
            DiscoverError::CursorNotFound
        ));
    }

    #[test]
    fn rescan_fallback_when_change_history_is_pruned() {
        let store = Arc::new(MuralStore::with_config(StoreConfig {
            changelog_capacity: 2,
            ..Default::default()
        }));
        let alice = actor("did:web:alice");
        store.put(draft(json!({"n": 0}), &["urn:c1"]), &alice).unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        assert_eq!(stream.drain().unwrap().len(), 1);

        // Three more writes push the watermark out of the tiny log.
        for n in 1..=3 {
            store.put(draft(json!({"n": n}), &["urn:c1"]), &alice).unwrap();
        }

        let mut cont = stream.continuation().unwrap();
        let entries = cont.drain().unwrap();
        // Full rescan: every live object, the already-seen one included.
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.as_object().is_some()));
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn contested_url_discovers_exactly_one_live_object() {
        use std::thread;

        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let url = ObjectUrl::parse("mural:contested").unwrap();
        store
            .put(draft(json!({"n": 0}), &["urn:c1"]).with_url(url.clone()), &alice)
            .unwrap();

        let engine = engine_over(&store);
        let mut before = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        assert_eq!(before.drain().unwrap().len(), 1);

        let handles: Vec<_> = (1..100)
            .map(|i| {
                let store = Arc::clone(&store);
                let alice = alice.clone();
                let url = url.clone();
                thread::spawn(move || {
                    store
                        .put(draft(json!({"n": i}), &["urn:c1"]).with_url(url), &alice)
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // A fresh scan sees exactly one live object, no tombstones.
        let mut fresh = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        let entries = fresh.drain().unwrap();
        assert_eq!(entries.len(), 1);
        let winner = entries[0].as_object().unwrap().clone();

        // The continuation collapses the 99 replacements into a single
        // transition for the url, consistent with whichever write won.
        let mut cont = before.continuation().unwrap();
        let entries = cont.drain().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_object().unwrap(), &winner);
    }

    // -----------------------------------------------------------------------
    // Multi-source scans
    // -----------------------------------------------------------------------

    #[test]
    fn one_bad_source_cannot_abort_the_scan() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        store.put(draft(json!({}), &["urn:c1"]), &alice).unwrap();

        let mut engine = engine_over(&store);
        engine.add_source(Arc::new(FlakySource));

        let mut stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        let entries = stream.drain().unwrap();

        let objects = entries.iter().filter(|e| e.as_object().is_some()).count();
        let faults: Vec<_> = entries.iter().filter(|e| e.is_source_error()).collect();
        assert_eq!(objects, 1);
        assert_eq!(faults.len(), 1);
        match faults[0] {
            StreamEntry::SourceError { origin, message } => {
                assert_eq!(origin, "flaky-remote");
                assert!(message.contains("connection refused"));
            }
            _ => unreachable!(),
        }

        // The stream still exhausts into a usable cursor.
        assert!(stream.cursor().is_some());
    }

    // -----------------------------------------------------------------------
    // Orphan recovery
    // -----------------------------------------------------------------------

    #[test]
    fn orphans_are_recoverable_by_their_creator_only() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let bob = actor("did:web:bob");
        store.put(draft(json!({"mine": 1}), &[]), &alice).unwrap();
        store.put(draft(json!({"tagged": 1}), &["urn:c1"]), &alice).unwrap();
        store.put(draft(json!({"bobs": 1}), &[]), &bob).unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.recover_orphans(&any_schema(), &alice);
        let entries = stream.drain().unwrap();
        assert_eq!(entries.len(), 1);
        let object = entries[0].as_object().unwrap();
        assert_eq!(object.value["mine"], json!(1));
        assert!(object.is_orphan());
    }

    #[test]
    fn orphan_gaining_channels_reads_as_tombstone_on_continuation() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let url = ObjectUrl::parse("mural:stray").unwrap();
        store
            .put(draft(json!({}), &[]).with_url(url.clone()), &alice)
            .unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.recover_orphans(&any_schema(), &alice);
        assert_eq!(stream.drain().unwrap().len(), 1);

        // Adopted into a channel: no longer an orphan.
        store
            .put(draft(json!({}), &["urn:c1"]).with_url(url.clone()), &alice)
            .unwrap();

        let mut cont = stream.continuation().unwrap();
        let entries = cont.drain().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_tombstone().unwrap().url, url);
    }

    #[test]
    fn new_orphans_appear_on_continuation() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let engine = engine_over(&store);

        let mut stream = engine.recover_orphans(&any_schema(), &alice);
        assert!(stream.drain().unwrap().is_empty());

        store.put(draft(json!({"late": true}), &[]), &alice).unwrap();
        // Noise from another actor must not leak in.
        store.put(draft(json!({}), &[]), &actor("did:web:bob")).unwrap();

        let mut cont = stream.continuation().unwrap();
        let entries = cont.drain().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_object().unwrap().value["late"], json!(true));
    }

    // -----------------------------------------------------------------------
    // Channel stats
    // -----------------------------------------------------------------------

    #[test]
    fn stats_count_own_contributions_only() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let bob = actor("did:web:bob");
        store.put(draft(json!({}), &["urn:c1"]), &alice).unwrap();
        store.put(draft(json!({}), &["urn:c1", "urn:c2"]), &alice).unwrap();
        store.put(draft(json!({}), &["urn:c1"]), &bob).unwrap();

        let engine = engine_over(&store);
        let stats = engine.channel_stats(&alice).drain().unwrap();
        assert_eq!(stats.len(), 2);

        assert_eq!(stats[0].channel, channel("urn:c1"));
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[1].channel, channel("urn:c2"));
        assert_eq!(stats[1].count, 1);

        // lastModified reflects the newest of alice's own objects.
        assert!(stats[0].last_modified >= stats[1].last_modified);
        assert!(stats[0].last_modified > Timestamp::zero());
    }

    #[test]
    fn stats_ignore_deleted_objects() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let url = ObjectUrl::parse("mural:gone").unwrap();
        store
            .put(draft(json!({}), &["urn:c1"]).with_url(url.clone()), &alice)
            .unwrap();
        store.delete(&url, &alice).unwrap();

        let engine = engine_over(&store);
        assert!(engine.channel_stats(&alice).drain().unwrap().is_empty());
    }

    #[test]
    fn stats_continuation_reports_touched_channels_only() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        store.put(draft(json!({}), &["urn:busy"]), &alice).unwrap();
        store.put(draft(json!({}), &["urn:quiet"]), &alice).unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.channel_stats(&alice);
        assert_eq!(stream.drain().unwrap().len(), 2);

        store.put(draft(json!({}), &["urn:busy"]), &alice).unwrap();

        let mut cont = stream.continuation().unwrap();
        let updates = cont.drain().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].channel, channel("urn:busy"));
        assert_eq!(updates[0].count, 2);
    }

    #[test]
    fn stats_continuation_zeroes_emptied_channels() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let url = ObjectUrl::parse("mural:only").unwrap();
        store
            .put(draft(json!({}), &["urn:c1"]).with_url(url.clone()), &alice)
            .unwrap();

        let engine = engine_over(&store);
        let mut stream = engine.channel_stats(&alice);
        assert_eq!(stream.drain().unwrap().len(), 1);

        store.delete(&url, &alice).unwrap();

        let mut cont = stream.continuation().unwrap();
        let updates = cont.drain().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].channel, channel("urn:c1"));
        assert_eq!(updates[0].count, 0);
    }

    #[test]
    fn stats_continuation_rejects_other_identities() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let engine = engine_over(&store);

        let mut stream = engine.channel_stats(&alice);
        stream.drain().unwrap();
        let token = stream.cursor().unwrap().to_string();

        let mut hijacked = engine.continue_channel_stats(&token, &actor("did:web:bob"));
        assert!(matches!(
            hijacked.next().unwrap_err(),
            DiscoverError::Forbidden
        ));
    }

    // -----------------------------------------------------------------------
    // Cursor kind confusion
    // -----------------------------------------------------------------------

    #[test]
    fn cursors_do_not_cross_entry_points() {
        let store = Arc::new(MuralStore::new());
        let alice = actor("did:web:alice");
        let engine = engine_over(&store);

        let mut object_stream = engine.discover(channels(&["urn:c1"]), &any_schema(), Some(&alice));
        object_stream.drain().unwrap();
        let object_token = object_stream.cursor().unwrap().to_string();

        let mut stats_stream = engine.channel_stats(&alice);
        stats_stream.drain().unwrap();
        let stats_token = stats_stream.cursor().unwrap().to_string();

        // A stats cursor cannot resume an object stream, nor vice versa;
        // both read as unknown cursors rather than leaking kind details.
        let mut crossed = engine.continue_discover(&stats_token, Some(&alice));
        assert!(matches!(
            crossed.next().unwrap_err(),
            DiscoverError::CursorNotFound
        ));
        let mut crossed = engine.continue_channel_stats(&object_token, &alice);
        assert!(matches!(
            crossed.next().unwrap_err(),
            DiscoverError::CursorNotFound
        ));
    }
}
