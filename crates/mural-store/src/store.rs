use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;
use tracing::{debug, info};

use mural_index::{ChannelIndex, OwnerIndex};
use mural_patch::FieldPatches;
use mural_schema::CompiledSchema;
use mural_types::{ActorUri, ChannelUri, Object, ObjectDraft, ObjectUrl, Timestamp, Tombstone};

use crate::changelog::{ChangeKind, ChangeLog, ChangeRecord};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::events::{EventBus, EventFilter, EventStream, StoreEvent};
use crate::record::ObjectRecord;

/// One url's record, serialized behind its own mutex.
///
/// `None` means the url has never held an object. Tombstones stay in the
/// slot until garbage collection retires the url.
type Slot = Arc<Mutex<Option<ObjectRecord>>>;

/// The authoritative object store.
///
/// Maps urls to live objects or tombstones and enforces the mutation
/// contract: only the creator mutates, timestamps increase strictly
/// across the per-url serialized order, and a deleted url never holds a
/// live object again. Mutations on different urls proceed independently;
/// cross-object reads never take a store-wide lock.
///
/// Every mutation also maintains the channel and owner indexes, appends
/// to the change log backing continuation streams, and publishes an
/// event on the bus.
pub struct MuralStore {
    slots: RwLock<HashMap<ObjectUrl, Slot>>,
    /// Urls whose tombstones were garbage collected. Kept so the
    /// no-resurrection rule survives tombstone GC.
    retired: RwLock<HashSet<ObjectUrl>>,
    channels: ChannelIndex,
    owners: OwnerIndex,
    changelog: ChangeLog,
    events: EventBus,
    config: StoreConfig,
    mutation_count: AtomicU64,
}

impl MuralStore {
    /// Create a store with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store with explicit configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            retired: RwLock::new(HashSet::new()),
            channels: ChannelIndex::new(),
            owners: OwnerIndex::new(),
            changelog: ChangeLog::new(config.changelog_capacity),
            events: EventBus::new(config.event_capacity),
            config,
            mutation_count: AtomicU64::new(0),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------

    /// Create or replace an object.
    ///
    /// With no url in the draft a fresh unguessable url is minted. With a
    /// url, an existing live object there must belong to `actor`
    /// (`Forbidden` if it is visible to them, `NotFound` if it is not --
    /// overwriting a restricted object one cannot see is indistinguishable
    /// from creating anew, which is exactly the point). A tombstoned url
    /// is never reusable.
    ///
    /// Returns the previous object state with its timestamp bumped to the
    /// mutation time, or `None` if the url was fresh.
    pub fn put(&self, draft: ObjectDraft, actor: &ActorUri) -> StoreResult<Option<Object>> {
        let url = match draft.url {
            Some(ref url) => url.clone(),
            None => ObjectUrl::random(),
        };
        if self.is_retired(&url) {
            return Err(StoreError::NotFound(url));
        }

        let slot = self.slot_or_create(&url);
        let mut guard = slot.lock().expect("slot mutex poisoned");
        if self.is_retired(&url) {
            return Err(StoreError::NotFound(url));
        }

        let previous = match guard.as_ref() {
            None => None,
            Some(ObjectRecord::Tombstone(_)) => {
                return Err(StoreError::NotFound(url));
            }
            Some(ObjectRecord::Live(existing)) => {
                if existing.actor != *actor {
                    if mural_acl::is_visible(existing, Some(actor)) {
                        return Err(StoreError::Forbidden { url });
                    }
                    return Err(StoreError::NotFound(url));
                }
                Some(existing.clone())
            }
        };

        let channels_before = previous
            .as_ref()
            .map(|p| p.channels.clone())
            .unwrap_or_default();
        let kind = if previous.is_some() {
            ChangeKind::Replaced
        } else {
            ChangeKind::Created
        };

        self.channels.apply(&url, &channels_before, &draft.channels);
        self.owners.record(actor, &url);
        let at = self.changelog.append(
            &url,
            actor,
            kind,
            channels_before,
            draft.channels.clone(),
        );

        let object = Object {
            url: url.clone(),
            actor: actor.clone(),
            value: draft.value,
            channels: draft.channels,
            allowed: draft.allowed,
            last_modified: at,
        };
        self.events.publish(&StoreEvent::new(
            at,
            kind,
            url.clone(),
            actor.clone(),
            object.channels.clone(),
        ));
        *guard = Some(ObjectRecord::Live(object));
        drop(guard);

        debug!(url = %url.short(), actor = %actor, %kind, "object stored");
        self.after_mutation();

        Ok(previous.map(|mut p| {
            p.last_modified = at;
            p
        }))
    }

    /// Patch an object's fields in place, all-or-nothing.
    ///
    /// Requires the requester to be the creator. Returns the pre-patch
    /// object with its timestamp bumped to the mutation time.
    pub fn patch(
        &self,
        url: &ObjectUrl,
        patches: &FieldPatches,
        actor: &ActorUri,
    ) -> StoreResult<Object> {
        let slot = self
            .slot(url)
            .ok_or_else(|| StoreError::NotFound(url.clone()))?;
        let mut guard = slot.lock().expect("slot mutex poisoned");

        let existing = match guard.as_mut() {
            Some(ObjectRecord::Live(object)) => object,
            _ => return Err(StoreError::NotFound(url.clone())),
        };
        if existing.actor != *actor {
            if mural_acl::is_visible(existing, Some(actor)) {
                return Err(StoreError::Forbidden { url: url.clone() });
            }
            return Err(StoreError::NotFound(url.clone()));
        }

        // Apply against clones first; nothing commits on failure.
        let fields = mural_patch::apply_to_object(existing, patches)?;

        let channels_before = existing.channels.clone();
        self.channels.apply(url, &channels_before, &fields.channels);
        let at = self.changelog.append(
            url,
            actor,
            ChangeKind::Patched,
            channels_before,
            fields.channels.clone(),
        );

        let mut previous = existing.clone();
        previous.last_modified = at;

        existing.value = fields.value;
        existing.channels = fields.channels;
        existing.allowed = fields.allowed;
        existing.last_modified = at;

        self.events.publish(&StoreEvent::new(
            at,
            ChangeKind::Patched,
            url.clone(),
            actor.clone(),
            existing.channels.clone(),
        ));
        drop(guard);

        debug!(url = %url.short(), actor = %actor, "object patched");
        self.after_mutation();

        Ok(previous)
    }

    /// Delete an object, leaving a tombstone.
    ///
    /// Requires the requester to be the creator. Returns the pre-delete
    /// object with its timestamp bumped to the deletion time.
    pub fn delete(&self, url: &ObjectUrl, actor: &ActorUri) -> StoreResult<Object> {
        let slot = self
            .slot(url)
            .ok_or_else(|| StoreError::NotFound(url.clone()))?;
        let mut guard = slot.lock().expect("slot mutex poisoned");

        let existing = match guard.as_ref() {
            Some(ObjectRecord::Live(object)) => object,
            _ => return Err(StoreError::NotFound(url.clone())),
        };
        if existing.actor != *actor {
            if mural_acl::is_visible(existing, Some(actor)) {
                return Err(StoreError::Forbidden { url: url.clone() });
            }
            return Err(StoreError::NotFound(url.clone()));
        }

        let channels_before = existing.channels.clone();
        self.channels.apply(url, &channels_before, &BTreeSet::new());
        self.owners.forget(actor, url);
        let at = self.changelog.append(
            url,
            actor,
            ChangeKind::Deleted,
            channels_before,
            BTreeSet::new(),
        );

        let mut previous = existing.clone();
        previous.last_modified = at;

        *guard = Some(ObjectRecord::Tombstone(Tombstone {
            url: url.clone(),
            last_modified: at,
        }));
        self.events.publish(&StoreEvent::new(
            at,
            ChangeKind::Deleted,
            url.clone(),
            actor.clone(),
            BTreeSet::new(),
        ));
        drop(guard);

        info!(url = %url.short(), actor = %actor, "object deleted");
        self.after_mutation();

        Ok(previous)
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    /// Fetch the masked, schema-validated view of one object.
    ///
    /// A single-object get has no queried channel set, so non-creators
    /// see no channels at all. Absent, deleted, and invisible objects are
    /// indistinguishable (`NotFound`).
    pub fn get(
        &self,
        url: &ObjectUrl,
        schema: &Value,
        requester: Option<&ActorUri>,
    ) -> StoreResult<Object> {
        let compiled = CompiledSchema::compile(schema)?;

        let record = self
            .fetch(url)
            .ok_or_else(|| StoreError::NotFound(url.clone()))?;
        let object = match record {
            ObjectRecord::Live(object) => object,
            ObjectRecord::Tombstone(_) => return Err(StoreError::NotFound(url.clone())),
        };
        if !mural_acl::is_visible(&object, requester) {
            return Err(StoreError::NotFound(url.clone()));
        }

        let masked = mural_acl::mask(&object, &BTreeSet::new(), requester);
        compiled.validate(&masked.to_json())?;
        Ok(masked)
    }

    /// The raw record at a url, if any. Access control is the caller's
    /// responsibility -- this is the read surface for the discovery
    /// engine, which masks before emitting.
    pub fn fetch(&self, url: &ObjectUrl) -> Option<ObjectRecord> {
        let slot = self.slot(url)?;
        let guard = slot.lock().expect("slot mutex poisoned");
        guard.clone()
    }

    /// Deduplicated union of channel-index buckets for a query.
    pub fn candidates(&self, channels: &BTreeSet<ChannelUri>) -> BTreeSet<ObjectUrl> {
        self.channels.candidates(channels.iter())
    }

    /// All live urls created by `actor`.
    pub fn owned_by(&self, actor: &ActorUri) -> BTreeSet<ObjectUrl> {
        self.owners.urls_for(actor)
    }

    /// Changes recorded strictly after `watermark`, or `None` when the
    /// log has been pruned past it.
    pub fn changes_since(&self, watermark: Timestamp) -> Option<Vec<ChangeRecord>> {
        self.changelog.since(watermark)
    }

    /// The watermark a new discovery stream should record: every later
    /// mutation is guaranteed to appear in `changes_since` of it.
    pub fn watermark(&self) -> Timestamp {
        self.changelog.high_watermark()
    }

    /// Subscribe to mutation events matching `filter`.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.events.subscribe(filter)
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        let slots = self.slots.read().expect("slot map lock poisoned");
        slots
            .values()
            .filter(|slot| {
                slot.lock()
                    .expect("slot mutex poisoned")
                    .as_ref()
                    .and_then(|r| r.as_live())
                    .is_some()
            })
            .count()
    }

    // -----------------------------------------------------------------
    // Garbage collection
    // -----------------------------------------------------------------

    /// Retire tombstones older than the configured retention.
    ///
    /// The url itself stays permanently unusable: retired urls are kept
    /// in a compact set so the no-resurrection rule outlives the
    /// tombstone record. Returns the number of tombstones collected.
    pub fn gc_tombstones(&self) -> usize {
        let cutoff_ms = Timestamp::wall_now()
            .ms
            .saturating_sub(self.config.tombstone_retention.as_millis() as u64);

        let expired: Vec<ObjectUrl> = {
            let slots = self.slots.read().expect("slot map lock poisoned");
            slots
                .iter()
                .filter(|(_, slot)| {
                    let guard = slot.lock().expect("slot mutex poisoned");
                    matches!(
                        guard.as_ref(),
                        Some(ObjectRecord::Tombstone(stone)) if stone.last_modified.ms <= cutoff_ms
                    )
                })
                .map(|(url, _)| url.clone())
                .collect()
        };
        if expired.is_empty() {
            return 0;
        }

        // Retire first, then drop the slots: a concurrent put always sees
        // either the tombstone or the retired mark.
        {
            let mut retired = self.retired.write().expect("retired set lock poisoned");
            retired.extend(expired.iter().cloned());
        }
        let mut slots = self.slots.write().expect("slot map lock poisoned");
        for url in &expired {
            slots.remove(url);
        }
        debug!(count = expired.len(), "tombstones retired");
        expired.len()
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn slot(&self, url: &ObjectUrl) -> Option<Slot> {
        let slots = self.slots.read().expect("slot map lock poisoned");
        slots.get(url).cloned()
    }

    fn slot_or_create(&self, url: &ObjectUrl) -> Slot {
        let mut slots = self.slots.write().expect("slot map lock poisoned");
        slots
            .entry(url.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    fn is_retired(&self, url: &ObjectUrl) -> bool {
        self.retired
            .read()
            .expect("retired set lock poisoned")
            .contains(url)
    }

    fn after_mutation(&self) {
        let count = self.mutation_count.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.gc_interval > 0 && count % self.config.gc_interval == 0 {
            self.gc_tombstones();
        }
    }
}

impl Default for MuralStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MuralStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuralStore")
            .field("live_objects", &self.live_count())
            .field("changelog_entries", &self.changelog.len())
            .finish()
    }
}
