use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use mural_types::{ActorUri, ObjectUrl};

/// Derived index from creating actor to the urls of their live objects.
///
/// Backs orphan recovery and per-actor channel statistics. Tombstoned
/// urls are removed -- the index only ever names live objects.
#[derive(Debug, Default)]
pub struct OwnerIndex {
    owners: RwLock<HashMap<ActorUri, BTreeSet<ObjectUrl>>>,
}

impl OwnerIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `actor` owns a live object at `url`.
    pub fn record(&self, actor: &ActorUri, url: &ObjectUrl) {
        self.owners
            .write()
            .expect("owner index lock poisoned")
            .entry(actor.clone())
            .or_default()
            .insert(url.clone());
    }

    /// Remove a url from an actor's holdings (the object was deleted).
    pub fn forget(&self, actor: &ActorUri, url: &ObjectUrl) {
        let mut owners = self.owners.write().expect("owner index lock poisoned");
        if let Some(urls) = owners.get_mut(actor) {
            urls.remove(url);
            if urls.is_empty() {
                owners.remove(actor);
            }
        }
    }

    /// All live urls owned by `actor`.
    pub fn urls_for(&self, actor: &ActorUri) -> BTreeSet<ObjectUrl> {
        let owners = self.owners.read().expect("owner index lock poisoned");
        owners.get(actor).cloned().unwrap_or_default()
    }

    /// Number of actors with at least one live object.
    pub fn actor_count(&self) -> usize {
        self.owners.read().expect("owner index lock poisoned").len()
    }
}
