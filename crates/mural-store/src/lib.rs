//! Authoritative object store for mural.
//!
//! [`MuralStore`] owns the `url → live object | tombstone` mapping and
//! enforces the mutation contract: only the creating actor may replace,
//! patch, or delete; modification timestamps increase strictly across the
//! per-url serialized order; a deleted url never holds a live object
//! again. Visibility failures collapse into `NotFound` so callers cannot
//! probe for restricted objects.
//!
//! # Structure
//!
//! - [`MuralStore`] — the store itself (per-url slot locks, no global
//!   mutation lock)
//! - [`ChangeLog`] — bounded mutation log backing continuation streams;
//!   owns the monotonic [`StoreClock`]
//! - [`EventBus`] — broadcast fan-out of mutation events to subscribers
//! - [`ObjectRecord`] — what a url currently holds
//!
//! # Design Rules
//!
//! 1. Mutations serialize per url; different urls never contend.
//! 2. The channel and owner indexes are updated inside the mutating
//!    url's critical section, before the change is visible.
//! 3. Reads are lock-free apart from the per-slot mutex; scans never
//!    block mutations beyond that.
//! 4. A freshness race may hide a just-created object from discovery,
//!    never show a deleted one as live.

pub mod changelog;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod record;
pub mod store;

pub use changelog::{ChangeKind, ChangeLog, ChangeRecord};
pub use clock::StoreClock;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use events::{EventBus, EventFilter, EventId, EventStream, StoreEvent};
pub use record::ObjectRecord;
pub use store::MuralStore;
