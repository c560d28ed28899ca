//! Discovery engine for mural.
//!
//! Turns the store's indexes and change log into live, resumable query
//! streams:
//!
//! - [`DiscoveryEngine::discover`] — channel queries over every backing
//!   source, masked per requester and filtered by schema
//! - [`DiscoveryEngine::recover_orphans`] — the requester's own
//!   channel-less objects
//! - [`DiscoveryEngine::channel_stats`] — per-channel aggregates over the
//!   requester's own objects
//!
//! Every stream exhausts into an opaque cursor managed by
//! [`CursorManager`]; continuations replay what changed since the
//! recorded watermark, reporting departures from the result set (delete,
//! replace out of scope, access revocation) as bare tombstones. Delivery
//! is at-least-once. Failures of a single backing source are yielded as
//! [`StreamEntry::SourceError`] items, never thrown.

pub mod cursor;
pub mod engine;
pub mod entry;
pub mod error;
pub mod query;
pub mod source;
pub mod stats;
pub mod stream;

pub use cursor::{CursorConfig, CursorManager, CursorState};
pub use engine::DiscoveryEngine;
pub use entry::{ChannelStats, StreamEntry};
pub use error::{DiscoverError, DiscoverResult};
pub use query::Query;
pub use source::{DiscoverSource, SourceFault, SourceResult};
pub use stats::StatsStream;
pub use stream::DiscoverStream;
