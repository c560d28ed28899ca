//! Derived indexes for mural.
//!
//! Both indexes are pure lookup structures maintained as a side effect of
//! store mutations:
//!
//! - [`ChannelIndex`] maps channel uris to member object urls and bounds
//!   the search space of channel discovery.
//! - [`OwnerIndex`] maps actors to their live objects and backs orphan
//!   recovery and channel statistics.
//!
//! Neither index decides visibility; access control runs against the
//! authoritative object record at fetch time.

pub mod channel;
pub mod owner;

pub use channel::ChannelIndex;
pub use owner::OwnerIndex;
