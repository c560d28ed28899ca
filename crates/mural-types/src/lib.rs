//! Foundation types for mural.
//!
//! This crate provides the identity, temporal, and data-model types used
//! throughout the mural system. Every other mural crate depends on
//! `mural-types`.
//!
//! # Key Types
//!
//! - [`ActorUri`] — identity URI of an object creator
//! - [`ChannelUri`] — discoverability tag URI
//! - [`ObjectUrl`] — unguessable primary key of a stored object
//! - [`Timestamp`] — strictly ordered modification timestamp
//! - [`Object`] / [`ObjectDraft`] / [`Tombstone`] — the object data model

pub mod error;
pub mod object;
pub mod timestamp;
pub mod uri;
pub mod url;

pub use error::TypeError;
pub use object::{Object, ObjectDraft, Tombstone};
pub use timestamp::Timestamp;
pub use uri::{ActorUri, ChannelUri};
pub use url::ObjectUrl;
