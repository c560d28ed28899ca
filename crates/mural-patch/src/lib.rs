//! Field-scoped JSON Patch capability for mural.
//!
//! The store never interprets patch semantics itself -- this crate wraps
//! the external RFC 6902 engine behind a narrow contract: apply ordered
//! operations to a document, fail the whole patch on a `test` mismatch or
//! structural error, and enforce the shape each object field must keep
//! after patching (`value` stays an object, `channels` stays a set of
//! channel uris, `allowed` stays a set of actor uris or absent).

pub mod apply;
pub mod error;

pub use apply::{apply, apply_to_object, FieldPatches, PatchedFields};
pub use error::{PatchError, PatchResult};

// Callers build operations against the same RFC 6902 type the engine uses.
pub use json_patch::PatchOperation;
