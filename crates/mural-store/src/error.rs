use mural_patch::PatchError;
use mural_schema::SchemaError;
use mural_types::ObjectUrl;

/// Errors from object store operations.
///
/// `NotFound` deliberately covers three indistinguishable causes: the url
/// was never used, the object was deleted, or the object exists but the
/// requester may not see it. Collapsing them prevents probing for the
/// existence of restricted objects. `Forbidden` is reserved for the one
/// case where the object is known to the requester (visible) but owned by
/// someone else.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No visible live object at this url.
    #[error("no object at {0}")]
    NotFound(ObjectUrl),

    /// The object is visible but belongs to another actor.
    #[error("{url} belongs to another actor")]
    Forbidden { url: ObjectUrl },

    /// Patch application failed; nothing was mutated.
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// Schema compilation or validation failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
