use mural_schema::SchemaError;
use thiserror::Error;

/// Errors from discovery streams and cursor handling.
///
/// Stream-level failures of a single backing source are not errors at all
/// -- they surface as tagged [`crate::StreamEntry::SourceError`] items so
/// one bad source cannot abort an otherwise-healthy scan. Everything here
/// terminates the call it is returned from.
#[derive(Debug, Error)]
pub enum DiscoverError {
    /// Unknown, corrupted, or expired cursor. Raised on the first pull of
    /// a continuation; deliberately indistinguishable across the three
    /// causes.
    #[error("unknown or expired cursor")]
    CursorNotFound,

    /// The continuation was pulled under a different identity than the
    /// stream it resumes.
    #[error("continuation identity does not match the originating stream")]
    Forbidden,

    /// The query's schema failed to compile. Raised on the first pull,
    /// before any results, since the schema is query-invariant.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Cursor state could not be serialized for persistence.
    #[error("cursor state serialization: {0}")]
    Serialization(String),
}

/// Result alias for discovery operations.
pub type DiscoverResult<T> = Result<T, DiscoverError>;
