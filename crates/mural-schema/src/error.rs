use thiserror::Error;

/// Errors from schema compilation and validation.
///
/// The two variants are deliberately distinct: [`SchemaError::Invalid`]
/// means the schema itself is malformed and the whole query it belongs to
/// must fail; [`SchemaError::Mismatch`] means one candidate document did
/// not satisfy an otherwise-valid schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema is structurally malformed.
    #[error("invalid schema: {0}")]
    Invalid(String),

    /// The instance does not satisfy the schema.
    #[error("schema mismatch: {0}")]
    Mismatch(String),
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
