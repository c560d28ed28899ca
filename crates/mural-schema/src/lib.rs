//! JSON Schema validation leaf for mural.
//!
//! Wraps the external schema compiler behind [`CompiledSchema`]: compile a
//! schema once, apply it to many candidate documents. A malformed schema
//! ([`SchemaError::Invalid`]) is reported distinctly from a document that
//! fails an otherwise-valid schema ([`SchemaError::Mismatch`]): the former
//! fails a whole query up front, the latter only filters one candidate.

pub mod error;
pub mod validator;

pub use error::{SchemaError, SchemaResult};
pub use validator::CompiledSchema;
