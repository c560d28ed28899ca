use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};

/// A schema compiled once and applied to many candidate documents.
///
/// Compilation failures surface as [`SchemaError::Invalid`]; per-document
/// failures as [`SchemaError::Mismatch`].
pub struct CompiledSchema {
    compiled: JSONSchema,
}

impl CompiledSchema {
    /// Compile a schema document.
    pub fn compile(schema: &Value) -> SchemaResult<Self> {
        let compiled =
            JSONSchema::compile(schema).map_err(|e| SchemaError::Invalid(e.to_string()))?;
        Ok(Self { compiled })
    }

    /// Predicate form: does the instance satisfy the schema?
    pub fn is_match(&self, instance: &Value) -> bool {
        self.compiled.is_valid(instance)
    }

    /// Validating form: `Err(Mismatch)` with the first violation message.
    pub fn validate(&self, instance: &Value) -> SchemaResult<()> {
        match self.compiled.validate(instance) {
            Ok(()) => Ok(()),
            Err(mut errors) => {
                let first = errors
                    .next()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unsatisfied schema".to_string());
                Err(SchemaError::Mismatch(first))
            }
        }
    }
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compile_valid_schema() {
        let schema = json!({"type": "object", "required": ["a"]});
        assert!(CompiledSchema::compile(&schema).is_ok());
    }

    #[test]
    fn compile_invalid_schema_fails() {
        // "type" must be a string or array of strings.
        let schema = json!({"type": 42});
        let err = CompiledSchema::compile(&schema).unwrap_err();
        assert!(matches!(err, SchemaError::Invalid(_)));
    }

    #[test]
    fn matching_instance_passes() {
        let schema = json!({"type": "object", "required": ["a"]});
        let compiled = CompiledSchema::compile(&schema).unwrap();
        assert!(compiled.is_match(&json!({"a": 1})));
        assert!(compiled.validate(&json!({"a": 1})).is_ok());
    }

    #[test]
    fn mismatching_instance_reports_mismatch() {
        let schema = json!({"type": "object", "required": ["a"]});
        let compiled = CompiledSchema::compile(&schema).unwrap();
        assert!(!compiled.is_match(&json!({"b": 1})));
        let err = compiled.validate(&json!({"b": 1})).unwrap_err();
        assert!(matches!(err, SchemaError::Mismatch(_)));
    }

    #[test]
    fn boolean_schemas_compile() {
        let accept = CompiledSchema::compile(&json!(true)).unwrap();
        assert!(accept.is_match(&json!(null)));
        assert!(accept.is_match(&json!({"anything": [1, 2, 3]})));

        let reject = CompiledSchema::compile(&json!(false)).unwrap();
        assert!(!reject.is_match(&json!({})));
    }
}
