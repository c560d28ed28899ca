use thiserror::Error;

/// Errors from patch application.
///
/// A failed `test` assertion is reported apart from structural failures so
/// callers can distinguish "the precondition did not hold" from "the patch
/// itself is broken". Either way the whole patch is rejected and nothing
/// is applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    /// An explicit `test` operation did not hold.
    #[error("patch test failed at operation {index}, path '{path}'")]
    TestFailed { index: usize, path: String },

    /// The patch is structurally invalid (bad pointer, impossible move).
    #[error("invalid patch at operation {index}: {reason}")]
    Invalid { index: usize, reason: String },

    /// The patched field no longer satisfies its shape invariant.
    #[error("patched {field} must remain {expected}")]
    FieldShape {
        field: &'static str,
        expected: &'static str,
    },
}

/// Result alias for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;
