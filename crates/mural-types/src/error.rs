use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid {kind} uri: {reason}")]
    InvalidUri { kind: &'static str, reason: String },

    #[error("invalid object url: {0}")]
    InvalidUrl(String),
}

impl TypeError {
    pub(crate) fn uri(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            kind,
            reason: reason.into(),
        }
    }
}
