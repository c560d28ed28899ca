use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Number of random bytes in a generated url (128 bits).
const URL_ENTROPY_BYTES: usize = 16;

/// Scheme prefix for generated urls.
const URL_PREFIX: &str = "mural:";

/// Globally-unique primary key of a stored object.
///
/// A url is assigned once, at creation, and never changes. Generated urls
/// carry 128 bits of entropy so they cannot be guessed; caller-supplied
/// urls are any scheme-qualified string. A url outlives the object it
/// names: once deleted, the url can never hold a live object again.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    /// Generate a fresh unguessable url.
    pub fn random() -> Self {
        let mut bytes = [0u8; URL_ENTROPY_BYTES];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes[..]);
        Self(format!("{URL_PREFIX}{}", hex::encode(bytes)))
    }

    /// Parse a caller-supplied url.
    pub fn parse(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        if s.is_empty() {
            return Err(TypeError::InvalidUrl("empty string".into()));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidUrl("contains whitespace".into()));
        }
        match s.split_once(':') {
            Some((scheme, _)) if !scheme.is_empty() => Ok(Self(s)),
            _ => Err(TypeError::InvalidUrl("missing scheme".into())),
        }
    }

    /// The url as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log output (scheme plus first 8 characters of the rest).
    pub fn short(&self) -> String {
        match self.0.split_once(':') {
            Some((scheme, rest)) if rest.len() > 8 => {
                format!("{scheme}:{}..", &rest[..8])
            }
            _ => self.0.clone(),
        }
    }
}

impl fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectUrl({})", self.short())
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
