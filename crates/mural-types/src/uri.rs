use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Check the minimal URI shape shared by actor and channel identifiers:
/// non-empty, no whitespace, and a scheme separated by `:`.
fn check_uri(kind: &'static str, s: &str) -> Result<(), TypeError> {
    if s.is_empty() {
        return Err(TypeError::uri(kind, "empty string"));
    }
    if s.chars().any(char::is_whitespace) {
        return Err(TypeError::uri(kind, "contains whitespace"));
    }
    match s.split_once(':') {
        Some((scheme, _)) if !scheme.is_empty() => Ok(()),
        _ => Err(TypeError::uri(kind, "missing scheme")),
    }
}

/// Globally-unique identity URI of an actor.
///
/// Actors own the objects they create. The URI is opaque to mural -- any
/// scheme-qualified string works ("did:web:alice.example", "mailto:bob@...").
/// Equality is plain string equality.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorUri(String);

impl ActorUri {
    /// Parse an actor URI, validating the minimal shape.
    pub fn parse(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        check_uri("actor", &s)?;
        Ok(Self(s))
    }

    /// The URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ActorUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorUri({})", self.0)
    }
}

impl fmt::Display for ActorUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A discoverability tag URI.
///
/// Channels are many-to-many with objects: an object lists the channels it
/// wants to be found in, and a discovery query names the channels it is
/// willing to look at. Channels carry no access semantics by themselves.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelUri(String);

impl ChannelUri {
    /// Parse a channel URI, validating the minimal shape.
    pub fn parse(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        check_uri("channel", &s)?;
        Ok(Self(s))
    }

    /// The URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ChannelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelUri({})", self.0)
    }
}

impl fmt::Display for ChannelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
