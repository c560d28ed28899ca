use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use mural_types::{ActorUri, Timestamp};

use crate::error::{DiscoverError, DiscoverResult};
use crate::query::Query;

/// Number of random bytes in a cursor token (128 bits).
const TOKEN_ENTROPY_BYTES: usize = 16;

/// Everything needed to resume a discovery stream: the typed query, the
/// identity it ran under, and the change-log watermark it reached.
///
/// The state itself never leaves the manager; the opaque token is the
/// capability that names it. [`CursorState::encode`] exists so an
/// embedding host can snapshot the table across restarts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    pub query: Query,
    pub identity: Option<ActorUri>,
    pub watermark: Timestamp,
}

impl CursorState {
    /// Compact binary encoding for host-side persistence.
    pub fn encode(&self) -> DiscoverResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| DiscoverError::Serialization(e.to_string()))
    }

    /// Decode a persisted state. Corrupted bytes fail like an unknown
    /// cursor -- never partially.
    pub fn decode(bytes: &[u8]) -> DiscoverResult<Self> {
        bincode::deserialize(bytes).map_err(|_| DiscoverError::CursorNotFound)
    }
}

/// Configuration for the cursor table.
#[derive(Clone, Debug)]
pub struct CursorConfig {
    /// How long an issued cursor stays resolvable.
    pub ttl: Duration,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
        }
    }
}

struct StoredCursor {
    state: CursorState,
    expires_at: Instant,
}

/// Table of issued cursors, keyed by opaque unguessable token.
///
/// Resolution does not consume the cursor: a terminal value can be
/// continued both through its token and through the bound continuation,
/// and each continuation issues a fresh cursor of its own. Expired
/// entries resolve to nothing, exactly like tokens that never existed.
pub struct CursorManager {
    entries: RwLock<HashMap<String, StoredCursor>>,
    config: CursorConfig,
}

impl CursorManager {
    /// Create a manager with default configuration.
    pub fn new() -> Self {
        Self::with_config(CursorConfig::default())
    }

    /// Create a manager with explicit configuration.
    pub fn with_config(config: CursorConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Issue a fresh token for the given stream state.
    pub fn issue(&self, state: CursorState) -> String {
        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes[..]);
        let token = hex::encode(bytes);

        let mut entries = self.entries.write().expect("cursor table lock poisoned");
        entries.insert(
            token.clone(),
            StoredCursor {
                state,
                expires_at: Instant::now() + self.config.ttl,
            },
        );
        debug!(cursor = %token, total = entries.len(), "cursor issued");
        token
    }

    /// Resolve a token to its stream state.
    ///
    /// Unknown and expired tokens both return `None`; an expired entry is
    /// dropped on the way out.
    pub fn resolve(&self, token: &str) -> Option<CursorState> {
        {
            let entries = self.entries.read().expect("cursor table lock poisoned");
            match entries.get(token) {
                None => return None,
                Some(stored) if stored.expires_at > Instant::now() => {
                    return Some(stored.state.clone());
                }
                Some(_) => {}
            }
        }
        // Expired: drop the entry before reporting absence.
        let mut entries = self.entries.write().expect("cursor table lock poisoned");
        entries.remove(token);
        None
    }

    /// Drop all expired entries; returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("cursor table lock poisoned");
        let before = entries.len();
        entries.retain(|_, stored| stored.expires_at > now);
        before - entries.len()
    }

    /// Number of live entries (including not-yet-pruned expired ones).
    pub fn len(&self) -> usize {
        self.entries.read().expect("cursor table lock poisoned").len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CursorManager {
    fn default() -> Self {
        Self::new()
    }
}
