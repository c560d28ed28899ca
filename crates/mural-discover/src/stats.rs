use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, warn};

use mural_types::{ActorUri, ChannelUri, ObjectUrl, Timestamp};

use crate::cursor::{CursorManager, CursorState};
use crate::entry::ChannelStats;
use crate::error::{DiscoverError, DiscoverResult};
use crate::query::Query;
use crate::source::DiscoverSource;

enum StatsOrigin {
    Fresh,
    Continuation(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Pending,
    Active,
    Done,
}

/// A pull-based stream of per-channel aggregates over the caller's own
/// live objects.
///
/// Not an object stream: nothing is masked or schema-filtered because
/// every number describes the requester's own contributions. Like
/// discovery streams it exhausts into a cursor; continuing re-emits stats
/// only for channels the caller's objects touched since the watermark,
/// including zero-count entries for channels that emptied.
pub struct StatsStream {
    sources: Vec<Arc<dyn DiscoverSource>>,
    manager: Arc<CursorManager>,
    actor: ActorUri,
    origin: StatsOrigin,
    watermark: Timestamp,
    state: StreamState,
    plan: VecDeque<ChannelStats>,
    cursor: Option<String>,
}

impl StatsStream {
    pub(crate) fn fresh(
        sources: Vec<Arc<dyn DiscoverSource>>,
        manager: Arc<CursorManager>,
        actor: ActorUri,
    ) -> Self {
        let watermark = sources
            .first()
            .map(|s| s.watermark())
            .unwrap_or(Timestamp::zero());
        Self {
            sources,
            manager,
            actor,
            origin: StatsOrigin::Fresh,
            watermark,
            state: StreamState::Pending,
            plan: VecDeque::new(),
            cursor: None,
        }
    }

    pub(crate) fn resume(
        sources: Vec<Arc<dyn DiscoverSource>>,
        manager: Arc<CursorManager>,
        actor: ActorUri,
        token: String,
    ) -> Self {
        let watermark = sources
            .first()
            .map(|s| s.watermark())
            .unwrap_or(Timestamp::zero());
        Self {
            sources,
            manager,
            actor,
            origin: StatsOrigin::Continuation(token),
            watermark,
            state: StreamState::Pending,
            plan: VecDeque::new(),
            cursor: None,
        }
    }

    /// Pull the next per-channel aggregate.
    ///
    /// `Ok(None)` means exhaustion; errors only occur on the first pull
    /// of a continuation (bad cursor, identity mismatch).
    pub fn next(&mut self) -> DiscoverResult<Option<ChannelStats>> {
        if self.state == StreamState::Pending {
            self.init()?;
        }
        if self.state == StreamState::Done {
            return Ok(None);
        }
        match self.plan.pop_front() {
            Some(stats) => Ok(Some(stats)),
            None => {
                self.cursor = Some(self.manager.issue(CursorState {
                    query: Query::stats(self.actor.clone()),
                    identity: Some(self.actor.clone()),
                    watermark: self.watermark,
                }));
                self.state = StreamState::Done;
                debug!(actor = %self.actor, "stats stream exhausted");
                Ok(None)
            }
        }
    }

    /// Pull until exhaustion, collecting every aggregate.
    pub fn drain(&mut self) -> DiscoverResult<Vec<ChannelStats>> {
        let mut all = Vec::new();
        while let Some(stats) = self.next()? {
            all.push(stats);
        }
        Ok(all)
    }

    /// The opaque resumption token; present once the stream is exhausted.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// A continuation bound to the same actor; present once exhausted.
    pub fn continuation(&self) -> Option<StatsStream> {
        let token = self.cursor.clone()?;
        Some(StatsStream::resume(
            self.sources.clone(),
            Arc::clone(&self.manager),
            self.actor.clone(),
            token,
        ))
    }

    fn init(&mut self) -> DiscoverResult<()> {
        let limit = match &self.origin {
            StatsOrigin::Fresh => None,
            StatsOrigin::Continuation(token) => {
                let state = self
                    .manager
                    .resolve(token)
                    .ok_or(DiscoverError::CursorNotFound)?;
                if state.identity != Some(self.actor.clone()) {
                    return Err(DiscoverError::Forbidden);
                }
                match state.query {
                    Query::Stats { .. } => {}
                    // Object-stream cursors resume through discover.
                    _ => return Err(DiscoverError::CursorNotFound),
                }
                self.touched_channels(state.watermark)
            }
        };

        // A continuation that saw no relevant changes emits nothing.
        let skip_compute = matches!(limit, Some(ref touched) if touched.is_empty());
        self.plan = if skip_compute {
            VecDeque::new()
        } else {
            self.compute(limit.as_ref())
        };
        self.state = StreamState::Active;
        Ok(())
    }

    /// Channels touched by the actor's own changes since the watermark,
    /// or `None` when some source lost history and a full recompute is
    /// needed.
    fn touched_channels(&self, watermark: Timestamp) -> Option<BTreeSet<ChannelUri>> {
        let mut touched = BTreeSet::new();
        for source in &self.sources {
            match source.changes_since(watermark) {
                Ok(Some(changes)) => {
                    for change in changes {
                        if change.actor == self.actor {
                            touched.extend(change.channels_before.iter().cloned());
                            touched.extend(change.channels_after.iter().cloned());
                        }
                    }
                }
                Ok(None) => return None,
                Err(fault) => {
                    warn!(origin = source.origin(), %fault, "source unavailable for stats");
                }
            }
        }
        Some(touched)
    }

    /// Aggregate the actor's live objects per channel, optionally limited
    /// to a set of channels of interest.
    fn compute(&self, limit: Option<&BTreeSet<ChannelUri>>) -> VecDeque<ChannelStats> {
        let mut seen: BTreeSet<ObjectUrl> = BTreeSet::new();
        let mut totals: BTreeMap<ChannelUri, (u64, Timestamp)> = BTreeMap::new();

        for source in &self.sources {
            let urls = match source.owned_by(&self.actor) {
                Ok(urls) => urls,
                Err(fault) => {
                    warn!(origin = source.origin(), %fault, "source unavailable for stats");
                    continue;
                }
            };
            for url in urls {
                if !seen.insert(url.clone()) {
                    continue;
                }
                let record = match source.fetch(&url) {
                    Ok(record) => record,
                    Err(_) => continue,
                };
                let Some(object) = record.as_ref().and_then(|r| r.as_live()) else {
                    continue;
                };
                if object.actor != self.actor {
                    continue;
                }
                for channel in &object.channels {
                    if let Some(limit) = limit {
                        if !limit.contains(channel) {
                            continue;
                        }
                    }
                    let entry = totals
                        .entry(channel.clone())
                        .or_insert((0, Timestamp::zero()));
                    entry.0 += 1;
                    if object.last_modified > entry.1 {
                        entry.1 = object.last_modified;
                    }
                }
            }
        }

        let mut list: Vec<ChannelStats> = totals
            .into_iter()
            .map(|(channel, (count, last_modified))| ChannelStats {
                channel,
                count,
                last_modified,
            })
            .collect();
        // Touched channels with no remaining contributions still get a
        // zero entry so the consumer learns they emptied.
        if let Some(limit) = limit {
            for channel in limit {
                if !list.iter().any(|s| s.channel == *channel) {
                    list.push(ChannelStats {
                        channel: channel.clone(),
                        count: 0,
                        last_modified: Timestamp::zero(),
                    });
                }
            }
        }
        list.sort_by(|a, b| a.channel.cmp(&b.channel));
        VecDeque::from(list)
    }
}

impl std::fmt::Debug for StatsStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsStream")
            .field("actor", &self.actor)
            .field("pending", &self.plan.len())
            .finish()
    }
}
