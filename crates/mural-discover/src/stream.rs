use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use mural_schema::{CompiledSchema, SchemaError};
use mural_store::{ChangeKind, ChangeRecord, ObjectRecord};
use mural_types::{ActorUri, Object, ObjectUrl, Timestamp, Tombstone};

use crate::cursor::{CursorManager, CursorState};
use crate::entry::StreamEntry;
use crate::error::{DiscoverError, DiscoverResult};
use crate::query::Query;
use crate::source::DiscoverSource;

/// One unit of pending work: something to emit or somewhere to look.
enum Lead {
    /// A source failed while the plan was built; surfaces as a stream item.
    Fault { origin: String, message: String },
    /// A url found through the index scan; emitted if it currently matches.
    Candidate { source: usize, url: ObjectUrl },
    /// A recorded change since the watermark; emitted as object or tombstone.
    Change { source: usize, change: ChangeRecord },
}

/// How the stream was started.
enum Origin {
    Fresh(Query),
    /// Token resolved lazily on first pull, so bad cursors and identity
    /// mismatches surface there, not at construction.
    Continuation(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamState {
    Pending,
    Active,
    Done,
}

/// A pull-based, resumable discovery stream.
///
/// Each `next` call performs at most one candidate evaluation; abandoning
/// the stream at any point just drops it -- no resources outlive the
/// value. Ordering across candidates and across sources is unspecified.
/// After exhaustion ([`Self::next`] returns `Ok(None)`) the stream holds
/// a [`Self::cursor`] and can mint a bound [`Self::continuation`].
///
/// Continuations emit what changed since the recorded watermark: urls
/// that still hold a matching visible object come back as objects, urls
/// that were deleted, masked away, or moved out of the query's scope come
/// back as tombstones. Delivery is at-least-once; consumers deduplicate
/// by url and `lastModified` when it matters.
pub struct DiscoverStream {
    sources: Vec<Arc<dyn DiscoverSource>>,
    manager: Arc<CursorManager>,
    identity: Option<ActorUri>,
    origin: Origin,
    /// Captured at creation: the next cursor resumes from here.
    watermark: Timestamp,
    query: Option<Query>,
    schema: Option<CompiledSchema>,
    state: StreamState,
    plan: VecDeque<Lead>,
    cursor: Option<String>,
}

impl DiscoverStream {
    pub(crate) fn fresh(
        sources: Vec<Arc<dyn DiscoverSource>>,
        manager: Arc<CursorManager>,
        identity: Option<ActorUri>,
        query: Query,
    ) -> Self {
        let watermark = sources
            .first()
            .map(|s| s.watermark())
            .unwrap_or(Timestamp::zero());
        Self {
            sources,
            manager,
            identity,
            origin: Origin::Fresh(query),
            watermark,
            query: None,
            schema: None,
            state: StreamState::Pending,
            plan: VecDeque::new(),
            cursor: None,
        }
    }

    pub(crate) fn resume(
        sources: Vec<Arc<dyn DiscoverSource>>,
        manager: Arc<CursorManager>,
        identity: Option<ActorUri>,
        token: String,
    ) -> Self {
        let watermark = sources
            .first()
            .map(|s| s.watermark())
            .unwrap_or(Timestamp::zero());
        Self {
            sources,
            manager,
            identity,
            origin: Origin::Continuation(token),
            watermark,
            query: None,
            schema: None,
            state: StreamState::Pending,
            plan: VecDeque::new(),
            cursor: None,
        }
    }

    /// Pull the next entry.
    ///
    /// `Ok(None)` means the stream is exhausted and a cursor is available.
    /// Errors only occur on the first pull: a bad cursor, a continuation
    /// identity mismatch, or a schema that fails to compile.
    pub fn next(&mut self) -> DiscoverResult<Option<StreamEntry>> {
        if self.state == StreamState::Pending {
            self.init()?;
        }
        while self.state == StreamState::Active {
            let Some(lead) = self.plan.pop_front() else {
                self.cursor = self.issue_cursor();
                self.state = StreamState::Done;
                debug!("discovery stream exhausted");
                return Ok(None);
            };
            if let Some(entry) = self.process(lead) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Pull until exhaustion, collecting every entry.
    pub fn drain(&mut self) -> DiscoverResult<Vec<StreamEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// The opaque resumption token; present once the stream is exhausted.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// A continuation bound to the same query and identity; present once
    /// the stream is exhausted.
    pub fn continuation(&self) -> Option<DiscoverStream> {
        let token = self.cursor.clone()?;
        Some(DiscoverStream::resume(
            self.sources.clone(),
            Arc::clone(&self.manager),
            self.identity.clone(),
            token,
        ))
    }

    // -----------------------------------------------------------------
    // Plan construction
    // -----------------------------------------------------------------

    fn init(&mut self) -> DiscoverResult<()> {
        let (query, resume_from) = match &self.origin {
            Origin::Fresh(query) => (query.clone(), None),
            Origin::Continuation(token) => {
                let state = self
                    .manager
                    .resolve(token)
                    .ok_or(DiscoverError::CursorNotFound)?;
                if state.identity != self.identity {
                    return Err(DiscoverError::Forbidden);
                }
                if matches!(state.query, Query::Stats { .. }) {
                    // Stats cursors resume through the stats entry point.
                    return Err(DiscoverError::CursorNotFound);
                }
                (state.query, Some(state.watermark))
            }
        };

        let schema_doc = query.schema_value().ok_or_else(|| {
            DiscoverError::Schema(SchemaError::Invalid("unreadable schema".into()))
        })?;
        self.schema = Some(CompiledSchema::compile(&schema_doc)?);

        self.plan = match resume_from {
            None => self.initial_plan(&query),
            Some(watermark) => self.continuation_plan(&query, watermark),
        };
        debug!(leads = self.plan.len(), "discovery stream started");
        self.query = Some(query);
        self.state = StreamState::Active;
        Ok(())
    }

    fn initial_plan(&self, query: &Query) -> VecDeque<Lead> {
        let mut plan = VecDeque::new();
        for (idx, source) in self.sources.iter().enumerate() {
            match Self::scan_urls(source.as_ref(), query) {
                Ok(urls) => plan.extend(
                    urls.into_iter()
                        .map(|url| Lead::Candidate { source: idx, url }),
                ),
                Err(fault) => plan.push_back(Lead::Fault {
                    origin: source.origin().to_string(),
                    message: fault.message,
                }),
            }
        }
        plan
    }

    fn continuation_plan(&self, query: &Query, watermark: Timestamp) -> VecDeque<Lead> {
        let mut plan = VecDeque::new();
        for (idx, source) in self.sources.iter().enumerate() {
            match source.changes_since(watermark) {
                Ok(Some(changes)) => {
                    // Only the newest relevant change per url matters;
                    // `changes` arrives oldest first.
                    let mut latest: BTreeMap<ObjectUrl, ChangeRecord> = BTreeMap::new();
                    for change in changes {
                        if Self::relevant(query, &change) {
                            latest.insert(change.url.clone(), change);
                        }
                    }
                    plan.extend(
                        latest
                            .into_values()
                            .map(|change| Lead::Change { source: idx, change }),
                    );
                }
                Ok(None) => {
                    // The source's log was pruned past the watermark:
                    // degrade to a rescan. At-least-once allows the
                    // duplicates this produces.
                    debug!(
                        origin = source.origin(),
                        "change history pruned, falling back to rescan"
                    );
                    match Self::scan_urls(source.as_ref(), query) {
                        Ok(urls) => plan.extend(
                            urls.into_iter()
                                .map(|url| Lead::Candidate { source: idx, url }),
                        ),
                        Err(fault) => plan.push_back(Lead::Fault {
                            origin: source.origin().to_string(),
                            message: fault.message,
                        }),
                    }
                }
                Err(fault) => plan.push_back(Lead::Fault {
                    origin: source.origin().to_string(),
                    message: fault.message,
                }),
            }
        }
        plan
    }

    fn scan_urls(
        source: &dyn DiscoverSource,
        query: &Query,
    ) -> Result<BTreeSet<ObjectUrl>, crate::source::SourceFault> {
        match query {
            Query::Channels { channels, .. } => source.candidates(channels),
            Query::Orphans { actor, .. } => source.owned_by(actor),
            Query::Stats { .. } => Ok(BTreeSet::new()),
        }
    }

    /// Does a recorded change concern this query at all?
    fn relevant(query: &Query, change: &ChangeRecord) -> bool {
        match query {
            Query::Channels { channels, .. } => change.touches(channels),
            Query::Orphans { actor, .. } => {
                if change.actor != *actor {
                    return false;
                }
                match change.kind {
                    ChangeKind::Deleted => change.channels_before.is_empty(),
                    ChangeKind::Created => change.channels_after.is_empty(),
                    ChangeKind::Replaced | ChangeKind::Patched => {
                        change.channels_before.is_empty() || change.channels_after.is_empty()
                    }
                }
            }
            Query::Stats { .. } => false,
        }
    }

    // -----------------------------------------------------------------
    // Lead evaluation
    // -----------------------------------------------------------------

    /// Evaluate one lead. `None` means silently skipped.
    fn process(&self, lead: Lead) -> Option<StreamEntry> {
        match lead {
            Lead::Fault { origin, message } => Some(StreamEntry::SourceError { origin, message }),
            Lead::Candidate { source, url } => {
                let record = match self.sources[source].fetch(&url) {
                    Ok(record) => record,
                    Err(fault) => return Some(self.fault_entry(source, fault)),
                };
                // Vanished or tombstoned candidates are skipped: the
                // initial scan reports only what currently matches.
                let object = record.as_ref().and_then(|r| r.as_live())?;
                self.emit(object)
            }
            Lead::Change { source, change } => {
                let record = match self.sources[source].fetch(&change.url) {
                    Ok(record) => record,
                    Err(fault) => return Some(self.fault_entry(source, fault)),
                };
                match record {
                    // Tombstone already collected: the change record still
                    // proves the url left the result set.
                    None => Some(StreamEntry::Tombstone(Tombstone {
                        url: change.url,
                        last_modified: change.at,
                    })),
                    Some(ObjectRecord::Tombstone(stone)) => Some(StreamEntry::Tombstone(stone)),
                    Some(ObjectRecord::Live(object)) => {
                        let visible =
                            mural_acl::is_visible(&object, self.identity.as_ref());
                        if visible && self.in_scope(&object) {
                            // Still matching: re-emit the full view. A
                            // schema mismatch filters it like any other
                            // candidate.
                            self.emit(&object)
                        } else {
                            // Deleted from the requester's point of view:
                            // replaced out of scope or access revoked.
                            Some(StreamEntry::Tombstone(Tombstone {
                                url: object.url.clone(),
                                last_modified: object.last_modified,
                            }))
                        }
                    }
                }
            }
        }
    }

    /// Mask, schema-filter, and wrap a live object; `None` when it does
    /// not belong in this stream.
    fn emit(&self, object: &Object) -> Option<StreamEntry> {
        if !mural_acl::is_visible(object, self.identity.as_ref()) {
            return None;
        }
        if !self.in_scope(object) {
            return None;
        }
        let masked = match self.query.as_ref() {
            Some(Query::Channels { channels, .. }) => {
                mural_acl::mask(object, channels, self.identity.as_ref())
            }
            // Orphan recovery returns only self-authored objects; the
            // creator always sees the full view.
            _ => object.clone(),
        };
        let schema = self.schema.as_ref()?;
        if !schema.is_match(&masked.to_json()) {
            return None;
        }
        Some(StreamEntry::Object(masked))
    }

    fn in_scope(&self, object: &Object) -> bool {
        match self.query.as_ref() {
            Some(Query::Channels { channels, .. }) => {
                object.channels.iter().any(|c| channels.contains(c))
            }
            Some(Query::Orphans { actor, .. }) => object.actor == *actor && object.is_orphan(),
            _ => false,
        }
    }

    fn fault_entry(&self, source: usize, fault: crate::source::SourceFault) -> StreamEntry {
        StreamEntry::SourceError {
            origin: self.sources[source].origin().to_string(),
            message: fault.message,
        }
    }

    fn issue_cursor(&self) -> Option<String> {
        let query = self.query.clone()?;
        Some(self.manager.issue(CursorState {
            query,
            identity: self.identity.clone(),
            watermark: self.watermark,
        }))
    }
}

impl std::fmt::Debug for DiscoverStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoverStream")
            .field("state", &self.state)
            .field("pending_leads", &self.plan.len())
            .finish()
    }
}
