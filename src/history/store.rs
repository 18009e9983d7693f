//! History store contract
//!
//! A store is an append-only log of [`HistoryRecord`]s keyed by entity.
//!
//! ## Ordering
//!
//! Every successful append is assigned a sequence number from a single
//! monotonically increasing counter. Inside the same critical section the
//! store raises the record's timestamp to the entity's latest timestamp if
//! the writer's clock is behind, so an entity's timestamps never decrease.
//! Queries order by timestamp and break ties by sequence number, which makes
//! the two orders identical.
//!
//! ## Idempotency
//!
//! Appends carry an [`IdempotencyKey`]. Re-sending a request whose key has
//! already been committed for that entity returns the original [`RecordId`]
//! and writes nothing.
//!
//! ## Atomicity
//!
//! An append either commits completely or leaves no trace.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

use crate::core::identity::{EntityId, IdempotencyKey};
use crate::history::error::StoreError;
use crate::history::record::HistoryRecord;

/// Default number of records fetched per page by [`HistoryIter`]
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Store-assigned identity of an appended record: its sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    pub fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    pub fn sequence(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A record as persisted, with the metadata the store stamped on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub idempotency_key: IdempotencyKey,
    pub record: HistoryRecord,
}

/// One logical append attempt
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub key: IdempotencyKey,
    pub record: HistoryRecord,
}

impl AppendRequest {
    pub fn new(record: HistoryRecord) -> Self {
        Self {
            key: IdempotencyKey::generate(),
            record,
        }
    }
}

/// Inclusive window over record timestamps; open ends are unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn until(to: DateTime<Utc>) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| instant >= from) && self.to.map_or(true, |to| instant <= to)
    }
}

/// Append-only persistence for history records
///
/// Implementations must be safe to share across threads. Sequence numbers
/// for one entity must be assigned in commit order with no duplicates.
pub trait HistoryStore: Send + Sync {
    /// Durably persist one record, or return the id already committed under
    /// the same idempotency key
    fn append(&self, request: &AppendRequest) -> Result<RecordId, StoreError>;

    /// Records for `entity_id` inside `range` with a sequence number greater
    /// than `after`, in ascending order, at most `limit` of them
    fn fetch_page(
        &self,
        entity_id: &EntityId,
        range: TimeRange,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// The most recently committed record for an entity
    fn latest(&self, entity_id: &EntityId) -> Result<Option<StoredRecord>, StoreError>;

    /// Number of records held for an entity
    fn count(&self, entity_id: &EntityId) -> Result<u64, StoreError>;

    /// Every entity that has at least one record, sorted
    fn entities(&self) -> Result<Vec<EntityId>, StoreError>;
}

/// Entry point for by-entity queries, available on concrete stores and on
/// `dyn HistoryStore`
pub trait HistoryQuery {
    fn query_by_entity(&self, entity_id: &EntityId, range: TimeRange) -> EntityHistory<'_>;
}

impl<S: HistoryStore> HistoryQuery for S {
    fn query_by_entity(&self, entity_id: &EntityId, range: TimeRange) -> EntityHistory<'_> {
        EntityHistory::new(self, entity_id.clone(), range)
    }
}

impl HistoryQuery for dyn HistoryStore {
    fn query_by_entity(&self, entity_id: &EntityId, range: TimeRange) -> EntityHistory<'_> {
        EntityHistory::new(self, entity_id.clone(), range)
    }
}

/// A restartable view of one entity's history
///
/// Nothing is read until iteration starts; each call to [`EntityHistory::iter`]
/// starts again from the oldest record and pages through the store lazily.
pub struct EntityHistory<'a> {
    store: &'a (dyn HistoryStore + 'a),
    entity_id: EntityId,
    range: TimeRange,
    page_size: usize,
}

impl<'a> EntityHistory<'a> {
    pub fn new(store: &'a (dyn HistoryStore + 'a), entity_id: EntityId, range: TimeRange) -> Self {
        Self {
            store,
            entity_id,
            range,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn iter(&self) -> HistoryIter<'a> {
        HistoryIter {
            store: self.store,
            entity_id: self.entity_id.clone(),
            range: self.range,
            page_size: self.page_size,
            buffer: VecDeque::new(),
            after: None,
            exhausted: false,
        }
    }

    /// Read the whole window into memory
    pub fn to_vec(&self) -> Result<Vec<StoredRecord>, StoreError> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &EntityHistory<'a> {
    type Item = Result<StoredRecord, StoreError>;
    type IntoIter = HistoryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy, finite iterator over one entity's records
pub struct HistoryIter<'a> {
    store: &'a (dyn HistoryStore + 'a),
    entity_id: EntityId,
    range: TimeRange,
    page_size: usize,
    buffer: VecDeque<StoredRecord>,
    after: Option<RecordId>,
    exhausted: bool,
}

impl Iterator for HistoryIter<'_> {
    type Item = Result<StoredRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self
                .store
                .fetch_page(&self.entity_id, self.range, self.after, self.page_size)
            {
                Ok(page) => {
                    if page.len() < self.page_size {
                        self.exhausted = true;
                    }
                    if let Some(last) = page.last() {
                        self.after = Some(last.id);
                    }
                    self.buffer.extend(page);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
