//! Test doubles shared by the integration suites
//!
//! Import via `mod common;`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use bugtrail::core::EntityId;
use bugtrail::history::{
    AppendRequest, AttemptState, EventSink, HistoryStore, RecordId, RecorderEvent, StoreError,
    StoredRecord, TimeRange,
};

/// A scripted failure for the next `append` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Fail before anything is written
    Unavailable,
    /// Report corruption before anything is written
    Corrupt,
    /// Write the record, then report a timeout as if the ack was lost
    CommitThenTimeout,
}

/// Wraps a store and injects scripted append failures
pub struct FlakyStore<S> {
    inner: S,
    faults: Mutex<VecDeque<Fault>>,
    append_calls: AtomicU32,
}

impl<S: HistoryStore> FlakyStore<S> {
    pub fn new(inner: S, faults: impl IntoIterator<Item = Fault>) -> Self {
        Self {
            inner,
            faults: Mutex::new(faults.into_iter().collect()),
            append_calls: AtomicU32::new(0),
        }
    }

    /// Number of `append` calls seen, successful or not
    pub fn append_calls(&self) -> u32 {
        self.append_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: HistoryStore> HistoryStore for FlakyStore<S> {
    fn append(&self, request: &AppendRequest) -> Result<RecordId, StoreError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.faults.lock().pop_front();
        match fault {
            None => self.inner.append(request),
            Some(Fault::Unavailable) => Err(StoreError::Unavailable("injected outage".into())),
            Some(Fault::Corrupt) => Err(StoreError::Corrupt("injected corruption".into())),
            Some(Fault::CommitThenTimeout) => {
                self.inner.append(request)?;
                Err(StoreError::Unavailable("ack lost after commit".into()))
            }
        }
    }

    fn fetch_page(
        &self,
        entity_id: &EntityId,
        range: TimeRange,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        self.inner.fetch_page(entity_id, range, after, limit)
    }

    fn latest(&self, entity_id: &EntityId) -> Result<Option<StoredRecord>, StoreError> {
        self.inner.latest(entity_id)
    }

    fn count(&self, entity_id: &EntityId) -> Result<u64, StoreError> {
        self.inner.count(entity_id)
    }

    fn entities(&self) -> Result<Vec<EntityId>, StoreError> {
        self.inner.entities()
    }
}

/// Keeps every event it receives
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<RecorderEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecorderEvent> {
        self.events.lock().clone()
    }

    /// Just the state sequence, in emission order
    pub fn states(&self) -> Vec<AttemptState> {
        self.events.lock().iter().map(|e| e.state).collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &RecorderEvent) {
        self.events.lock().push(event.clone());
    }
}
