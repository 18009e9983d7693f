//! In-process history store
//!
//! Each entity owns its own log behind its own lock, so appends for
//! different entities never contend. Sequence numbers come from one shared
//! atomic counter and are drawn while the entity's lock is held, which keeps
//! them in commit order per entity.
//!
//! Not durable: everything is lost when the store is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::core::identity::{EntityId, IdempotencyKey};
use crate::history::error::StoreError;
use crate::history::store::{AppendRequest, HistoryStore, RecordId, StoredRecord, TimeRange};

#[derive(Default)]
struct EntityLog {
    records: Vec<StoredRecord>,
    keys: HashMap<IdempotencyKey, RecordId>,
}

/// Store for tests and ephemeral sessions
pub struct MemoryStore {
    next_sequence: AtomicU64,
    logs: DashMap<EntityId, Arc<Mutex<EntityLog>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_sequence: AtomicU64::new(1),
            logs: DashMap::new(),
        }
    }

    fn log_for(&self, entity_id: &EntityId) -> Option<Arc<Mutex<EntityLog>>> {
        self.logs.get(entity_id).map(|entry| Arc::clone(entry.value()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore for MemoryStore {
    fn append(&self, request: &AppendRequest) -> Result<RecordId, StoreError> {
        let entity_id = request.record.entity_id();
        // Clone the Arc out so the map shard is released before we block on
        // the entity lock.
        let log = Arc::clone(
            self.logs
                .entry(entity_id.clone())
                .or_default()
                .value(),
        );
        let mut log = log.lock();

        if let Some(existing) = log.keys.get(&request.key) {
            tracing::debug!(entity = %entity_id, key = %request.key, id = %existing, "duplicate append ignored");
            return Ok(*existing);
        }

        let floor = log.records.last().map(|last| last.record.timestamp());
        let record = request.record.not_before(floor);
        let id = RecordId::new(self.next_sequence.fetch_add(1, Ordering::SeqCst));

        log.records.push(StoredRecord {
            id,
            idempotency_key: request.key,
            record,
        });
        log.keys.insert(request.key, id);

        tracing::debug!(entity = %entity_id, id = %id, "history record appended");
        Ok(id)
    }

    fn fetch_page(
        &self,
        entity_id: &EntityId,
        range: TimeRange,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let Some(log) = self.log_for(entity_id) else {
            return Ok(Vec::new());
        };
        let log = log.lock();
        Ok(log
            .records
            .iter()
            .filter(|r| after.map_or(true, |after| r.id > after))
            .filter(|r| range.contains(r.record.timestamp()))
            .take(limit)
            .cloned()
            .collect())
    }

    fn latest(&self, entity_id: &EntityId) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self
            .log_for(entity_id)
            .and_then(|log| log.lock().records.last().cloned()))
    }

    fn count(&self, entity_id: &EntityId) -> Result<u64, StoreError> {
        Ok(self
            .log_for(entity_id)
            .map_or(0, |log| log.lock().records.len() as u64))
    }

    fn entities(&self) -> Result<Vec<EntityId>, StoreError> {
        let mut ids: Vec<EntityId> = self.logs.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityPrefix;
    use crate::entities::Project;
    use crate::history::clock::{Clock, ManualClock, SystemClock};
    use crate::history::codec::encode;
    use crate::history::record::{ActionStatus, ChangeType, HistoryRecord};
    use crate::history::store::HistoryQuery;
    use chrono::{TimeDelta, Utc};

    fn request(project: &Project, clock: &dyn Clock) -> AppendRequest {
        let record = HistoryRecord::new(
            encode(project).unwrap(),
            "save",
            ActionStatus::Success,
            ChangeType::Update,
            clock,
        )
        .unwrap();
        AppendRequest::new(record)
    }

    fn project() -> Project {
        Project::new(EntityId::new(EntityPrefix::Proj), "Apollo", "alice", Utc::now())
    }

    #[test]
    fn test_same_key_appends_once() {
        let store = MemoryStore::new();
        let p = project();
        let req = request(&p, &SystemClock);

        let first = store.append(&req).unwrap();
        let second = store.append(&req).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.count(&p.id).unwrap(), 1);
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let clock = ManualClock::new(Utc::now());
        let store = MemoryStore::new();
        let p = project();

        store.append(&request(&p, &clock)).unwrap();
        let first = clock.now();
        clock.advance(TimeDelta::seconds(-30));
        store.append(&request(&p, &clock)).unwrap();

        let records = store.query_by_entity(&p.id, TimeRange::all()).to_vec().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record.timestamp(), first);
        assert_eq!(records[1].record.timestamp(), first);
        assert!(records[1].id > records[0].id);
    }

    #[test]
    fn test_other_entities_keep_their_own_timestamps() {
        let clock = ManualClock::new(Utc::now());
        let store = MemoryStore::new();
        let (a, b) = (project(), project());

        store.append(&request(&a, &clock)).unwrap();
        clock.advance(TimeDelta::seconds(-30));
        store.append(&request(&b, &clock)).unwrap();

        let latest = store.latest(&b.id).unwrap().unwrap();
        assert_eq!(latest.record.timestamp(), clock.now());
    }

    #[test]
    fn test_pages_are_stitched_in_order() {
        let store = MemoryStore::new();
        let p = project();
        for _ in 0..7 {
            store.append(&request(&p, &SystemClock)).unwrap();
        }

        let history = store.query_by_entity(&p.id, TimeRange::all()).page_size(3);
        let ids: Vec<u64> = history.iter().map(|r| r.unwrap().id.sequence()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);

        // restartable
        assert_eq!(history.iter().count(), 7);
    }

    #[test]
    fn test_unknown_entity_is_empty() {
        let store = MemoryStore::new();
        let id = EntityId::new(EntityPrefix::Bug);
        assert!(store.latest(&id).unwrap().is_none());
        assert_eq!(store.count(&id).unwrap(), 0);
        assert!(store.query_by_entity(&id, TimeRange::all()).to_vec().unwrap().is_empty());
    }
}
