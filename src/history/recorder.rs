//! History recorder facade
//!
//! Domain code calls [`HistoryRecorder::record`] after it has applied a
//! change. The recorder snapshots the entity, stamps the record, and appends
//! it to the injected store, retrying transient failures with bounded
//! exponential backoff under a single idempotency key.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, IdempotencyKey};
use crate::history::clock::{Clock, SystemClock};
use crate::history::codec::encode;
use crate::history::error::{RecordingError, StoreError};
use crate::history::events::{AttemptState, EventSink, RecorderEvent, TracingSink};
use crate::history::record::{validate_action_name, ActionStatus, ChangeType, HistoryRecord};
use crate::history::store::{AppendRequest, HistoryStore, RecordId};

/// Bounded exponential backoff for transient store failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total append attempts, including the first (at least 1)
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub base_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
    /// Randomize each delay within [delay/2, delay]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(1000),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Retry without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        if self.jitter && !delay.is_zero() {
            let half = delay / 2;
            half + rand::rng().random_range(Duration::ZERO..=half)
        } else {
            delay
        }
    }
}

/// Records entity changes into a history store
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    policy: RetryPolicy,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Record one change to `entity`
    ///
    /// Validation and encoding errors are returned before the store is
    /// touched. The caller's change is never undone on failure.
    pub fn record<E: Entity>(
        &self,
        entity: &E,
        action_name: &str,
        status: ActionStatus,
        change_type: ChangeType,
    ) -> Result<RecordId, RecordingError> {
        let attempt = Attempt {
            sink: self.sink.as_ref(),
            key: IdempotencyKey::generate(),
            entity_id: entity.id().clone(),
            action_name: action_name.to_string(),
        };
        attempt.emit(AttemptState::Pending, 0, None, None, None);

        if let Err(e) = validate_action_name(action_name) {
            attempt.emit(AttemptState::Rejected, 0, None, Some(e.to_string()), None);
            return Err(e.into());
        }

        attempt.emit(AttemptState::Encoding, 0, None, None, None);
        let record = encode(entity)
            .map_err(RecordingError::from)
            .and_then(|snapshot| {
                HistoryRecord::new(snapshot, action_name, status, change_type, self.clock.as_ref())
                    .map_err(RecordingError::from)
            });
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                attempt.emit(AttemptState::Rejected, 0, None, Some(e.to_string()), None);
                return Err(e);
            }
        };

        let request = AppendRequest {
            key: attempt.key,
            record,
        };
        self.append_with_retry(&attempt, &request)
    }

    fn append_with_retry(
        &self,
        attempt: &Attempt<'_>,
        request: &AppendRequest,
    ) -> Result<RecordId, RecordingError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut n = 1;
        loop {
            attempt.emit(AttemptState::Appending, n, None, None, None);
            match self.store.append(request) {
                Ok(id) => {
                    attempt.emit(AttemptState::Committed, n, Some(id), None, None);
                    return Ok(id);
                }
                Err(err @ StoreError::Corrupt(_)) => {
                    attempt.emit(AttemptState::FailedFatal, n, None, Some(err.to_string()), None);
                    return Err(RecordingError::Fatal {
                        entity_id: attempt.entity_id.clone(),
                        source: err,
                    });
                }
                Err(err @ StoreError::Unavailable(_)) => {
                    if n >= max_attempts {
                        attempt.emit(
                            AttemptState::FailedTransient,
                            n,
                            None,
                            Some(err.to_string()),
                            None,
                        );
                        return Err(RecordingError::Failed {
                            entity_id: attempt.entity_id.clone(),
                            attempts: n,
                            source: err,
                        });
                    }
                    let delay = self.policy.delay_after(n);
                    attempt.emit(
                        AttemptState::FailedTransient,
                        n,
                        None,
                        Some(err.to_string()),
                        Some(delay),
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    n += 1;
                }
            }
        }
    }
}

/// Identity shared by every event of one `record` call
struct Attempt<'a> {
    sink: &'a dyn EventSink,
    key: IdempotencyKey,
    entity_id: EntityId,
    action_name: String,
}

impl Attempt<'_> {
    fn emit(
        &self,
        state: AttemptState,
        attempt: u32,
        record_id: Option<RecordId>,
        error: Option<String>,
        retry_in: Option<Duration>,
    ) {
        self.sink.emit(&RecorderEvent {
            key: self.key,
            entity_id: self.entity_id.clone(),
            action_name: self.action_name.clone(),
            state,
            attempt,
            record_id,
            error,
            retry_in,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            jitter: false,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(10));
        assert_eq!(policy.delay_after(2), Duration::from_millis(20));
        assert_eq!(policy.delay_after(3), Duration::from_millis(40));
        assert_eq!(policy.delay_after(4), Duration::from_millis(50));
        assert_eq!(policy.delay_after(40), Duration::from_millis(50));
    }

    #[test]
    fn test_jitter_stays_within_half_to_full() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            jitter: true,
        };
        for _ in 0..50 {
            let d = policy.delay_after(2);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_immediate_never_sleeps() {
        let policy = RetryPolicy::immediate(0);
        assert_eq!(policy.max_attempts, 1);
        assert!(policy.delay_after(3).is_zero());
    }
}
