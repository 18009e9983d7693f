//! Structured recorder events
//!
//! The recorder reports every state transition of a record attempt to an
//! [`EventSink`]. Production code uses [`TracingSink`]; tests install their
//! own sink and assert on the events directly.

use std::fmt;
use std::time::Duration;

use crate::core::identity::{EntityId, IdempotencyKey};
use crate::history::store::RecordId;

/// Where a single record attempt currently stands
///
/// `Pending -> Encoding -> Appending -> Committed`, with `Appending ->
/// FailedTransient -> Appending` on retry. `Committed`, `FailedFatal`,
/// `Rejected` and a non-retried `FailedTransient` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptState {
    Pending,
    Encoding,
    Appending,
    Committed,
    FailedTransient,
    FailedFatal,
    /// Validation or encoding failed; the store was never contacted
    Rejected,
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptState::Pending => "pending",
            AttemptState::Encoding => "encoding",
            AttemptState::Appending => "appending",
            AttemptState::Committed => "committed",
            AttemptState::FailedTransient => "failed_transient",
            AttemptState::FailedFatal => "failed_fatal",
            AttemptState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderEvent {
    pub key: IdempotencyKey,
    pub entity_id: EntityId,
    pub action_name: String,
    pub state: AttemptState,
    /// 1-based append attempt; 0 before the first append
    pub attempt: u32,
    pub record_id: Option<RecordId>,
    pub error: Option<String>,
    /// Set on `FailedTransient` when another attempt follows after this delay
    pub retry_in: Option<Duration>,
}

impl RecorderEvent {
    pub fn is_terminal(&self) -> bool {
        match self.state {
            AttemptState::Committed | AttemptState::FailedFatal | AttemptState::Rejected => true,
            AttemptState::FailedTransient => self.retry_in.is_none(),
            _ => false,
        }
    }
}

/// Receiver of recorder events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RecorderEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &RecorderEvent) {
        let entity = event.entity_id.to_string();
        let key = event.key.to_string();
        match event.state {
            AttemptState::Committed => tracing::debug!(
                %entity, %key, action = %event.action_name, attempt = event.attempt,
                id = ?event.record_id.map(|id| id.sequence()),
                "history recorded"
            ),
            AttemptState::FailedTransient if event.retry_in.is_some() => tracing::warn!(
                %entity, %key, attempt = event.attempt,
                retry_in_ms = event.retry_in.map_or(0, |d| d.as_millis() as u64),
                error = event.error.as_deref().unwrap_or_default(),
                "history append failed, retrying"
            ),
            AttemptState::FailedTransient => tracing::error!(
                %entity, %key, attempts = event.attempt,
                error = event.error.as_deref().unwrap_or_default(),
                "history append gave up"
            ),
            AttemptState::FailedFatal => tracing::error!(
                %entity, %key,
                error = event.error.as_deref().unwrap_or_default(),
                "history store reported corruption"
            ),
            AttemptState::Rejected => tracing::warn!(
                %entity, %key, action = %event.action_name,
                error = event.error.as_deref().unwrap_or_default(),
                "history record rejected"
            ),
            state => tracing::trace!(%entity, %key, %state, attempt = event.attempt),
        }
    }
}
