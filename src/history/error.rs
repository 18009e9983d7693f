//! Error taxonomy for the history subsystem

use miette::Diagnostic;
use thiserror::Error;

use crate::core::identity::EntityId;

/// A history record could not be constructed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("action name must not be empty")]
    EmptyActionName,

    #[error("unknown change type '{0}' (valid: create, update, delete)")]
    UnknownChangeType(String),

    #[error("unknown action status '{0}' (valid: success, failure)")]
    UnknownActionStatus(String),
}

/// An entity snapshot could not be produced or read back
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("failed to serialize {entity_type}: {message}")]
    Serialize {
        entity_type: &'static str,
        message: String,
    },

    #[error("{entity_type} must serialize to a map of fields")]
    NotAnObject { entity_type: &'static str },

    #[error("snapshot nesting exceeds {limit} levels")]
    TooDeep { limit: usize },

    #[error("snapshot holds a {found}, expected a {expected}")]
    TypeMismatch { expected: String, found: String },

    #[error("snapshot digest mismatch: recorded {recorded}, computed {computed}")]
    DigestMismatch { recorded: String, computed: String },

    #[error("failed to rebuild entity from snapshot: {0}")]
    Deserialize(String),
}

/// Failure reported by a history store backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transient; the same append may be retried
    #[error("history store unavailable: {0}")]
    Unavailable(String),

    /// Integrity failure; retrying will not help
    #[error("history store corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Outcome of a failed `HistoryRecorder::record` call
///
/// None of these undo the domain change that triggered recording.
#[derive(Debug, Error, Diagnostic)]
pub enum RecordingError {
    #[error("invalid history record: {0}")]
    #[diagnostic(code(bugtrail::history::validation))]
    Validation(#[from] ValidationError),

    #[error("could not snapshot entity: {0}")]
    #[diagnostic(code(bugtrail::history::encoding))]
    Encoding(#[from] EncodingError),

    #[error("history for {entity_id} not recorded after {attempts} attempts: {source}")]
    #[diagnostic(
        code(bugtrail::history::failed),
        help("the change itself was applied; its audit entry is missing and must be reconciled")
    )]
    Failed {
        entity_id: EntityId,
        attempts: u32,
        source: StoreError,
    },

    #[error("history store unusable while recording {entity_id}: {source}")]
    #[diagnostic(
        code(bugtrail::history::fatal),
        help("stop recording until the history store has been repaired")
    )]
    Fatal {
        entity_id: EntityId,
        source: StoreError,
    },
}

impl RecordingError {
    /// Whether recording should halt until an operator intervenes
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecordingError::Fatal { .. })
    }
}
