//! History record value object

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::core::identity::EntityId;
use crate::history::clock::Clock;
use crate::history::codec::Snapshot;
use crate::history::error::ValidationError;

/// Classification of the mutation being audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "create",
            ChangeType::Update => "update",
            ChangeType::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(ChangeType::Create),
            "update" => Ok(ChangeType::Update),
            "delete" => Ok(ChangeType::Delete),
            _ => Err(ValidationError::UnknownChangeType(s.to_string())),
        }
    }
}

/// Outcome of the action that triggered recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Failure,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Success => "success",
            ActionStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(ActionStatus::Success),
            "failure" => Ok(ActionStatus::Failure),
            _ => Err(ValidationError::UnknownActionStatus(s.to_string())),
        }
    }
}

/// One audited change against an entity
///
/// Immutable: there are no setters, and stores hand out clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    snapshot: Snapshot,
    action_name: String,
    status: ActionStatus,
    change_type: ChangeType,
    timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    /// Build a record stamped with the clock's current instant
    pub fn new(
        snapshot: Snapshot,
        action_name: impl Into<String>,
        status: ActionStatus,
        change_type: ChangeType,
        clock: &dyn Clock,
    ) -> Result<Self, ValidationError> {
        Self::with_timestamp(snapshot, action_name, status, change_type, clock.now())
    }

    /// Build a record with an explicit timestamp (used when reading back from a store)
    pub fn with_timestamp(
        snapshot: Snapshot,
        action_name: impl Into<String>,
        status: ActionStatus,
        change_type: ChangeType,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let action_name = action_name.into();
        validate_action_name(&action_name)?;
        Ok(Self {
            snapshot,
            action_name,
            status,
            change_type,
            timestamp,
        })
    }

    pub fn entity_id(&self) -> &EntityId {
        self.snapshot.entity_id()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    pub fn status(&self) -> ActionStatus {
        self.status
    }

    pub fn change_type(&self) -> ChangeType {
        self.change_type
    }

    /// When the change was recorded
    ///
    /// Once appended, timestamps for one entity never decrease in store order.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// This record with its timestamp raised to `floor` if it is earlier
    pub(crate) fn not_before(&self, floor: Option<DateTime<Utc>>) -> Self {
        let mut record = self.clone();
        if let Some(floor) = floor {
            record.timestamp = record.timestamp.max(floor);
        }
        record
    }
}

pub(crate) fn validate_action_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyActionName);
    }
    Ok(())
}
