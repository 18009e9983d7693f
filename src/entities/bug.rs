//! Bug entity type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::{BugStatus, Entity, Priority};
use crate::core::identity::{EntityId, EntityPrefix};

/// A defect reported against a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bug {
    /// Unique identifier
    pub id: EntityId,

    /// Owning project
    pub project: EntityId,

    /// Bug title/summary
    pub title: String,

    /// Steps to reproduce, expected vs actual behavior
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: BugStatus,

    /// Person working on the fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Author (who reported this bug)
    pub author: String,
}

impl Entity for Bug {
    const PREFIX: EntityPrefix = EntityPrefix::Bug;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn author(&self) -> &str {
        &self.author
    }
}

impl Bug {
    /// Create a new open bug with medium priority
    pub fn new(
        id: EntityId,
        project: EntityId,
        title: impl Into<String>,
        author: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project,
            title: title.into(),
            description: None,
            priority: Priority::default(),
            status: BugStatus::default(),
            assignee: None,
            created,
            author: author.into(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == BugStatus::Closed
    }
}
