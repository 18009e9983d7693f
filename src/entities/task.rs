//! Task entity type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,

    /// Owning project
    pub project: EntityId,

    pub title: String,

    #[serde(default)]
    pub done: bool,

    pub created: DateTime<Utc>,

    pub author: String,
}

impl Entity for Task {
    const PREFIX: EntityPrefix = EntityPrefix::Task;

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

impl Task {
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
            done: false,
            created,
            author: author.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_roundtrip() {
        let mut task = Task::new(
            EntityId::new(EntityPrefix::Task),
            EntityId::new(EntityPrefix::Proj),
            "Write release notes",
            "dave",
            Utc::now(),
        );
        task.done = true;

        let yaml = serde_yml::to_string(&task).unwrap();
        let parsed: Task = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed, task);
        assert!(parsed.done);
    }
}
