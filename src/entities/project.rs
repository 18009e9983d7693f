//! Project entity type

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};

/// A project groups bugs and tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: EntityId,

    /// Short project name
    pub name: String,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Target completion date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Author (who created this project)
    pub author: String,
}

impl Entity for Project {
    const PREFIX: EntityPrefix = EntityPrefix::Proj;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> &str {
        &self.name
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn author(&self) -> &str {
        &self.author
    }
}

impl Project {
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        author: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            deadline: None,
            created,
            author: author.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_creation() {
        let project = Project::new(EntityId::new(EntityPrefix::Proj), "Apollo", "alice", Utc::now());
        assert!(project.id.to_string().starts_with("PROJ-"));
        assert_eq!(project.title(), "Apollo");
        assert!(project.deadline.is_none());
    }

    #[test]
    fn test_project_roundtrip() {
        let mut project =
            Project::new(EntityId::new(EntityPrefix::Proj), "Apollo", "alice", Utc::now());
        project.deadline = NaiveDate::from_ymd_opt(2023, 12, 25);

        let yaml = serde_yml::to_string(&project).unwrap();
        let parsed: Project = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed.deadline, NaiveDate::from_ymd_opt(2023, 12, 25));
        assert_eq!(parsed, project);

        // The emitter may quote the date; either way it reads back as a string
        let raw: serde_yml::Value = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(raw["deadline"].as_str(), Some("2023-12-25"));
    }

    #[test]
    fn test_missing_optionals_are_skipped() {
        let project = Project::new(EntityId::new(EntityPrefix::Proj), "Apollo", "alice", Utc::now());
        let yaml = serde_yml::to_string(&project).unwrap();
        assert!(!yaml.contains("deadline"));
        assert!(!yaml.contains("description"));
    }
}
