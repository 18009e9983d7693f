//! Entity trait - common interface for all entity types

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// Common trait for all tracked entities
///
/// The history subsystem treats entities as opaque: it only needs the
/// identifier and a serde representation to snapshot.
pub trait Entity: Serialize + DeserializeOwned + 'static {
    /// The entity type prefix (e.g., PROJ, BUG)
    const PREFIX: EntityPrefix;

    /// Get the entity's unique ID
    fn id(&self) -> &EntityId;

    /// Get the entity's title
    fn title(&self) -> &str;

    /// Get the creation timestamp
    fn created(&self) -> DateTime<Utc>;

    /// Get the author
    fn author(&self) -> &str;
}

/// Bug priority
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Bug lifecycle status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum BugStatus {
    #[default]
    Opened,
    InProgress,
    Closed,
}

impl std::fmt::Display for BugStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BugStatus::Opened => write!(f, "opened"),
            BugStatus::InProgress => write!(f, "in_progress"),
            BugStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for BugStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "opened" | "open" => Ok(BugStatus::Opened),
            "in_progress" => Ok(BugStatus::InProgress),
            "closed" => Ok(BugStatus::Closed),
            _ => Err(format!("Unknown bug status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bug_status_parse_accepts_dashes() {
        assert_eq!("in-progress".parse::<BugStatus>().unwrap(), BugStatus::InProgress);
        assert_eq!("OPENED".parse::<BugStatus>().unwrap(), BugStatus::Opened);
        assert!("triaged".parse::<BugStatus>().is_err());
    }

    #[test]
    fn test_bug_status_serde_matches_display() {
        let yaml = serde_yml::to_string(&BugStatus::InProgress).unwrap();
        assert_eq!(yaml.trim(), BugStatus::InProgress.to_string());
    }

    #[test]
    fn test_priority_roundtrip() {
        for p in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(p.to_string().parse::<Priority>().unwrap(), p);
        }
    }
}
