//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::{BackendKind, Config, Entity, Workspace};
use crate::history::{
    ActionStatus, ChangeType, HistoryRecorder, HistoryStore, MemoryStore, RecordId, SqliteStore,
};

/// Format an EntityId for display, truncating if too long
///
/// IDs longer than 16 characters are truncated to 13 chars with "..." suffix.
/// This provides a consistent display format across all list/table outputs.
pub fn format_short_id(id: &EntityId) -> String {
    let s = id.to_string();
    if s.len() > 16 {
        format!("{}...", &s[..13])
    } else {
        s
    }
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Resolve the workspace named by `--workspace`, or discover it
pub fn workspace(global: &GlobalOpts) -> Result<Workspace> {
    Workspace::resolve(global.workspace.as_deref()).map_err(|e| miette::miette!("{}", e))
}

/// Open the history store configured for this workspace
pub fn open_store(workspace: &Workspace, config: &Config) -> Result<Arc<dyn HistoryStore>> {
    match config.history.backend() {
        BackendKind::Sqlite => {
            let store = SqliteStore::open(&workspace.history_db_path())
                .map_err(|e| miette::miette!("{}", e))?;
            Ok(Arc::new(store))
        }
        BackendKind::Memory => {
            tracing::debug!("using in-memory history store; records are not persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Build a recorder over the configured store and retry policy
pub fn open_recorder(workspace: &Workspace, config: &Config) -> Result<HistoryRecorder> {
    let store = open_store(workspace, config)?;
    Ok(HistoryRecorder::new(store).with_policy(config.history.retry_policy()))
}

/// Resolve an ID argument that must name an entity of the given type
pub fn resolve_typed_id(
    workspace: &Workspace,
    query: &str,
    prefix: EntityPrefix,
) -> Result<EntityId> {
    let id = workspace
        .resolve_id(query)
        .map_err(|e| miette::miette!("{}", e))?;
    if id.prefix() != prefix {
        return Err(miette::miette!(
            "{} is a {}, expected a {}",
            id,
            id.prefix().type_name(),
            prefix.type_name()
        ));
    }
    Ok(id)
}

/// Read an entity's YAML file
pub fn load_entity<E: Entity>(workspace: &Workspace, id: &EntityId) -> Result<(E, PathBuf)> {
    let path = workspace.entity_path(id);
    if !path.exists() {
        return Err(miette::miette!(
            "No {} found with ID {}",
            id.prefix().type_name(),
            id
        ));
    }
    let content = std::fs::read_to_string(&path).into_diagnostic()?;
    let entity: E = serde_yml::from_str(&content).into_diagnostic()?;
    Ok((entity, path))
}

/// Write an entity's YAML file, creating its directory if needed
pub fn save_entity<E: Entity>(workspace: &Workspace, entity: &E) -> Result<PathBuf> {
    let path = workspace.entity_path(entity.id());
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).into_diagnostic()?;
    }
    let yaml = serde_yml::to_string(entity).into_diagnostic()?;
    std::fs::write(&path, yaml).into_diagnostic()?;
    Ok(path)
}

/// Record the outcome of a change to the workspace
///
/// The change itself is never rolled back. If recording fails the user is
/// told what was left unrecorded and the recording error is returned.
pub fn record_change<E: Entity>(
    recorder: &HistoryRecorder,
    entity: &E,
    action_name: &str,
    change_type: ChangeType,
    status: ActionStatus,
    global: &GlobalOpts,
) -> Result<RecordId> {
    match recorder.record(entity, action_name, status, change_type) {
        Ok(id) => {
            if global.verbose {
                eprintln!(
                    "{} history {} recorded for {} ({})",
                    style("·").dim(),
                    id,
                    format_short_id(entity.id()),
                    status
                );
            }
            Ok(id)
        }
        Err(e) => {
            match status {
                ActionStatus::Success => eprintln!(
                    "{} {} was saved, but its history was not recorded",
                    style("!").yellow(),
                    entity.id()
                ),
                ActionStatus::Failure => eprintln!(
                    "{} the failed {} of {} was not recorded",
                    style("!").yellow(),
                    action_name,
                    entity.id()
                ),
            }
            Err(e.into())
        }
    }
}

/// Apply a change to the workspace, then record how it went
///
/// A failed change is recorded with [`ActionStatus::Failure`] and its own
/// error is returned, even if recording the failure also fails.
pub fn apply_and_record<E: Entity, T>(
    recorder: &HistoryRecorder,
    entity: &E,
    action_name: &str,
    change_type: ChangeType,
    global: &GlobalOpts,
    apply: impl FnOnce() -> Result<T>,
) -> Result<T> {
    match apply() {
        Ok(value) => {
            record_change(recorder, entity, action_name, change_type, ActionStatus::Success, global)?;
            Ok(value)
        }
        Err(err) => {
            eprintln!(
                "{} {} failed for {}",
                style("✗").red(),
                action_name,
                entity.id()
            );
            if let Err(record_err) = record_change(
                recorder,
                entity,
                action_name,
                change_type,
                ActionStatus::Failure,
                global,
            ) {
                tracing::warn!(entity = %entity.id(), error = %record_err, "failure not recorded");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use crate::entities::Project;
    use crate::history::{HistoryQuery, TimeRange};
    use chrono::Utc;
    use tempfile::tempdir;

    fn quiet() -> GlobalOpts {
        GlobalOpts {
            format: Some(OutputFormat::Auto),
            quiet: true,
            verbose: false,
            workspace: None,
        }
    }

    #[test]
    fn test_format_short_id() {
        let id = EntityId::new(EntityPrefix::Bug);
        let formatted = format_short_id(&id);
        // BUG- plus a 26 char ULID is longer than 16
        assert!(formatted.len() <= 16);
        assert!(formatted.ends_with("..."));
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
    }

    #[test]
    fn test_save_then_load_entity() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();
        let project = Project::new(EntityId::new(EntityPrefix::Proj), "Apollo", "alice", Utc::now());

        let path = save_entity(&ws, &project).unwrap();
        assert!(path.starts_with(ws.root().join("projects")));

        let (loaded, _) = load_entity::<Project>(&ws, &project.id).unwrap();
        assert_eq!(loaded, project);
    }

    #[test]
    fn test_resolve_typed_id_rejects_wrong_type() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();
        let project = Project::new(EntityId::new(EntityPrefix::Proj), "Apollo", "alice", Utc::now());
        save_entity(&ws, &project).unwrap();

        let prefix = &project.id.to_string()[..12];
        assert_eq!(resolve_typed_id(&ws, prefix, EntityPrefix::Proj).unwrap(), project.id);
        assert!(resolve_typed_id(&ws, prefix, EntityPrefix::Bug).is_err());
    }

    #[test]
    fn test_failed_change_is_recorded_as_failure() {
        let store = Arc::new(MemoryStore::new());
        let recorder = HistoryRecorder::new(store.clone());
        let project = Project::new(EntityId::new(EntityPrefix::Proj), "Apollo", "alice", Utc::now());

        let result: Result<()> = apply_and_record(
            &recorder,
            &project,
            "create_project",
            ChangeType::Create,
            &quiet(),
            || Err(miette::miette!("disk full")),
        );
        assert_eq!(result.unwrap_err().to_string(), "disk full");

        let latest = store.latest(&project.id).unwrap().unwrap();
        assert_eq!(latest.record.status(), ActionStatus::Failure);
        assert_eq!(latest.record.action_name(), "create_project");
    }

    #[test]
    fn test_applied_change_is_recorded_as_success() {
        let store = Arc::new(MemoryStore::new());
        let recorder = HistoryRecorder::new(store.clone());
        let project = Project::new(EntityId::new(EntityPrefix::Proj), "Apollo", "alice", Utc::now());

        let value = apply_and_record(
            &recorder,
            &project,
            "create_project",
            ChangeType::Create,
            &quiet(),
            || Ok(7),
        )
        .unwrap();
        assert_eq!(value, 7);

        let records = store
            .query_by_entity(&project.id, TimeRange::all())
            .to_vec()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.status(), ActionStatus::Success);
    }
}
