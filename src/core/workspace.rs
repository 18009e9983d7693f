//! Workspace discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::identity::{EntityId, EntityPrefix};

/// Name of the marker directory holding config and the history database
const MARKER_DIR: &str = ".bugtrail";

/// File name of the SQLite history database inside the marker directory
const HISTORY_DB: &str = "history.db";

/// Represents a bugtrail workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Root directory of the workspace (parent of .bugtrail/)
    root: PathBuf,
}

impl Workspace {
    /// Find workspace root by walking up from the current directory
    pub fn discover() -> Result<Self, WorkspaceError> {
        let current =
            std::env::current_dir().map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find workspace root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, WorkspaceError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        loop {
            if current.join(MARKER_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(WorkspaceError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Use an explicit root, or discover one from the current directory
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, WorkspaceError> {
        match explicit {
            Some(path) => Self::discover_from(path),
            None => Self::discover(),
        }
    }

    /// Create a new workspace structure at the given path
    pub fn init(path: &Path) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if root.join(MARKER_DIR).exists() {
            return Err(WorkspaceError::AlreadyExists(root));
        }

        Self::init_force(&root)
    }

    /// Force initialization even if .bugtrail/ exists
    ///
    /// The history database is left untouched; only config and directories
    /// are (re)written.
    pub fn init_force(path: &Path) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let marker = root.join(MARKER_DIR);

        std::fs::create_dir_all(&marker).map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        std::fs::write(marker.join("config.yaml"), Self::default_config())
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        for prefix in EntityPrefix::all() {
            std::fs::create_dir_all(root.join(Self::entity_directory(*prefix)))
                .map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        }

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# Bugtrail Workspace Configuration

# Default author for new entities (can be overridden by global config)
# author: ""

# Default output format (auto, yaml, json, tsv)
# default_format: auto

# History recording
history:
  # Storage backend (sqlite, memory)
  backend: sqlite
  # Attempts per record before giving up on a transient store failure
  max_attempts: 5
  # Exponential backoff between attempts
  base_delay_ms: 20
  max_delay_ms: 1000
  jitter: true
"#
    }

    /// Get the workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .bugtrail configuration directory
    pub fn marker_dir(&self) -> PathBuf {
        self.root.join(MARKER_DIR)
    }

    /// Path of the SQLite history database
    pub fn history_db_path(&self) -> PathBuf {
        self.marker_dir().join(HISTORY_DB)
    }

    /// Get the directory for a given entity prefix
    pub fn entity_directory(prefix: EntityPrefix) -> &'static str {
        match prefix {
            EntityPrefix::Proj => "projects",
            EntityPrefix::Bug => "bugs",
            EntityPrefix::Task => "tasks",
        }
    }

    /// Get the path for an entity file
    pub fn entity_path(&self, id: &EntityId) -> PathBuf {
        self.root
            .join(Self::entity_directory(id.prefix()))
            .join(format!("{}.yaml", id))
    }

    /// Iterate all entity files of a given prefix type
    pub fn iter_entity_files(&self, prefix: EntityPrefix) -> impl Iterator<Item = PathBuf> {
        let dir = self.root.join(Self::entity_directory(prefix));
        walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(move |e| {
                let name = e.file_name().to_string_lossy();
                name.ends_with(".yaml") && EntityPrefix::from_filename(&name) == Some(prefix)
            })
            .map(|e| e.path().to_path_buf())
    }

    /// Resolve a full or partial (unique prefix of the ULID) entity ID
    pub fn resolve_id(&self, query: &str) -> Result<EntityId, WorkspaceError> {
        if let Ok(id) = EntityId::parse(query) {
            return Ok(id);
        }

        let upper = query.to_uppercase();
        let mut matches = Vec::new();
        for prefix in EntityPrefix::all() {
            for path in self.iter_entity_files(*prefix) {
                let stem = path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.strip_suffix(".yaml"))
                    .unwrap_or_default()
                    .to_string();
                if stem.starts_with(&upper) {
                    if let Ok(id) = EntityId::parse(&stem) {
                        matches.push(id);
                    }
                }
            }
        }

        match matches.len() {
            0 => Err(WorkspaceError::UnknownEntity(query.to_string())),
            1 => Ok(matches.remove(0)),
            n => Err(WorkspaceError::AmbiguousId {
                query: query.to_string(),
                matches: n,
            }),
        }
    }
}

/// Errors that can occur during workspace operations
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("not a bugtrail workspace (searched from {searched_from:?}). Run 'bugtrail init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("bugtrail workspace already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("no entity matches '{0}'")]
    UnknownEntity(String),

    #[error("'{query}' matches {matches} entities; use more characters")]
    AmbiguousId { query: String, matches: usize },

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_workspace_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();

        assert!(ws.marker_dir().join("config.yaml").exists());
        assert!(ws.root().join("projects").is_dir());
        assert!(ws.root().join("bugs").is_dir());
        assert!(ws.root().join("tasks").is_dir());
    }

    #[test]
    fn test_workspace_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path()).unwrap();

        let err = Workspace::init(tmp.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists(_)));
    }

    #[test]
    fn test_workspace_discover_from_nested_dir() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("bugs/nested");
        std::fs::create_dir_all(&subdir).unwrap();

        let ws = Workspace::discover_from(&subdir).unwrap();
        assert_eq!(
            ws.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_workspace_discover_fails_without_marker() {
        let tmp = tempdir().unwrap();
        let err = Workspace::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound { .. }));
    }

    #[test]
    fn test_resolve_partial_id() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();
        let id = EntityId::new(EntityPrefix::Bug);
        std::fs::write(ws.entity_path(&id), "id: x\n").unwrap();

        let partial = &id.to_string()[..12];
        assert_eq!(ws.resolve_id(partial).unwrap(), id);
        assert!(matches!(
            ws.resolve_id("PROJ-ZZZ"),
            Err(WorkspaceError::UnknownEntity(_))
        ));
    }
}
