//! Core module - fundamental types and utilities

pub mod config;
pub mod entity;
pub mod identity;
pub mod workspace;

pub use config::{BackendKind, Config, HistoryConfig};
pub use entity::{BugStatus, Entity, Priority};
pub use identity::{EntityId, EntityPrefix, IdParseError, IdempotencyKey};
pub use workspace::{Workspace, WorkspaceError};
