//! Entity type definitions
//!
//! Bugtrail tracks three entity types:
//!
//! - [`Project`] - A body of work with an optional deadline
//! - [`Bug`] - A defect reported against a project
//! - [`Task`] - A unit of work inside a project

pub mod bug;
pub mod project;
pub mod task;

pub use bug::Bug;
pub use project::Project;
pub use task::Task;
