//! Command implementations

pub mod bug;
pub mod completions;
pub mod history;
pub mod init;
pub mod project;
pub mod task;
