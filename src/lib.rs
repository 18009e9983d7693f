//! Bugtrail: project, bug and task tracking with an append-only audit history
//!
//! Entities live as YAML files in a workspace. Every change made through the
//! CLI is also recorded into a history store (see [`history`]).

pub mod cli;
pub mod core;
pub mod entities;
pub mod history;
