//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::Workspace;

/// Bugtrail configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default author for new entities
    pub author: Option<String>,

    /// Default output format
    pub default_format: Option<String>,

    /// History recording settings
    pub history: HistoryConfig,
}

/// Which store implementation backs the history log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Memory,
}

/// Retry and backend settings for the history recorder
///
/// Every field is optional so a higher layer only overrides what it sets.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub backend: Option<BackendKind>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<bool>,
}

impl HistoryConfig {
    fn merge(&mut self, other: HistoryConfig) {
        if other.backend.is_some() {
            self.backend = other.backend;
        }
        if other.max_attempts.is_some() {
            self.max_attempts = other.max_attempts;
        }
        if other.base_delay_ms.is_some() {
            self.base_delay_ms = other.base_delay_ms;
        }
        if other.max_delay_ms.is_some() {
            self.max_delay_ms = other.max_delay_ms;
        }
        if other.jitter.is_some() {
            self.jitter = other.jitter;
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.backend.unwrap_or_default()
    }

    /// Resolve into a concrete retry policy, filling in defaults
    pub fn retry_policy(&self) -> crate::history::RetryPolicy {
        let defaults = crate::history::RetryPolicy::default();
        crate::history::RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            base_delay: self
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_delay: self
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            jitter: self.jitter.unwrap_or(defaults.jitter),
        }
    }
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        Self::load_for(Workspace::discover().ok().as_ref())
    }

    /// Load configuration using an already-resolved workspace
    pub fn load_for(workspace: Option<&Workspace>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/bugtrail/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 3. Workspace config (.bugtrail/config.yaml)
        if let Some(ws) = workspace {
            if let Some(local) = Self::read_file(&ws.marker_dir().join("config.yaml")) {
                config.merge(local);
            }
        }

        // 4. Environment variables
        if let Ok(author) = std::env::var("BUGTRAIL_AUTHOR") {
            config.author = Some(author);
        }
        if let Some(attempts) = std::env::var("BUGTRAIL_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.history.max_attempts = Some(attempts);
        }

        config
    }

    fn read_file(path: &std::path::Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "bugtrail")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        self.history.merge(other.history);
    }

    /// Get the author name, falling back to git config or username
    pub fn author(&self) -> String {
        if let Some(ref author) = self.author {
            return author.clone();
        }

        if let Ok(output) = std::process::Command::new("git")
            .args(["config", "user.name"])
            .output()
        {
            if output.status.success() {
                let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_layer_overrides_only_what_it_sets() {
        let mut base: Config = serde_yml::from_str(
            "author: alice\nhistory:\n  max_attempts: 3\n  base_delay_ms: 50\n",
        )
        .unwrap();
        let local: Config = serde_yml::from_str("history:\n  max_attempts: 7\n").unwrap();
        base.merge(local);

        assert_eq!(base.author.as_deref(), Some("alice"));
        assert_eq!(base.history.max_attempts, Some(7));
        assert_eq!(base.history.base_delay_ms, Some(50));
    }

    #[test]
    fn test_retry_policy_defaults_and_floor() {
        let cfg = HistoryConfig {
            max_attempts: Some(0),
            ..Default::default()
        };
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(20));
    }

    #[test]
    fn test_backend_parses_lowercase() {
        let cfg: Config = serde_yml::from_str("history:\n  backend: memory\n").unwrap();
        assert_eq!(cfg.history.backend(), BackendKind::Memory);
        assert_eq!(Config::default().history.backend(), BackendKind::Sqlite);
    }
}
