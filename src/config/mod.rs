//! Settings for the orchestrator
//!
//! Loaded from a TOML file when present, defaults otherwise. Example:
//!
//! ```toml
//! plan_file = "PLAN.md"
//! auto_commit = true
//! push = "manual"
//! state_dir = ".foreman"
//!
//! [hooks.after_task]
//! enabled = true
//! files = ["."]
//! message = "{{ project_name }} {{ version_name }}: task complete"
//! push = "auto"
//! ```

use crate::hooks::{HookConfig, PushStrategy};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-event hook configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookSettings {
    /// Runs during `start` when the working tree is dirty.
    #[serde(default = "default_before_execution")]
    pub before_execution: HookConfig,
    /// Runs after each successfully executed task.
    #[serde(default = "default_after_task")]
    pub after_task: HookConfig,
}

fn default_before_execution() -> HookConfig {
    HookConfig {
        enabled: true,
        files: vec![".".to_string()],
        message: "chore: auto-commit before execution of {{ version_name }}".to_string(),
        push: PushStrategy::Manual,
    }
}

fn default_after_task() -> HookConfig {
    HookConfig {
        enabled: true,
        files: vec![".".to_string()],
        message: "{{ project_name }} {{ version_name }} ({{ milestone_name }}): task complete"
            .to_string(),
        push: PushStrategy::Auto,
    }
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            before_execution: default_before_execution(),
            after_task: default_after_task(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Plan document file name, resolved against the version's path.
    pub plan_file: String,
    /// Master switch for all hook commits and the dirty-tree auto-commit.
    pub auto_commit: bool,
    /// Global push strategy, intersected with each hook's own.
    pub push: PushStrategy,
    /// Directory for persisted execution/version records.
    pub state_dir: PathBuf,
    pub hooks: HookSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plan_file: "PLAN.md".to_string(),
            auto_commit: true,
            push: PushStrategy::Manual,
            state_dir: PathBuf::from(".foreman"),
            hooks: HookSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Plan document path for a version working tree.
    pub fn plan_path(&self, version_path: &Path) -> PathBuf {
        version_path.join(&self.plan_file)
    }
}
