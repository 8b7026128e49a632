//! Source-control hook engine
//!
//! Runs the configured commit/push step after state-affecting operations.
//! The engine never returns a Rust error: every outcome, including adapter
//! failures, is reported through [`HookResult`] so callers can log it and
//! move on. A push failure in particular must not look like a commit
//! failure; the commit already happened and stays.

use crate::abstractions::git::GitAdapter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Whether commits are pushed automatically. The effective decision
/// intersects the caller's global strategy with the hook's own: pushing
/// happens only when both are `Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushStrategy {
    #[default]
    Auto,
    Manual,
    Disabled,
}

impl PushStrategy {
    pub fn is_auto(&self) -> bool {
        matches!(self, PushStrategy::Auto)
    }
}

/// Configuration for one hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Paths to stage; a literal `.` stages everything.
    #[serde(default = "default_files")]
    pub files: Vec<String>,
    /// Commit message template; `{{ version_name }}`, `{{ project_name }}`
    /// and `{{ milestone_name }}` are substituted.
    pub message: String,
    #[serde(default)]
    pub push: PushStrategy,
}

fn default_enabled() -> bool {
    true
}

fn default_files() -> Vec<String> {
    vec![".".to_string()]
}

impl HookConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            files: default_files(),
            message: String::new(),
            push: PushStrategy::Manual,
        }
    }
}

/// Values substituted into the commit message template.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub version_name: String,
    pub project_name: String,
    pub milestone_name: String,
    pub workdir: PathBuf,
}

/// Outcome of one hook run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookResult {
    pub success: bool,
    pub skipped: bool,
    pub skipped_reason: Option<String>,
    pub commit_hash: Option<String>,
    pub pushed: bool,
    pub push_failed: bool,
    pub push_error: Option<String>,
    pub error: Option<String>,
}

impl HookResult {
    fn skipped(reason: &str) -> Self {
        Self {
            success: true,
            skipped: true,
            skipped_reason: Some(reason.to_string()),
            ..Self::default()
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Self::default()
        }
    }
}

fn render_message(template: &str, context: &HookContext) -> String {
    let mut tera_context = tera::Context::new();
    tera_context.insert("version_name", &context.version_name);
    tera_context.insert("project_name", &context.project_name);
    tera_context.insert("milestone_name", &context.milestone_name);

    match tera::Tera::one_off(template, &tera_context, false) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!("Commit message template failed to render, using raw template: {e}");
            template.to_string()
        }
    }
}

/// Execute the commit/push hook. Skip conditions are checked in order and
/// short-circuit with `success=true`; any failure up to and including the
/// commit is fatal; a push failure is absorbed into the result.
pub async fn execute_hook(
    config: &HookConfig,
    context: &HookContext,
    commit_enabled: bool,
    push_strategy: PushStrategy,
    git: &dyn GitAdapter,
) -> HookResult {
    if !config.enabled {
        return HookResult::skipped("Auto-commit hook disabled");
    }
    if !commit_enabled {
        return HookResult::skipped("Auto-commit disabled in settings");
    }
    if !git.is_repo(&context.workdir).await {
        return HookResult::skipped("Not a git repository");
    }

    let status = match git.status(&context.workdir).await {
        Ok(status) => status,
        Err(e) => return HookResult::failed(format!("Failed to check git status: {e}")),
    };
    if status.is_clean() {
        return HookResult::skipped("No changes to commit");
    }

    if let Err(e) = git.add(&context.workdir, &config.files).await {
        return HookResult::failed(format!("Failed to stage files: {e}"));
    }

    let message = render_message(&config.message, context);
    let commit_hash = match git.commit(&context.workdir, &message).await {
        Ok(hash) => hash,
        Err(e) => return HookResult::failed(format!("Failed to commit: {e}")),
    };
    debug!("Hook committed {commit_hash}");

    let mut result = HookResult {
        success: true,
        commit_hash: Some(commit_hash),
        ..HookResult::default()
    };

    let should_push = push_strategy.is_auto()
        && config.push.is_auto()
        && git.has_remote(&context.workdir).await;
    if should_push {
        match git.push(&context.workdir, None).await {
            Ok(()) => result.pushed = true,
            Err(e) => {
                // The commit stands; pushing can be retried by hand.
                warn!("Push failed after commit: {e}");
                result.push_failed = true;
                result.push_error = Some(e.to_string());
            }
        }
    }

    result
}
