//! Execution lifecycle orchestration
//!
//! The use-case layer: start, pause, resume, retry, skip, abort and
//! status over one execution record, composing the state machine, the
//! plan engine, the hook engine, persistence and the file system. The
//! task-running loop itself lives in [`runner`].

pub mod runner;

pub use runner::RunOutcome;

use crate::abstractions::{AgentBackend, FileSystem, GitAdapter};
use crate::config::Settings;
use crate::fsm::{lifecycle, StateMachine};
use crate::hooks::{execute_hook, HookContext};
use crate::plan;
use crate::storage::{Execution, ExecutionRepository, ExecutionStatus, Version, VersionRepository};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Reject empty or whitespace-only ids before any lookup.
fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }
    Ok(())
}

/// The six-operation surface the presentation layer binds to.
pub struct ExecutionOrchestrator {
    executions: Arc<dyn ExecutionRepository>,
    versions: Arc<dyn VersionRepository>,
    fs: Arc<dyn FileSystem>,
    git: Arc<dyn GitAdapter>,
    agent: Arc<dyn AgentBackend>,
    lifecycle: StateMachine,
    settings: Settings,
    /// Serializes `start` calls so the existing-execution check and the
    /// record insert are atomic with respect to concurrent starts.
    start_lock: Mutex<()>,
}

impl ExecutionOrchestrator {
    pub fn new(
        executions: Arc<dyn ExecutionRepository>,
        versions: Arc<dyn VersionRepository>,
        fs: Arc<dyn FileSystem>,
        git: Arc<dyn GitAdapter>,
        agent: Arc<dyn AgentBackend>,
        settings: Settings,
    ) -> Result<Self> {
        Ok(Self {
            executions,
            versions,
            fs,
            git,
            agent,
            lifecycle: lifecycle::machine()?,
            settings,
            start_lock: Mutex::new(()),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn find_execution(&self, id: &str) -> Result<Execution> {
        self.executions
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("Execution", id))
    }

    async fn find_version(&self, id: &str) -> Result<Version> {
        self.versions
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("Version", id))
    }

    /// Apply a lifecycle event to the version's dev status and persist it.
    async fn transition_version(&self, version: &Version, event: &str) -> Result<String> {
        let next = self
            .lifecycle
            .transition(&version.dev_status, event)?
            .to_string();
        self.versions.update_dev_status(&version.id, &next).await?;
        debug!(
            "Version {}: {} -{}-> {}",
            version.id, version.dev_status, event, next
        );
        Ok(next)
    }

    /// Like [`transition_version`], but a no-op when the event does not
    /// apply to the current state. Used where the execution-side and
    /// version-side states can legitimately disagree, e.g. retry while
    /// only the pause flag is set and the runner has not flipped the
    /// version to paused yet.
    async fn transition_version_if_legal(&self, version: &Version, event: &str) -> Result<()> {
        if self.lifecycle.can_transition(&version.dev_status, event) {
            self.transition_version(version, event).await?;
        } else {
            debug!(
                "Skipping lifecycle event {} for version {} in state {}",
                event, version.id, version.dev_status
            );
        }
        Ok(())
    }

    fn hook_context(&self, version: &Version, milestone_name: &str) -> HookContext {
        HookContext {
            version_name: version.name.clone(),
            project_name: version.project_name.clone(),
            milestone_name: milestone_name.to_string(),
            workdir: version.path.clone(),
        }
    }

    /// Read and parse the plan document for a version. A missing document
    /// reads as an empty plan.
    pub(crate) async fn load_plan(&self, version: &Version) -> Result<plan::ExecutionPlan> {
        let path = self.settings.plan_path(&version.path);
        let content = match self.fs.read_to_string(&path).await {
            Ok(content) => content,
            Err(_) => String::new(),
        };
        Ok(plan::parse(&content))
    }

    /// Start an execution for a version.
    ///
    /// Idempotent: when a running or paused execution already exists for
    /// the version it is returned unchanged. Requires the version to be
    /// `ready`, the agent available, a non-empty plan, and a clean (or
    /// auto-committable) working tree. The pre-execution snapshot is best
    /// effort; losing the rollback anchor must not block the start.
    pub async fn start(&self, version_id: &str) -> Result<Execution> {
        require_id("version_id", version_id)?;

        // Single-flight: a concurrent start waits here, then finds the
        // first call's execution record and returns it unchanged.
        let _guard = self.start_lock.lock().await;
        self.start_locked(version_id).await
    }

    async fn start_locked(&self, version_id: &str) -> Result<Execution> {
        let version = self.find_version(version_id).await?;

        // Idempotency first: while an execution is active the version sits
        // in executing/paused, so the ready check below would reject it.
        if let Some(existing) = self
            .executions
            .find_by_version(version_id)
            .await?
            .into_iter()
            .find(|e| e.status.is_active())
        {
            info!(
                "Version {version_id} already has an active execution {}, returning it",
                existing.id
            );
            return Ok(existing);
        }

        if version.dev_status != lifecycle::states::READY {
            return Err(Error::validation(
                "version_id",
                format!(
                    "version must be ready to start execution, currently '{}'",
                    version.dev_status
                ),
            ));
        }

        if !self.agent.is_available().await {
            return Err(Error::validation(
                "agent",
                "AI backend is not available; install and authenticate the agent CLI",
            ));
        }

        let parsed = self.load_plan(&version).await?;
        if parsed.total_tasks == 0 {
            return Err(Error::validation(
                "plan",
                "task plan is empty; scaffold the version before starting execution",
            ));
        }

        self.prepare_working_tree(&version).await?;

        // Rollback anchor for abort. Allow-empty so a clean tree still
        // yields a revision to reset to.
        let pre_execution_commit = match self
            .git
            .commit_with_options(
                &version.path,
                &format!("chore: pre-execution snapshot for {}", version.name),
                crate::abstractions::CommitOptions { allow_empty: true },
            )
            .await
        {
            Ok(revision) => Some(revision),
            Err(e) => {
                warn!("Pre-execution snapshot failed, continuing without rollback anchor: {e}");
                None
            }
        };

        let mut execution = Execution::new(version_id, parsed.total_tasks, parsed.completed_tasks);
        execution.pre_execution_commit = pre_execution_commit;
        let execution = self.executions.create(execution).await?;

        self.transition_version(&version, lifecycle::events::START)
            .await?;

        info!(
            "Started execution {} for version {version_id} ({} tasks, {} already done)",
            execution.id, execution.total_tasks, execution.completed_tasks
        );
        Ok(execution)
    }

    /// Commit a dirty working tree before execution, or refuse to start.
    async fn prepare_working_tree(&self, version: &Version) -> Result<()> {
        if !self.git.is_repo(&version.path).await {
            return Ok(());
        }
        let status = self
            .git
            .status(&version.path)
            .await
            .map_err(|e| Error::Git(e.to_string()))?;
        if status.is_clean() {
            return Ok(());
        }
        if !self.settings.auto_commit {
            return Err(Error::validation(
                "working_tree",
                "working tree has uncommitted changes; commit or stash them before starting",
            ));
        }
        let result = execute_hook(
            &self.settings.hooks.before_execution,
            &self.hook_context(version, ""),
            self.settings.auto_commit,
            self.settings.push,
            self.git.as_ref(),
        )
        .await;
        if !result.success {
            return Err(Error::Git(result.error.unwrap_or_else(|| {
                "auto-commit of dirty working tree failed".to_string()
            })));
        }
        // A skipped hook (e.g. disabled in config) leaves the tree dirty.
        if result.skipped {
            return Err(Error::validation(
                "working_tree",
                "working tree has uncommitted changes and the pre-execution auto-commit hook is disabled",
            ));
        }
        Ok(())
    }

    /// Request a cooperative pause. Only the flag is set here; the runner
    /// flips `status` to paused once it observes the flag between tasks.
    pub async fn pause(&self, execution_id: &str) -> Result<Execution> {
        require_id("execution_id", execution_id)?;
        let execution = self.find_execution(execution_id).await?;

        if execution.status != ExecutionStatus::Running {
            return Err(Error::validation(
                "execution_id",
                format!(
                    "only a running execution can be paused, currently '{:?}'",
                    execution.status
                ),
            ));
        }

        self.executions.set_paused(execution_id, true).await?;
        info!("Pause requested for execution {execution_id}; current task will finish first");
        self.find_execution(execution_id).await
    }

    /// Clear the pause flag so the runner continues with the next task.
    /// When the runner already persisted the pause, the execution goes
    /// back to running and the version lifecycle follows.
    pub async fn resume(&self, execution_id: &str) -> Result<Execution> {
        require_id("execution_id", execution_id)?;
        let execution = self.find_execution(execution_id).await?;

        if execution.status.is_terminal() {
            return Err(Error::validation(
                "execution_id",
                format!("execution is already finished ('{:?}')", execution.status),
            ));
        }

        if execution.status == ExecutionStatus::Paused {
            let version = self.find_version(&execution.version_id).await?;
            self.transition_version_if_legal(&version, lifecycle::events::RESUME)
                .await?;
            self.executions
                .update_status(execution_id, ExecutionStatus::Running, None)
                .await?;
        }
        self.executions.set_paused(&execution.id, false).await?;
        info!("Execution {execution_id} resumed");
        self.find_execution(execution_id).await
    }

    /// True when the execution is paused in either sense: the polled flag
    /// or the persisted status. Both are accepted because pause converges
    /// from two directions (user request vs. task failure).
    fn is_pausedish(execution: &Execution) -> bool {
        execution.is_paused || execution.status == ExecutionStatus::Paused
    }

    /// Re-run the task that paused the execution.
    pub async fn retry(&self, execution_id: &str, task_id: &str) -> Result<Execution> {
        require_id("execution_id", execution_id)?;
        require_id("task_id", task_id)?;
        let execution = self.find_execution(execution_id).await?;

        if !Self::is_pausedish(&execution) {
            return Err(Error::validation(
                "execution_id",
                "retry requires a paused execution",
            ));
        }

        let version = self.find_version(&execution.version_id).await?;
        self.transition_version_if_legal(&version, lifecycle::events::RETRY)
            .await?;

        self.executions
            .update_status(execution_id, ExecutionStatus::Running, None)
            .await?;
        self.executions
            .update_progress(
                execution_id,
                execution.completed_tasks,
                Some(task_id.to_string()),
                None,
            )
            .await?;
        self.executions.set_paused(execution_id, false).await?;
        info!("Retrying task {task_id} on execution {execution_id}");
        self.find_execution(execution_id).await
    }

    /// Mark a task skipped in the plan document and hand control back.
    /// Skipping counts toward progress but will not satisfy dependents.
    pub async fn skip(&self, execution_id: &str, task_id: &str) -> Result<Execution> {
        require_id("execution_id", execution_id)?;
        require_id("task_id", task_id)?;
        let execution = self.find_execution(execution_id).await?;

        if !Self::is_pausedish(&execution) {
            return Err(Error::validation(
                "execution_id",
                "skip requires a paused execution",
            ));
        }

        let version = self.find_version(&execution.version_id).await?;
        let path = self.settings.plan_path(&version.path);

        // Atomic read-modify-write touching only the task's own line.
        let content = self
            .fs
            .read_to_string(&path)
            .await
            .map_err(|_| Error::validation("plan", "plan document is missing"))?;
        let updated = plan::document::set_task_status(&content, task_id, plan::TaskStatus::Skipped)
            .ok_or_else(|| Error::not_found("Task", task_id))?;
        self.fs.write(&path, &updated).await?;

        self.transition_version_if_legal(&version, lifecycle::events::RESUME)
            .await?;

        self.executions
            .update_status(execution_id, ExecutionStatus::Running, None)
            .await?;
        self.executions
            .update_progress(execution_id, execution.completed_tasks + 1, None, None)
            .await?;
        self.executions.set_paused(execution_id, false).await?;
        info!("Skipped task {task_id} on execution {execution_id}");
        self.find_execution(execution_id).await
    }

    /// Terminal: roll the working tree back to the pre-execution snapshot
    /// when one exists and mark the execution aborted. The version drops
    /// back to ready.
    pub async fn abort(&self, execution_id: &str) -> Result<Execution> {
        require_id("execution_id", execution_id)?;
        let execution = self.find_execution(execution_id).await?;

        if execution.status.is_terminal() {
            return Err(Error::validation(
                "execution_id",
                format!(
                    "execution is already finished ('{:?}')",
                    execution.status
                ),
            ));
        }

        let version = self.find_version(&execution.version_id).await?;

        if let Some(revision) = &execution.pre_execution_commit {
            if let Err(e) = self.git.reset_hard(&version.path, revision).await {
                // The record must still close out even when the tree
                // cannot be rolled back; the anchor remains in history.
                warn!("Failed to reset working tree to {revision}: {e}");
            }
        } else {
            warn!("Execution {execution_id} has no pre-execution snapshot; leaving tree as-is");
        }

        self.transition_version(&version, lifecycle::events::ABORT)
            .await?;

        self.executions
            .update_status(execution_id, ExecutionStatus::Aborted, Some(Utc::now()))
            .await?;
        self.executions.set_paused(execution_id, false).await?;
        info!("Aborted execution {execution_id}");
        self.find_execution(execution_id).await
    }

    /// Read-only projection of the execution record.
    pub async fn get_status(&self, execution_id: &str) -> Result<Execution> {
        require_id("execution_id", execution_id)?;
        self.find_execution(execution_id).await
    }
}

#[cfg(test)]
mod tests;
