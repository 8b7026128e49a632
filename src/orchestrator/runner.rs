//! The task-running loop
//!
//! Drives one execution: pick the next runnable task, hand it to the
//! agent, record the outcome, repeat. The pause flag is polled between
//! tasks only; an in-flight task always runs to completion. Task failures
//! are never retried here; they pause the execution and wait for an
//! explicit retry or skip decision.

use super::ExecutionOrchestrator;
use crate::fsm::lifecycle;
use crate::hooks::execute_hook;
use crate::plan::{self, NextTask, TaskStatus};
use crate::storage::{Execution, ExecutionStatus};
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Why the runner stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every task is completed or skipped.
    Completed,
    /// The pause flag was observed between tasks.
    Paused,
    /// No pending task is runnable; the anchor task awaits a skip or
    /// abort decision.
    Blocked {
        task_id: Option<String>,
        blocked_by: Vec<String>,
    },
    /// The agent reported a task failure; the execution is paused on it.
    TaskFailed {
        task_id: String,
        error: Option<String>,
    },
}

impl ExecutionOrchestrator {
    /// Persist the paused state on both the execution record and the
    /// version lifecycle.
    async fn persist_pause(&self, execution: &Execution) -> Result<()> {
        self.executions
            .update_status(&execution.id, ExecutionStatus::Paused, None)
            .await?;
        let version = self.find_version(&execution.version_id).await?;
        self.transition_version_if_legal(&version, lifecycle::events::PAUSE)
            .await?;
        Ok(())
    }

    /// Run tasks until completion, pause, block or failure.
    pub async fn run(&self, execution_id: &str) -> Result<RunOutcome> {
        super::require_id("execution_id", execution_id)?;

        loop {
            let execution = self.find_execution(execution_id).await?;

            if execution.status.is_terminal() {
                return Err(Error::validation(
                    "execution_id",
                    format!("execution is already finished ('{:?}')", execution.status),
                ));
            }

            // Cooperative pause: observed only here, between tasks.
            if execution.is_paused {
                info!("Execution {execution_id} paused");
                self.persist_pause(&execution).await?;
                return Ok(RunOutcome::Paused);
            }

            // Proceeding past the pause check undoes a persisted pause, on
            // both the record and the version lifecycle.
            if execution.status == ExecutionStatus::Paused {
                let version = self.find_version(&execution.version_id).await?;
                self.transition_version_if_legal(&version, lifecycle::events::RESUME)
                    .await?;
                self.executions
                    .update_status(execution_id, ExecutionStatus::Running, None)
                    .await?;
            }

            let version = self.find_version(&execution.version_id).await?;
            // Re-read every iteration; the document may have been edited
            // by hand or by a skip while we were running the last task.
            let parsed = self.load_plan(&version).await?;

            match plan::next_task(&parsed) {
                NextTask::AllCompleted => {
                    self.executions
                        .update_progress(execution_id, parsed.completed_tasks, None, None)
                        .await?;
                    self.executions
                        .update_status(execution_id, ExecutionStatus::Completed, Some(Utc::now()))
                        .await?;
                    self.transition_version_if_legal(&version, lifecycle::events::COMPLETE)
                        .await?;
                    info!("Execution {execution_id} completed all tasks");
                    return Ok(RunOutcome::Completed);
                }
                NextTask::NoPending => {
                    // Tasks stuck in running/failed without a pending one
                    // to schedule. Park the execution for a human.
                    warn!("Execution {execution_id} has no pending tasks but is not complete");
                    self.executions.set_paused(execution_id, true).await?;
                    self.persist_pause(&self.find_execution(execution_id).await?)
                        .await?;
                    return Ok(RunOutcome::Blocked {
                        task_id: None,
                        blocked_by: Vec::new(),
                    });
                }
                NextTask::Blocked { task, blocked_by } => {
                    info!(
                        "Execution {execution_id} blocked on task {} (waiting on {:?})",
                        task.id, blocked_by
                    );
                    self.executions
                        .update_progress(
                            execution_id,
                            parsed.completed_tasks,
                            Some(task.id.clone()),
                            None,
                        )
                        .await?;
                    self.executions.set_paused(execution_id, true).await?;
                    self.persist_pause(&self.find_execution(execution_id).await?)
                        .await?;
                    return Ok(RunOutcome::Blocked {
                        task_id: Some(task.id),
                        blocked_by,
                    });
                }
                NextTask::TaskFound { task } => {
                    self.executions
                        .update_progress(
                            execution_id,
                            parsed.completed_tasks,
                            Some(task.id.clone()),
                            None,
                        )
                        .await?;
                    info!("Executing task {}: {}", task.id, task.description);

                    // The one blocking call in the lifecycle.
                    let outcome = self
                        .agent
                        .execute_task(&version.path, &task)
                        .await
                        .map_err(|e| Error::Agent(e.to_string()))?;

                    if outcome.success {
                        self.record_task_done(execution_id, &version, &parsed, &task.id)
                            .await?;
                    } else {
                        info!(
                            "Task {} failed, pausing execution for retry/skip decision",
                            task.id
                        );
                        self.executions
                            .update_progress(
                                execution_id,
                                parsed.completed_tasks,
                                Some(task.id.clone()),
                                outcome.error.clone(),
                            )
                            .await?;
                        self.executions.set_paused(execution_id, true).await?;
                        self.persist_pause(&self.find_execution(execution_id).await?)
                            .await?;
                        return Ok(RunOutcome::TaskFailed {
                            task_id: task.id,
                            error: outcome.error,
                        });
                    }
                }
            }
        }
    }

    /// Mark a finished task completed in the document, bump progress and
    /// run the after-task hook.
    async fn record_task_done(
        &self,
        execution_id: &str,
        version: &crate::storage::Version,
        parsed: &plan::ExecutionPlan,
        task_id: &str,
    ) -> Result<()> {
        let path = self.settings.plan_path(&version.path);
        let content = self
            .fs
            .read_to_string(&path)
            .await
            .map_err(|_| Error::validation("plan", "plan document is missing"))?;
        match plan::document::set_task_status(&content, task_id, TaskStatus::Completed) {
            Some(updated) => self.fs.write(&path, &updated).await?,
            None => warn!("Task {task_id} vanished from the plan document; not marking it"),
        }

        self.executions
            .update_progress(execution_id, parsed.completed_tasks + 1, None, None)
            .await?;

        let milestone_name = parsed
            .milestone_of(task_id)
            .map(|m| m.name.clone())
            .unwrap_or_default();
        let hook_result = execute_hook(
            &self.settings.hooks.after_task,
            &self.hook_context(version, &milestone_name),
            self.settings.auto_commit,
            self.settings.push,
            self.git.as_ref(),
        )
        .await;
        if !hook_result.success {
            // Hook failures never fail the task; the work is done.
            warn!(
                "After-task hook failed for task {task_id}: {}",
                hook_result.error.as_deref().unwrap_or("unknown error")
            );
        } else if hook_result.push_failed {
            warn!(
                "After-task hook committed but push failed: {}",
                hook_result.push_error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }
}
