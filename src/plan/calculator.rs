//! Pure scheduling functions over a parsed plan
//!
//! Dependency satisfaction is strict: a prerequisite satisfies only when
//! its status is exactly `Completed`. A skipped task counts toward
//! progress but never unblocks dependents; skipping means "I chose not to
//! do this" and must not silently unlock work that assumed it was done.

use super::types::{ExecutionPlan, Task, TaskStatus};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Outcome of [`next_task`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NextTask {
    /// First pending task whose dependencies are all completed.
    TaskFound { task: Task },
    /// Pending tasks exist but none are runnable; `task` is the first
    /// pending one in document order, the anchor for a skip/abort decision.
    Blocked { task: Task, blocked_by: Vec<String> },
    /// Every task is completed or skipped.
    AllCompleted,
    /// No pending tasks, but not everything is done (tasks stuck in
    /// running/failed). Should not occur when counters are consistent.
    NoPending,
}

/// Plan-wide progress. Skipped tasks count as completed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub percent: u8,
}

/// A pending task together with its unsatisfied dependency ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedTask {
    pub task: Task,
    pub blocked_by: Vec<String>,
}

/// Dependency ids of `task` that are not satisfied. A dependency naming a
/// task that does not exist in the plan is unsatisfied.
fn unsatisfied_deps(plan: &ExecutionPlan, task: &Task) -> Vec<String> {
    task.depends
        .iter()
        .filter(|dep| {
            plan.find_task(dep)
                .map_or(true, |t| t.status != TaskStatus::Completed)
        })
        .cloned()
        .collect()
}

/// Decide the next runnable task, scanning in document order.
pub fn next_task(plan: &ExecutionPlan) -> NextTask {
    let pending: Vec<&Task> = plan
        .tasks()
        .filter(|t| t.status == TaskStatus::Pending)
        .collect();

    if pending.is_empty() {
        if plan.tasks().all(|t| t.status.is_done()) {
            return NextTask::AllCompleted;
        }
        return NextTask::NoPending;
    }

    for task in &pending {
        if unsatisfied_deps(plan, task).is_empty() {
            return NextTask::TaskFound {
                task: (*task).clone(),
            };
        }
    }

    let anchor = pending[0];
    NextTask::Blocked {
        task: anchor.clone(),
        blocked_by: unsatisfied_deps(plan, anchor),
    }
}

/// Overall progress; 0% for an empty plan.
pub fn progress(plan: &ExecutionPlan) -> Progress {
    let total = plan.tasks().count();
    let completed = plan.tasks().filter(|t| t.status.is_done()).count();
    let percent = if total == 0 {
        0
    } else {
        ((100.0 * completed as f64 / total as f64).round()) as u8
    };
    Progress {
        total,
        completed,
        percent,
    }
}

/// Every pending task with at least one unsatisfied dependency.
pub fn blocked_tasks(plan: &ExecutionPlan) -> Vec<BlockedTask> {
    plan.tasks()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter_map(|task| {
            let blocked_by = unsatisfied_deps(plan, task);
            if blocked_by.is_empty() {
                None
            } else {
                Some(BlockedTask {
                    task: task.clone(),
                    blocked_by,
                })
            }
        })
        .collect()
}

/// Return a new plan with only the targeted task's status changed and all
/// counters recomputed. Counter recomputation from scratch makes the
/// update idempotent and immune to done-to-done double counting.
pub fn update_task_status(
    plan: &ExecutionPlan,
    task_id: &str,
    status: TaskStatus,
) -> Result<ExecutionPlan> {
    let mut updated = plan.clone();
    let mut found = false;
    for milestone in &mut updated.milestones {
        for task in &mut milestone.tasks {
            if task.id == task_id {
                task.status = status;
                found = true;
            }
        }
    }
    if !found {
        return Err(Error::not_found("Task", task_id));
    }
    updated.recount();
    Ok(updated)
}
