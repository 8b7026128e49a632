//! Plan data model
//!
//! A plan is parsed fresh from the task document and treated as a value:
//! every update produces a new plan with counters recomputed, which keeps
//! the counting invariants testable by plain before/after comparison.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    /// Done statuses count toward progress. Note that only `Completed`
    /// satisfies a dependency; `Skipped` deliberately does not.
    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Skipped)
    }
}

/// An atomic unit of work in the plan document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub verification: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    pub status: TaskStatus,
}

/// A named group of tasks. A task belongs to exactly one milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tasks: Vec<Task>,
    pub completed_tasks: usize,
}

impl Milestone {
    pub fn recount(&mut self) {
        self.completed_tasks = self.tasks.iter().filter(|t| t.status.is_done()).count();
    }
}

/// The parsed form of the whole task document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub milestones: Vec<Milestone>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
}

impl ExecutionPlan {
    /// Recompute plan- and milestone-level counters from task statuses.
    pub fn recount(&mut self) {
        for milestone in &mut self.milestones {
            milestone.recount();
        }
        self.total_tasks = self.milestones.iter().map(|m| m.tasks.len()).sum();
        self.completed_tasks = self.milestones.iter().map(|m| m.completed_tasks).sum();
    }

    /// Iterate tasks in document order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.milestones.iter().flat_map(|m| m.tasks.iter())
    }

    /// Look up a task by id.
    pub fn find_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks().find(|t| t.id == task_id)
    }

    /// Milestone containing the given task.
    pub fn milestone_of(&self, task_id: &str) -> Option<&Milestone> {
        self.milestones
            .iter()
            .find(|m| m.tasks.iter().any(|t| t.id == task_id))
    }
}
