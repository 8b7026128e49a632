//! Persisted entities
//!
//! `Execution.status` and `Execution.is_paused` are deliberately separate
//! signals. The status is the coarse lifecycle; the flag is a cooperative
//! stop request the runner polls between tasks. Pausing never interrupts
//! an in-flight task, it only keeps the next one from starting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Coarse lifecycle state of an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Paused,
    Completed,
    Failed,
    Aborted,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Aborted
        )
    }

    /// Running or paused: the execution still owns its version.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// One attempt to run a version's plan to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub version_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub current_task_id: Option<String>,
    /// Snapshot commit captured before the first task, the rollback anchor
    /// for abort. None when the snapshot could not be taken.
    pub pre_execution_commit: Option<String>,
    pub is_paused: bool,
    /// Error from the task failure that paused the run, if any.
    pub last_error: Option<String>,
}

impl Execution {
    pub fn new(version_id: impl Into<String>, total_tasks: usize, completed_tasks: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            version_id: version_id.into(),
            started_at: Utc::now(),
            completed_at: None,
            status: ExecutionStatus::Running,
            total_tasks,
            completed_tasks,
            current_task_id: None,
            pre_execution_commit: None,
            is_paused: false,
            last_error: None,
        }
    }
}

/// A development version of a project. Owned by an external CRUD
/// subsystem; this crate only consults it and drives `dev_status` through
/// the lifecycle machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub name: String,
    pub project_name: String,
    /// Working tree the agent operates in; the plan document lives here.
    pub path: PathBuf,
    pub dev_status: String,
}
