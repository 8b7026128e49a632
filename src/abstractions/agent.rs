//! AI agent backend abstraction
//!
//! The backend is opaque to the orchestrator: it can report availability
//! and run exactly one task in a working directory, returning a boolean
//! outcome with an optional error message. Scheduling, retries and
//! bookkeeping all live above this trait.

use crate::plan::Task;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

/// Result of executing one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Trait for the AI execution backend.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Check whether the backend can accept work.
    async fn is_available(&self) -> bool;

    /// Execute one task in `workdir`. A failed task is a normal outcome,
    /// not an `Err`; `Err` is reserved for backend plumbing failures.
    async fn execute_task(&self, workdir: &Path, task: &Task) -> Result<TaskOutcome>;
}

/// Backend shelling out to the Claude CLI.
pub struct ClaudeAgent {
    binary: String,
}

impl ClaudeAgent {
    pub fn new() -> Self {
        Self {
            binary: "claude".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn prompt_for(task: &Task) -> String {
        let mut prompt = format!(
            "Complete the following development task.\n\nTask {}: {}\n",
            task.id, task.description
        );
        if let Some(verification) = &task.verification {
            prompt.push_str(&format!("\nVerification criteria: {verification}\n"));
        }
        prompt
    }
}

impl Default for ClaudeAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentBackend for ClaudeAgent {
    async fn is_available(&self) -> bool {
        tokio::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn execute_task(&self, workdir: &Path, task: &Task) -> Result<TaskOutcome> {
        debug!("Executing task {} in {}", task.id, workdir.display());

        let output = tokio::process::Command::new(&self.binary)
            .arg("--print")
            .arg("--dangerously-skip-permissions")
            .arg(Self::prompt_for(task))
            .current_dir(workdir)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to launch agent: {e}"))?;

        if output.status.success() {
            Ok(TaskOutcome::success())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Ok(TaskOutcome::failure(stderr.trim().to_string()))
        }
    }
}

/// Mock backend with scripted per-task outcomes.
pub struct MockAgent {
    pub available: bool,
    /// Outcomes consumed in order; defaults to success when exhausted.
    pub outcomes: Mutex<Vec<TaskOutcome>>,
    pub executed: Mutex<Vec<String>>,
}

impl Default for MockAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAgent {
    pub fn new() -> Self {
        Self {
            available: true,
            outcomes: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub async fn script(&self, outcome: TaskOutcome) {
        self.outcomes.lock().await.push(outcome);
    }

    pub async fn executed_tasks(&self) -> Vec<String> {
        self.executed.lock().await.clone()
    }
}

#[async_trait]
impl AgentBackend for MockAgent {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn execute_task(&self, _workdir: &Path, task: &Task) -> Result<TaskOutcome> {
        self.executed.lock().await.push(task.id.clone());
        let mut outcomes = self.outcomes.lock().await;
        if outcomes.is_empty() {
            Ok(TaskOutcome::success())
        } else {
            Ok(outcomes.remove(0))
        }
    }
}
