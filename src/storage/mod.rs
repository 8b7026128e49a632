//! Entity persistence
//!
//! Repositories return `Option` for missing records; raising `NotFound`
//! is the use-case layer's job. The JSON store keeps everything in one
//! file per entity kind under a state directory and saves with an atomic
//! temp-file-and-rename, so a crash mid-save never corrupts the record of
//! a running execution.

pub mod types;

pub use types::{Execution, ExecutionStatus, Version};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Persistence for execution records.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Execution>>;
    async fn create(&self, execution: Execution) -> Result<Execution>;
    async fn update_status(
        &self,
        id: &str,
        status: ExecutionStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
    async fn update_progress(
        &self,
        id: &str,
        completed_tasks: usize,
        current_task_id: Option<String>,
        last_error: Option<String>,
    ) -> Result<()>;
    async fn set_paused(&self, id: &str, paused: bool) -> Result<()>;
    async fn find_by_version(&self, version_id: &str) -> Result<Vec<Execution>>;
}

/// Persistence for version records.
#[async_trait]
pub trait VersionRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Version>>;
    async fn update_dev_status(&self, id: &str, dev_status: &str) -> Result<()>;
}

fn load_map<T: DeserializeOwned>(file: &Path) -> Result<HashMap<String, T>> {
    if !file.exists() {
        return Ok(HashMap::new());
    }
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", file.display()))
}

fn save_map<T: Serialize>(file: &Path, map: &HashMap<String, T>) -> Result<()> {
    let temp = file.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(map).context("Failed to serialize store")?;
    std::fs::write(&temp, json).with_context(|| format!("Failed to write {}", temp.display()))?;
    std::fs::rename(&temp, file)
        .with_context(|| format!("Failed to rename {} into place", temp.display()))?;
    Ok(())
}

/// JSON-file-backed store implementing both repositories.
pub struct JsonStore {
    root: PathBuf,
    executions: Mutex<HashMap<String, Execution>>,
    versions: Mutex<HashMap<String, Version>>,
}

impl JsonStore {
    /// Open (or initialize) a store under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create state directory {}", root.display()))?;
        let executions = load_map(&root.join("executions.json"))?;
        let versions = load_map(&root.join("versions.json"))?;
        Ok(Self {
            root,
            executions: Mutex::new(executions),
            versions: Mutex::new(versions),
        })
    }

    /// Insert or replace a version record. Version CRUD proper lives
    /// outside this crate; this exists so the CLI can seed test projects.
    pub async fn put_version(&self, version: Version) -> Result<()> {
        let mut versions = self.versions.lock().await;
        versions.insert(version.id.clone(), version);
        save_map(&self.root.join("versions.json"), &versions)
    }

    async fn save_executions(&self, executions: &HashMap<String, Execution>) -> Result<()> {
        save_map(&self.root.join("executions.json"), executions)
    }

    async fn mutate_execution<F>(&self, id: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Execution),
    {
        let mut executions = self.executions.lock().await;
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("No execution record with id {id}"))?;
        mutate(execution);
        self.save_executions(&executions).await
    }
}

#[async_trait]
impl ExecutionRepository for JsonStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Execution>> {
        Ok(self.executions.lock().await.get(id).cloned())
    }

    async fn create(&self, execution: Execution) -> Result<Execution> {
        let mut executions = self.executions.lock().await;
        executions.insert(execution.id.clone(), execution.clone());
        self.save_executions(&executions).await?;
        Ok(execution)
    }

    async fn update_status(
        &self,
        id: &str,
        status: ExecutionStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.mutate_execution(id, |e| {
            e.status = status;
            if completed_at.is_some() {
                e.completed_at = completed_at;
            }
        })
        .await
    }

    async fn update_progress(
        &self,
        id: &str,
        completed_tasks: usize,
        current_task_id: Option<String>,
        last_error: Option<String>,
    ) -> Result<()> {
        self.mutate_execution(id, |e| {
            e.completed_tasks = completed_tasks;
            e.current_task_id = current_task_id;
            e.last_error = last_error;
        })
        .await
    }

    async fn set_paused(&self, id: &str, paused: bool) -> Result<()> {
        self.mutate_execution(id, |e| e.is_paused = paused).await
    }

    async fn find_by_version(&self, version_id: &str) -> Result<Vec<Execution>> {
        let executions = self.executions.lock().await;
        let mut matches: Vec<Execution> = executions
            .values()
            .filter(|e| e.version_id == version_id)
            .cloned()
            .collect();
        matches.sort_by_key(|e| e.started_at);
        Ok(matches)
    }
}

#[async_trait]
impl VersionRepository for JsonStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Version>> {
        Ok(self.versions.lock().await.get(id).cloned())
    }

    async fn update_dev_status(&self, id: &str, dev_status: &str) -> Result<()> {
        let mut versions = self.versions.lock().await;
        let version = versions
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("No version record with id {id}"))?;
        version.dev_status = dev_status.to_string();
        save_map(&self.root.join("versions.json"), &versions)
    }
}

/// In-memory store for tests, implementing both repositories.
#[derive(Default)]
pub struct InMemoryStore {
    executions: Mutex<HashMap<String, Execution>>,
    versions: Mutex<HashMap<String, Version>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_version(&self, version: Version) {
        self.versions
            .lock()
            .await
            .insert(version.id.clone(), version);
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Execution>> {
        Ok(self.executions.lock().await.get(id).cloned())
    }

    async fn create(&self, execution: Execution) -> Result<Execution> {
        self.executions
            .lock()
            .await
            .insert(execution.id.clone(), execution.clone());
        Ok(execution)
    }

    async fn update_status(
        &self,
        id: &str,
        status: ExecutionStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut executions = self.executions.lock().await;
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("No execution record with id {id}"))?;
        execution.status = status;
        if completed_at.is_some() {
            execution.completed_at = completed_at;
        }
        Ok(())
    }

    async fn update_progress(
        &self,
        id: &str,
        completed_tasks: usize,
        current_task_id: Option<String>,
        last_error: Option<String>,
    ) -> Result<()> {
        let mut executions = self.executions.lock().await;
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("No execution record with id {id}"))?;
        execution.completed_tasks = completed_tasks;
        execution.current_task_id = current_task_id;
        execution.last_error = last_error;
        Ok(())
    }

    async fn set_paused(&self, id: &str, paused: bool) -> Result<()> {
        let mut executions = self.executions.lock().await;
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("No execution record with id {id}"))?;
        execution.is_paused = paused;
        Ok(())
    }

    async fn find_by_version(&self, version_id: &str) -> Result<Vec<Execution>> {
        let executions = self.executions.lock().await;
        let mut matches: Vec<Execution> = executions
            .values()
            .filter(|e| e.version_id == version_id)
            .cloned()
            .collect();
        matches.sort_by_key(|e| e.started_at);
        Ok(matches)
    }
}

#[async_trait]
impl VersionRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Version>> {
        Ok(self.versions.lock().await.get(id).cloned())
    }

    async fn update_dev_status(&self, id: &str, dev_status: &str) -> Result<()> {
        let mut versions = self.versions.lock().await;
        let version = versions
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("No version record with id {id}"))?;
        version.dev_status = dev_status.to_string();
        Ok(())
    }
}
