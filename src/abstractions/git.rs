//! Git operations abstraction layer
//!
//! Provides trait-based abstraction for git commands to enable testing
//! without actual git repository access. All operations take the target
//! repository path explicitly; nothing depends on the process cwd.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Working tree status snapshot from `git status --porcelain`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatus {
    pub staged: Vec<String>,
    pub unstaged: Vec<String>,
    pub untracked: Vec<String>,
    pub deleted: Vec<String>,
    pub branch: Option<String>,
    pub ahead: usize,
    pub behind: usize,
}

impl GitStatus {
    /// True when there is nothing to commit.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
            && self.deleted.is_empty()
    }
}

/// Options for commit creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitOptions {
    pub allow_empty: bool,
}

/// Trait for git operations against a single repository path.
#[async_trait]
pub trait GitAdapter: Send + Sync {
    /// Check if `path` is inside a git repository.
    async fn is_repo(&self, path: &Path) -> bool;

    /// Snapshot the working tree status.
    async fn status(&self, path: &Path) -> Result<GitStatus>;

    /// Stage the given paths (`.` stages everything).
    async fn add(&self, path: &Path, files: &[String]) -> Result<()>;

    /// Create a commit and return its revision id.
    async fn commit(&self, path: &Path, message: &str) -> Result<String> {
        self.commit_with_options(path, message, CommitOptions::default())
            .await
    }

    /// Create a commit with options and return its revision id.
    async fn commit_with_options(
        &self,
        path: &Path,
        message: &str,
        options: CommitOptions,
    ) -> Result<String>;

    /// Push to the given remote, or the default when `None`.
    async fn push(&self, path: &Path, remote: Option<&str>) -> Result<()>;

    /// Check whether any remote is configured.
    async fn has_remote(&self, path: &Path) -> bool;

    /// Hard-reset the working tree to `revision`.
    async fn reset_hard(&self, path: &Path, revision: &str) -> Result<()>;

    /// Resolve HEAD to a revision id.
    async fn rev_parse_head(&self, path: &Path) -> Result<String>;
}

/// Real implementation shelling out to the `git` binary.
pub struct RealGit {
    /// Serializes git invocations; concurrent index mutation in one
    /// repository corrupts the lock file.
    git_mutex: Arc<Mutex<()>>,
}

impl RealGit {
    pub fn new() -> Self {
        Self {
            git_mutex: Arc::new(Mutex::new(())),
        }
    }

    async fn git(&self, path: &Path, args: &[&str], description: &str) -> Result<String> {
        let _guard = self.git_mutex.lock().await;

        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(path)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to execute git {}: {}", description, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "Git {} failed: {}",
                description,
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for RealGit {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_porcelain(output: &str) -> GitStatus {
    let mut status = GitStatus::default();
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("## ") {
            // "main...origin/main [ahead 1, behind 2]"
            let branch = rest.split("...").next().unwrap_or(rest);
            status.branch = Some(branch.trim().to_string());
            if let Some(start) = rest.find('[') {
                for part in rest[start + 1..].trim_end_matches(']').split(',') {
                    let part = part.trim();
                    if let Some(n) = part.strip_prefix("ahead ") {
                        status.ahead = n.parse().unwrap_or(0);
                    } else if let Some(n) = part.strip_prefix("behind ") {
                        status.behind = n.parse().unwrap_or(0);
                    }
                }
            }
            continue;
        }
        if line.len() < 4 {
            continue;
        }
        let (index, worktree) = (line.as_bytes()[0] as char, line.as_bytes()[1] as char);
        let file = line[3..].to_string();
        match (index, worktree) {
            ('?', '?') => status.untracked.push(file),
            (_, 'D') | ('D', _) => status.deleted.push(file),
            (' ', _) => status.unstaged.push(file),
            (_, ' ') => status.staged.push(file),
            _ => {
                // staged with further worktree edits
                status.staged.push(file.clone());
                status.unstaged.push(file);
            }
        }
    }
    status
}

#[async_trait]
impl GitAdapter for RealGit {
    async fn is_repo(&self, path: &Path) -> bool {
        tokio::process::Command::new("git")
            .args(["rev-parse", "--git-dir"])
            .current_dir(path)
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn status(&self, path: &Path) -> Result<GitStatus> {
        let output = self
            .git(path, &["status", "--porcelain", "--branch"], "status")
            .await?;
        Ok(parse_porcelain(&output))
    }

    async fn add(&self, path: &Path, files: &[String]) -> Result<()> {
        let mut args = vec!["add"];
        args.extend(files.iter().map(String::as_str));
        self.git(path, &args, "add").await?;
        Ok(())
    }

    async fn commit_with_options(
        &self,
        path: &Path,
        message: &str,
        options: CommitOptions,
    ) -> Result<String> {
        let mut args = vec!["commit", "-m", message];
        if options.allow_empty {
            args.push("--allow-empty");
        }
        self.git(path, &args, "commit").await?;
        let head = self
            .git(path, &["rev-parse", "HEAD"], "rev-parse HEAD")
            .await?;
        Ok(head.trim().to_string())
    }

    async fn push(&self, path: &Path, remote: Option<&str>) -> Result<()> {
        match remote {
            Some(remote) => self.git(path, &["push", remote], "push").await?,
            None => self.git(path, &["push"], "push").await?,
        };
        Ok(())
    }

    async fn has_remote(&self, path: &Path) -> bool {
        self.git(path, &["remote"], "remote")
            .await
            .map(|out| !out.trim().is_empty())
            .unwrap_or(false)
    }

    async fn reset_hard(&self, path: &Path, revision: &str) -> Result<()> {
        self.git(path, &["reset", "--hard", revision], "reset").await?;
        Ok(())
    }

    async fn rev_parse_head(&self, path: &Path) -> Result<String> {
        let head = self
            .git(path, &["rev-parse", "HEAD"], "rev-parse HEAD")
            .await?;
        Ok(head.trim().to_string())
    }
}

/// A recorded call against [`MockGit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Status,
    Add(Vec<String>),
    Commit { message: String, allow_empty: bool },
    Push { remote: Option<String> },
    ResetHard(String),
}

/// Mock implementation of [`GitAdapter`] for testing.
pub struct MockGit {
    pub is_repo: bool,
    pub has_remote: bool,
    pub status: Mutex<GitStatus>,
    /// Commit ids handed out in order; recycled when exhausted.
    pub commit_ids: Mutex<Vec<String>>,
    pub fail_commit: bool,
    pub fail_push: Option<String>,
    pub fail_add: Option<String>,
    pub fail_status: Option<String>,
    pub fail_reset: Option<String>,
    pub calls: Mutex<Vec<GitCall>>,
}

impl Default for MockGit {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGit {
    pub fn new() -> Self {
        Self {
            is_repo: true,
            has_remote: false,
            status: Mutex::new(GitStatus::default()),
            commit_ids: Mutex::new(vec!["abc123".to_string()]),
            fail_commit: false,
            fail_push: None,
            fail_add: None,
            fail_status: None,
            fail_reset: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_changes(self) -> Self {
        Self {
            status: Mutex::new(GitStatus {
                unstaged: vec!["src/main.rs".to_string()],
                ..GitStatus::default()
            }),
            ..self
        }
    }

    pub async fn set_status(&self, status: GitStatus) {
        *self.status.lock().await = status;
    }

    pub async fn calls(&self) -> Vec<GitCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: GitCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl GitAdapter for MockGit {
    async fn is_repo(&self, _path: &Path) -> bool {
        self.is_repo
    }

    async fn status(&self, _path: &Path) -> Result<GitStatus> {
        self.record(GitCall::Status).await;
        if let Some(msg) = &self.fail_status {
            return Err(anyhow::anyhow!("{msg}"));
        }
        Ok(self.status.lock().await.clone())
    }

    async fn add(&self, _path: &Path, files: &[String]) -> Result<()> {
        self.record(GitCall::Add(files.to_vec())).await;
        if let Some(msg) = &self.fail_add {
            return Err(anyhow::anyhow!("{msg}"));
        }
        Ok(())
    }

    async fn commit_with_options(
        &self,
        _path: &Path,
        message: &str,
        options: CommitOptions,
    ) -> Result<String> {
        self.record(GitCall::Commit {
            message: message.to_string(),
            allow_empty: options.allow_empty,
        })
        .await;
        if self.fail_commit {
            return Err(anyhow::anyhow!("commit failed"));
        }
        let mut ids = self.commit_ids.lock().await;
        let id = if ids.len() > 1 {
            ids.remove(0)
        } else {
            ids.first().cloned().unwrap_or_else(|| "abc123".to_string())
        };
        Ok(id)
    }

    async fn push(&self, _path: &Path, remote: Option<&str>) -> Result<()> {
        self.record(GitCall::Push {
            remote: remote.map(String::from),
        })
        .await;
        if let Some(msg) = &self.fail_push {
            return Err(anyhow::anyhow!("{msg}"));
        }
        Ok(())
    }

    async fn has_remote(&self, _path: &Path) -> bool {
        self.has_remote
    }

    async fn reset_hard(&self, _path: &Path, revision: &str) -> Result<()> {
        self.record(GitCall::ResetHard(revision.to_string())).await;
        if let Some(msg) = &self.fail_reset {
            return Err(anyhow::anyhow!("{msg}"));
        }
        Ok(())
    }

    async fn rev_parse_head(&self, _path: &Path) -> Result<String> {
        Ok("HEAD0".to_string())
    }
}
