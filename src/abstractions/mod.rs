//! Trait-based abstractions for external collaborators
//!
//! Each collaborator (git, the AI agent backend, the file system) is a
//! trait with a real implementation used by the binary and a mock usable
//! from tests, so the orchestrator is testable without a repository, an
//! agent installation, or a scratch directory.

pub mod agent;
pub mod fs;
pub mod git;

pub use agent::{AgentBackend, ClaudeAgent, MockAgent, TaskOutcome};
pub use fs::{FileSystem, InMemoryFileSystem, RealFileSystem};
pub use git::{CommitOptions, GitAdapter, GitStatus, MockGit, RealGit};
