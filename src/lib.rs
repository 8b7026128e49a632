//! # Foreman
//!
//! Drives an AI coding agent through a dependency-ordered task plan, one
//! task at a time, with human pause/resume/retry/skip/abort control and
//! git snapshots around execution.
//!
//! ## Modules
//!
//! - `abstractions` - Trait-based abstractions for external collaborators (git, agent CLI, file system)
//! - `config` - Settings loaded from TOML with sensible defaults
//! - `error` - Crate-wide error taxonomy
//! - `fsm` - Table-driven finite state machine engine and the version lifecycle
//! - `hooks` - Configurable commit/push hook run after state-affecting operations
//! - `orchestrator` - Execution lifecycle use cases and the task-running loop
//! - `plan` - Plan document parsing, scheduling decisions and targeted rewrites
//! - `storage` - Execution/version records and their repositories

pub mod abstractions;
pub mod config;
pub mod error;
pub mod fsm;
pub mod hooks;
pub mod orchestrator;
pub mod plan;
pub mod storage;

pub use error::{Error, Result};
