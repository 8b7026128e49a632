//! Plan document parsing, scheduling and rewriting
//!
//! - `types` - the plan value model (milestones, tasks, counters)
//! - `parser` - tolerant line-oriented document parser
//! - `calculator` - pure scheduling decisions (next task, progress, blocked)
//! - `document` - targeted single-line status rewrites

pub mod calculator;
pub mod document;
pub mod parser;
pub mod types;

pub use calculator::{blocked_tasks, next_task, progress, update_task_status};
pub use calculator::{BlockedTask, NextTask, Progress};
pub use parser::parse;
pub use types::{ExecutionPlan, Milestone, Task, TaskStatus};
