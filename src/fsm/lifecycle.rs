//! Built-in development lifecycle machine for versions
//!
//! The version's `dev_status` field is the subject: a version is drafted,
//! scaffolded, reviewed, marked ready, then executed. Execution can pause
//! (user request or task failure), resume, retry out of error, or abort
//! back to ready.

use super::{StateMachine, StateMachineConfig, TransitionRule};
use crate::Result;

pub mod states {
    pub const DRAFTING: &str = "drafting";
    pub const SCAFFOLDING: &str = "scaffolding";
    pub const REVIEWING: &str = "reviewing";
    pub const READY: &str = "ready";
    pub const EXECUTING: &str = "executing";
    pub const PAUSED: &str = "paused";
    pub const ERROR: &str = "error";
    pub const COMPLETED: &str = "completed";
}

pub mod events {
    pub const SUBMIT: &str = "SUBMIT";
    pub const SCAFFOLD_COMPLETE: &str = "SCAFFOLD_COMPLETE";
    pub const SCAFFOLD_FAILED: &str = "SCAFFOLD_FAILED";
    pub const APPROVE: &str = "APPROVE";
    pub const REJECT: &str = "REJECT";
    pub const START: &str = "START";
    pub const PAUSE: &str = "PAUSE";
    pub const RESUME: &str = "RESUME";
    pub const RETRY: &str = "RETRY";
    pub const COMPLETE: &str = "COMPLETE";
    pub const ABORT: &str = "ABORT";
}

fn rule(event: &str, from: impl Into<super::StateSet>, to: &str) -> TransitionRule {
    TransitionRule {
        event: event.to_string(),
        from: from.into(),
        to: to.to_string(),
    }
}

/// Configuration for the version development lifecycle.
pub fn config() -> StateMachineConfig {
    use events::*;
    use states::*;

    StateMachineConfig {
        name: "version-lifecycle".to_string(),
        initial_state: DRAFTING.to_string(),
        states: vec![
            DRAFTING.into(),
            SCAFFOLDING.into(),
            REVIEWING.into(),
            READY.into(),
            EXECUTING.into(),
            PAUSED.into(),
            ERROR.into(),
            COMPLETED.into(),
        ],
        transitions: vec![
            rule(SUBMIT, DRAFTING, SCAFFOLDING),
            rule(SCAFFOLD_COMPLETE, SCAFFOLDING, REVIEWING),
            rule(SCAFFOLD_FAILED, SCAFFOLDING, ERROR),
            rule(APPROVE, REVIEWING, READY),
            rule(REJECT, REVIEWING, DRAFTING),
            rule(START, READY, EXECUTING),
            rule(PAUSE, EXECUTING, PAUSED),
            rule(RESUME, PAUSED, EXECUTING),
            rule(RETRY, vec![PAUSED, ERROR], EXECUTING),
            rule(COMPLETE, EXECUTING, COMPLETED),
            rule(ABORT, vec![EXECUTING, PAUSED], READY),
        ],
    }
}

/// Ready-to-use lifecycle machine.
pub fn machine() -> Result<StateMachine> {
    StateMachine::new(config())
}
