//! Table-driven finite state machine engine
//!
//! A `StateMachine` is built once from a declarative config, validated
//! eagerly (all structural problems reported together), and is stateless
//! afterwards, so one instance can be shared across unrelated executions.

pub mod lifecycle;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One or many source states for a transition rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateSet {
    One(String),
    Many(Vec<String>),
}

impl StateSet {
    pub fn contains(&self, state: &str) -> bool {
        match self {
            StateSet::One(s) => s == state,
            StateSet::Many(states) => states.iter().any(|s| s == state),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        match self {
            StateSet::One(s) => std::slice::from_ref(s).iter(),
            StateSet::Many(states) => states.iter(),
        }
        .map(String::as_str)
    }
}

impl From<&str> for StateSet {
    fn from(s: &str) -> Self {
        StateSet::One(s.to_string())
    }
}

impl From<Vec<&str>> for StateSet {
    fn from(states: Vec<&str>) -> Self {
        StateSet::Many(states.into_iter().map(String::from).collect())
    }
}

/// A single transition rule: `event` moves any state in `from` to `to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRule {
    pub event: String,
    pub from: StateSet,
    pub to: String,
}

/// Declarative state machine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMachineConfig {
    pub name: String,
    pub initial_state: String,
    pub states: Vec<String>,
    pub transitions: Vec<TransitionRule>,
}

/// Validated state machine with a `(state, event) -> state` lookup table.
#[derive(Debug, Clone)]
pub struct StateMachine {
    config: StateMachineConfig,
    table: HashMap<(String, String), String>,
}

impl StateMachine {
    /// Build the transition table, collecting every structural problem
    /// before failing so config errors can be fixed in one iteration.
    pub fn new(config: StateMachineConfig) -> Result<Self> {
        let mut problems = Vec::new();

        if !config.states.iter().any(|s| s == &config.initial_state) {
            problems.push(format!(
                "initial state '{}' is not in the state set",
                config.initial_state
            ));
        }

        let mut table = HashMap::new();
        for rule in &config.transitions {
            for from in rule.from.iter() {
                if !config.states.iter().any(|s| s == from) {
                    problems.push(format!(
                        "transition '{}' references unknown from-state '{}'",
                        rule.event, from
                    ));
                }
                let key = (from.to_string(), rule.event.clone());
                if table.insert(key, rule.to.clone()).is_some() {
                    problems.push(format!(
                        "ambiguous transition: event '{}' from state '{}' is defined more than once",
                        rule.event, from
                    ));
                }
            }
            if !config.states.iter().any(|s| s == &rule.to) {
                problems.push(format!(
                    "transition '{}' references unknown to-state '{}'",
                    rule.event, rule.to
                ));
            }
        }

        if !problems.is_empty() {
            return Err(Error::InvalidConfig {
                machine: config.name,
                problems,
            });
        }

        Ok(Self { config, table })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn initial_state(&self) -> &str {
        &self.config.initial_state
    }

    pub fn states(&self) -> &[String] {
        &self.config.states
    }

    fn is_known_state(&self, state: &str) -> bool {
        self.config.states.iter().any(|s| s == state)
    }

    /// Resolve `event` from `current_state` to the next state.
    pub fn transition(&self, current_state: &str, event: &str) -> Result<&str> {
        if !self.is_known_state(current_state) {
            return Err(Error::InvalidState {
                machine: self.config.name.clone(),
                state: current_state.to_string(),
            });
        }
        self.table
            .get(&(current_state.to_string(), event.to_string()))
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidTransition {
                machine: self.config.name.clone(),
                state: current_state.to_string(),
                event: event.to_string(),
            })
    }

    /// True when `transition(state, event)` would succeed. Never errors.
    pub fn can_transition(&self, state: &str, event: &str) -> bool {
        self.is_known_state(state)
            && self
                .table
                .contains_key(&(state.to_string(), event.to_string()))
    }

    /// Events applicable from `state`, in configuration order.
    /// Unknown states yield an empty list.
    pub fn available_events(&self, state: &str) -> Vec<&str> {
        self.config
            .transitions
            .iter()
            .filter(|rule| rule.from.contains(state))
            .map(|rule| rule.event.as_str())
            .collect()
    }
}
