use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state '{state}' for state machine '{machine}'")]
    InvalidState { machine: String, state: String },

    #[error("Invalid transition: no rule for event '{event}' from state '{state}' in state machine '{machine}'")]
    InvalidTransition {
        machine: String,
        state: String,
        event: String,
    },

    #[error("Invalid state machine config '{machine}': {}", problems.join("; "))]
    InvalidConfig {
        machine: String,
        problems: Vec<String>,
    },

    #[error("Git error: {0}")]
    Git(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Validation failure for a named input field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Missing-entity failure naming the entity kind and the id looked up.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
