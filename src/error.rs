use crate::domain::commission::CommissionStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommissionError {
    /// Malformed or out-of-range input. Carries every message collected during
    /// validation so the caller can fix all of them in one round trip.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("cannot {action} a {status} commission")]
    InvalidTransition {
        action: &'static str,
        status: CommissionStatus,
    },
    #[error("unknown actor: {actor}")]
    Unauthorized { actor: String },
    #[error("actor {actor} lacks permission {permission}")]
    Forbidden {
        actor: String,
        permission: &'static str,
    },
    /// A rule that reached the evaluator is structurally unusable.
    #[error("rule misconfigured: {0}")]
    Configuration(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[cfg(feature = "storage-rocksdb")]
    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),
}

impl CommissionError {
    /// Shorthand for a single-message validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }
}

pub type Result<T> = std::result::Result<T, CommissionError>;
