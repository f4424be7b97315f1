//! Core error types for sprintplan-core.
//!
//! Errors fall into three groups:
//! - input problems ([`ValidationError`]) are rejected before any computation,
//! - narrative enrichment failures ([`NarrativeError`]) are always recovered
//!   at the call site with a deterministic fallback,
//! - storage and configuration failures are propagated to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for sprintplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed input rejected before computation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Narrative enrichment failed. Callers inside the core never surface this.
    #[error("Narrative unavailable: {0}")]
    Narrative(#[from] NarrativeError),

    /// A referenced entity does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dotted configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Input errors. Nothing is computed or written when one of these is returned.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    /// Horizon must contain at least one workday
    #[error("Planning horizon must be at least one workday (got {0})")]
    EmptyHorizon(u32),

    /// Workday set has no weekdays
    #[error("Workday set must contain at least one weekday")]
    NoWorkdays,

    /// Unknown status string
    #[error("Unknown status '{0}' (expected todo, in_progress, blocked or done)")]
    UnknownStatus(String),

    /// Unknown plan bucket string
    #[error("Unknown plan bucket '{0}' (expected Focus, Admin or Meeting)")]
    UnknownBucket(String),

    /// An item was reported under more than one evening outcome
    #[error("Work item '{id}' reported as both {first} and {second}")]
    ConflictingOutcome {
        id: String,
        first: &'static str,
        second: &'static str,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Narrative enrichment errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NarrativeError {
    /// No annotator configured (or the API key is missing)
    #[error("narrative annotator is not configured")]
    NotConfigured,

    /// Transport or non-success HTTP status
    #[error("narrative request failed: {0}")]
    Http(String),

    /// Provider asked us to slow down
    #[error("narrative provider rate limited the request")]
    RateLimited,

    /// Provider refused the request (4xx other than 429)
    #[error("narrative request rejected with HTTP {0}")]
    Rejected(u16),

    /// Request exceeded its deadline
    #[error("narrative request timed out after {0}s")]
    Timeout(u64),

    /// Provider answered without usable text
    #[error("narrative response contained no text")]
    EmptyResponse,

    /// Provider answered with an unexpected shape
    #[error("narrative response malformed: {0}")]
    Malformed(String),
}

impl NarrativeError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NarrativeError::Http(_) | NarrativeError::RateLimited | NarrativeError::Timeout(_)
        )
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::from(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(NarrativeError::Http("502".into()).is_transient());
        assert!(NarrativeError::RateLimited.is_transient());
        assert!(NarrativeError::Timeout(10).is_transient());
        assert!(!NarrativeError::NotConfigured.is_transient());
        assert!(!NarrativeError::EmptyResponse.is_transient());
        assert!(!NarrativeError::Rejected(401).is_transient());
    }

    #[test]
    fn not_found_message() {
        let err = CoreError::not_found("ticket", "OPS-1");
        assert_eq!(err.to_string(), "ticket not found: OPS-1");
    }

    #[test]
    fn conflicting_outcome_message() {
        let err = ValidationError::ConflictingOutcome {
            id: "a".into(),
            first: "completed",
            second: "blocked",
        };
        assert!(err.to_string().contains("both completed and blocked"));
    }
}
