//! Error types for the resolution core.
//!
//! None of these reach the end user: the pipeline turns every one of them
//! into a fall-through or a `Rejection` with a clarification prompt.

use thiserror::Error;

/// Failures while pulling or installing an entity inventory.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("inventory source unavailable: {0}")]
    Source(String),

    #[error("inventory payload malformed: {0}")]
    Malformed(String),

    #[error("inventory contains no entities")]
    EmptyInventory,
}

/// Failures of the external semantic-model collaborator.
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned status {0}")]
    Status(u16),

    #[error("malformed model output: {0}")]
    Malformed(String),
}

/// Typed time-expression failures. Never panics, never crashes the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeRangeError {
    #[error("unrecognized time expression: {0}")]
    Unrecognized(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("range start is after its end")]
    StartAfterEnd,

    #[error("range starts in the future")]
    StartInFuture,

    #[error("range starts more than {days} days ago")]
    BeyondRetention { days: i64 },
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}
