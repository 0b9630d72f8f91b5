//! Typed error hierarchy for the clause auditor.
//!
//! Three top-level enums cover the three subsystems that can fail:
//! - `ReasoningError`: reasoning service (critic / redliner) calls
//! - `IndexError`: semantic index loading and similarity queries
//! - `ConfigError`: configuration loading and validation
//!
//! None of these cross the orchestrator boundary: the critic folds
//! `ReasoningError` into an ERROR finding and the reflector folds
//! `IndexError` into an unverified result.

use std::time::Duration;
use thiserror::Error;

/// Errors from a reasoning service invocation.
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("Failed to spawn reasoning process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Reasoning process I/O failed: {0}")]
    Io(#[source] std::io::Error),

    #[error("Reasoning process exited with code {exit_code}")]
    NonZeroExit { exit_code: i32 },

    #[error("Reasoning call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reasoning API request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Reasoning API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Malformed reasoning reply: {0}")]
    MalformedReply(String),
}

/// Errors from the semantic similarity index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Semantic index unavailable: {0}")]
    Unavailable(String),

    #[error("Similarity query failed: {0}")]
    QueryFailed(String),

    #[error("Similarity query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to load index source {path}: {source}")]
    LoadFailed {
        path: std::path::PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ParseFailed {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
