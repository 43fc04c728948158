//! Error types for Mailflow.
//!
//! All errors in Mailflow are represented by the `MailflowError` enum,
//! which provides specific variants for different error categories.

use std::io::ErrorKind;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Mailflow operations.
///
/// Each variant represents a specific category of error that can occur
/// while loading configuration, talking to the backend, or editing a
/// workflow's action tree.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum MailflowError {
    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, payloads, durations).
    #[error("{0}")]
    Convert(String),

    /// Access token or company scope errors.
    #[error("{0}")]
    Auth(String),

    /// Transport-level failures (connect, timeout, body decode).
    #[error("{0}")]
    Http(String),

    /// Backend answered with a non-success status.
    #[error("api error ({status}): {body}")]
    Api {
        status: u16,
        body: String,
    },

    /// Workflow-level errors (unknown workflow, not ready to start).
    #[error("{0}")]
    Workflow(String),

    /// Action placement or edit errors.
    #[error("{0}")]
    Action(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl MailflowError {
    /// Whether retrying the same request could succeed.
    ///
    /// Transport failures and 5xx/429 replies are retryable; validation and
    /// auth failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            MailflowError::Http(_) => true,
            MailflowError::Api {
                status,
                ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<MailflowError> for String {
    fn from(val: MailflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for MailflowError {
    fn from(error: std::io::Error) -> Self {
        MailflowError::IoError(error.to_string())
    }
}

impl From<MailflowError> for std::io::Error {
    fn from(val: MailflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<serde_json::Error> for MailflowError {
    fn from(error: serde_json::Error) -> Self {
        MailflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for MailflowError {
    fn from(error: toml::de::Error) -> Self {
        MailflowError::Config(error.to_string())
    }
}

impl From<reqwest::Error> for MailflowError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => MailflowError::Api {
                status: status.as_u16(),
                body: error.to_string(),
            },
            None => MailflowError::Http(error.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for MailflowError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        MailflowError::Auth(format!("invalid access token: {}", error))
    }
}

impl From<jsonschema::ValidationError<'_>> for MailflowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        MailflowError::Action(format!("invalid payload: {}", error))
    }
}
