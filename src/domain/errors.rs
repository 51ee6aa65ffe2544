use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain-level errors shared across application components.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The incoming payload missed a required field or violated invariants.
    #[error("validation error: {0}")]
    Validation(String),

    /// Input exceeded guard rails such as maximum length or count.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Requested entity was not found locally.
    #[error("not found: {0}")]
    NotFound(String),

    /// Catch-all for storage-related failures we don't want to leak directly.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The knowledge-base backend could not be reached or is misconfigured.
    #[error("context store unavailable: {0}")]
    StoreUnavailable(String),

    /// A required credential or setting is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The hosted model reported a failure.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The model answered, but not in the shape we asked for.
    #[error("invalid model output: {0}")]
    InvalidModelOutput(String),

    /// Any other unexpected failure.
    #[error("unexpected error: {0}")]
    Other(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn limit(msg: impl Into<String>) -> Self {
        Self::LimitExceeded(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_output(msg: impl Into<String>) -> Self {
        Self::InvalidModelOutput(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Failure category reported by the hosted model client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelErrorKind {
    /// Missing, invalid or revoked API key.
    Credential,
    /// The endpoint could not be reached.
    Connectivity,
    /// Quota exhausted or rate limited.
    Quota,
    Generic,
}

impl ModelErrorKind {
    /// Classify an untyped upstream message.
    ///
    /// Matching is on the exact upstream wording. Order matters: a message mentioning
    /// both an API key and the network is a credential problem, and one mentioning
    /// both the network and a quota is a connectivity problem.
    pub fn classify(message: &str) -> Self {
        if message.contains("API key") {
            Self::Credential
        } else if message.contains("network") {
            Self::Connectivity
        } else if message.contains("quota") {
            Self::Quota
        } else {
            Self::Generic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Connectivity => "connectivity",
            Self::Quota => "quota",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a [`ModelClient`](crate::application::services::ModelClient).
#[derive(Debug, Clone, Error)]
#[error("model error ({kind}): {message}")]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub message: String,
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build an error whose kind is inferred from the message text.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ModelErrorKind::classify(&message),
            message,
        }
    }
}
