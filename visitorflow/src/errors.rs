//! Error types for the visitorflow crate.
//!
//! External calls fail with [`ServiceError`]; the retry predicates and the
//! error classifier inspect its rendered message, so the `Display` text of
//! each variant is part of the contract.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::recovery::{classify_error, ErrorClassification};

/// The main error type for visitorflow operations.
#[derive(Debug, Error)]
pub enum VisitorflowError {
    /// An external service call failed.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// A pipeline step exhausted its attempts.
    #[error("Step '{step}' failed: {message}")]
    StepFailed {
        /// The step id.
        step: String,
        /// The last error message.
        message: String,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File preparation or upload failed.
    #[error("Upload error: {0}")]
    Upload(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VisitorflowError {
    /// Creates a step failure error.
    #[must_use]
    pub fn step_failed(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StepFailed {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Failure of a call to an external collaborator (record store, email
/// provider, chat webhook) or of a guard wrapped around such a call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ServiceError {
    /// The transport failed before a response was received.
    #[error("network error: {0}")]
    Network(String),

    /// The call did not finish within its time budget.
    #[error("{0}")]
    Timeout(String),

    /// The remote answered with a non-success status.
    #[error("HTTP {status}: {reason}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Status text or body excerpt.
        reason: String,
    },

    /// The circuit breaker for the service is open.
    #[error("Circuit breaker is OPEN - service unavailable")]
    CircuitOpen,

    /// The provider accepted the request but reported it was not delivered.
    #[error("{0}")]
    Rejected(String),

    /// The payload was refused as invalid.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Creates an HTTP status error.
    #[must_use]
    pub fn http(status: u16, reason: impl Into<String>) -> Self {
        Self::Http {
            status,
            reason: reason.into(),
        }
    }

    /// Creates a rejected-delivery error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Creates a generic error.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// The rendered message, as inspected by retry predicates.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Case-insensitive check for any of the given substrings.
    #[must_use]
    pub fn mentions_any(&self, needles: &[&str]) -> bool {
        let message = self.to_string().to_lowercase();
        needles.iter().any(|n| message.contains(&n.to_lowercase()))
    }

    /// Classifies this error for display.
    #[must_use]
    pub fn classify(&self) -> ErrorClassification {
        classify_error(&self.to_string())
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        let kind = match self {
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Http { status, .. } => {
                map.insert("status".to_string(), serde_json::json!(status));
                "http"
            }
            Self::CircuitOpen => "circuit_open",
            Self::Rejected(_) => "rejected",
            Self::Validation(_) => "validation",
            Self::Other(_) => "other",
        };

        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("request timeout: {err}"))
        } else if let Some(status) = err.status() {
            Self::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown").to_string(),
            )
        } else {
            Self::network(format!("fetch failed: {}", err.without_url()))
        }
    }
}
