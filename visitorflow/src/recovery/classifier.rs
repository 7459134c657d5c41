//! Maps raw failure messages to a user-facing taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::{iso_timestamp, time_based_id};

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Connectivity or timeout problems.
    Network,
    /// Credentials were rejected.
    Authentication,
    /// The input was refused.
    Validation,
    /// The remote service failed.
    Service,
    /// Anything else.
    Unknown,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Authentication => write!(f, "authentication"),
            Self::Validation => write!(f, "validation"),
            Self::Service => write!(f, "service"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// How disruptive a failure is to the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Minor, usually fixable by the visitor.
    Low,
    /// Noticeable but transient.
    Medium,
    /// Needs staff attention.
    High,
}

/// Result of classifying a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorClassification {
    /// Category.
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    /// Severity.
    pub severity: Severity,
    /// Message safe to show on the kiosk.
    pub user_message: String,
    /// The original message.
    pub technical_message: String,
    /// Whether a retry affordance should be offered.
    pub recoverable: bool,
}

/// A classification stamped for correlation with logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFacingError {
    /// The classification.
    #[serde(flatten)]
    pub classification: ErrorClassification,
    /// ISO 8601 time of the report.
    pub timestamp: String,
    /// Time-based correlation id.
    pub error_id: String,
    /// Mirrors `recoverable`.
    pub can_retry: bool,
}

struct Rule {
    markers: &'static [&'static str],
    error_type: ErrorType,
    severity: Severity,
    user_message: &'static str,
    recoverable: bool,
}

// Checked in order; the first match wins.
const RULES: &[Rule] = &[
    Rule {
        markers: &["fetch", "network", "timeout"],
        error_type: ErrorType::Network,
        severity: Severity::Medium,
        user_message:
            "Connection issue detected. Please check your internet connection and try again.",
        recoverable: true,
    },
    Rule {
        markers: &["unauthorized", "authentication", "403"],
        error_type: ErrorType::Authentication,
        severity: Severity::High,
        user_message: "Authentication failed. Please refresh the page and try again.",
        recoverable: false,
    },
    Rule {
        markers: &["validation", "invalid", "400"],
        error_type: ErrorType::Validation,
        severity: Severity::Low,
        user_message: "Please check your input and try again.",
        recoverable: true,
    },
    Rule {
        markers: &["500", "502", "503"],
        error_type: ErrorType::Service,
        severity: Severity::High,
        user_message:
            "Our services are temporarily unavailable. Please try again in a few minutes.",
        recoverable: true,
    },
];

const UNKNOWN_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Classifies a failure message by case-insensitive substring matching.
#[must_use]
pub fn classify_error(message: &str) -> ErrorClassification {
    let lowered = message.to_lowercase();

    RULES
        .iter()
        .find(|rule| rule.markers.iter().any(|m| lowered.contains(m)))
        .map_or_else(
            || ErrorClassification {
                error_type: ErrorType::Unknown,
                severity: Severity::Medium,
                user_message: UNKNOWN_MESSAGE.to_string(),
                technical_message: message.to_string(),
                recoverable: true,
            },
            |rule| ErrorClassification {
                error_type: rule.error_type,
                severity: rule.severity,
                user_message: rule.user_message.to_string(),
                technical_message: message.to_string(),
                recoverable: rule.recoverable,
            },
        )
}

/// Classifies a failure and stamps it with a timestamp and error id.
#[must_use]
pub fn create_user_friendly_error(message: &str) -> UserFacingError {
    let classification = classify_error(message);
    let can_retry = classification.recoverable;

    UserFacingError {
        classification,
        timestamp: iso_timestamp(),
        error_id: time_based_id(),
        can_retry,
    }
}
