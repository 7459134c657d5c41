//! Step identity and status enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed steps of a notification run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepId {
    /// Upload photo and signature, creating the visitor record if needed.
    FileUpload,
    /// Mark the record as registered.
    MondayStatus,
    /// Email the host.
    HostEmail,
    /// Email the visitor their welcome package.
    WelcomeEmail,
    /// Post to the team chat.
    ChatNotification,
    /// Write the run summary back to the record.
    FinalStatus,
}

impl StepId {
    /// Every step, in run order.
    pub const ALL: [Self; 6] = [
        Self::FileUpload,
        Self::MondayStatus,
        Self::HostEmail,
        Self::WelcomeEmail,
        Self::ChatNotification,
        Self::FinalStatus,
    ];

    /// Stable identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FileUpload => "file-upload",
            Self::MondayStatus => "monday-status",
            Self::HostEmail => "host-email",
            Self::WelcomeEmail => "welcome-email",
            Self::ChatNotification => "chat-notification",
            Self::FinalStatus => "final-status",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FileUpload => "Upload files to Monday.com",
            Self::MondayStatus => "Update visitor status in Monday.com",
            Self::HostEmail => "Send host notification email",
            Self::WelcomeEmail => "Send welcome package email",
            Self::ChatNotification => "Send Google Chat notification",
            Self::FinalStatus => "Update final processing status",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown step id: {s}"))
    }
}

/// The execution status of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started.
    #[default]
    Pending,
    /// First attempt running.
    Processing,
    /// A later attempt running.
    Retrying,
    /// Finished successfully.
    Completed,
    /// Every attempt failed.
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Retrying => write!(f, "retrying"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StepStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true while an attempt is in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Processing | Self::Retrying)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_ids_in_order() {
        let ids: Vec<&str> = StepId::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            ids,
            [
                "file-upload",
                "monday-status",
                "host-email",
                "welcome-email",
                "chat-notification",
                "final-status"
            ]
        );
    }

    #[test]
    fn test_step_id_round_trips_through_str() {
        for id in StepId::ALL {
            assert_eq!(id.as_str().parse::<StepId>(), Ok(id));
        }
        assert!("nope".parse::<StepId>().is_err());
    }

    #[test]
    fn test_step_id_serializes_kebab() {
        let json = serde_json::to_string(&StepId::ChatNotification).unwrap();
        assert_eq!(json, r#""chat-notification""#);
    }

    #[test]
    fn test_step_status_is_terminal() {
        assert!(StepStatus::Completed.is_terminal());
        assert!(StepStatus::Failed.is_terminal());
        assert!(!StepStatus::Pending.is_terminal());
        assert!(!StepStatus::Retrying.is_terminal());
        assert!(StepStatus::Retrying.is_active());
    }

    #[test]
    fn test_step_status_display() {
        assert_eq!(StepStatus::Retrying.to_string(), "retrying");
        assert_eq!(StepStatus::default(), StepStatus::Pending);
    }
}
